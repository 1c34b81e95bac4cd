//! Reconciliation engine
//!
//! One `Syncer` per target. A run lists the discovery services, filters the
//! excluded ones, then for every service diffs the discovery membership with
//! the gateway upstream `<upstream-prefix>-<service>` and pushes the plan.
//! The first failed fetch or push aborts the rest of the run; the health
//! record is stamped only when every service went through.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info};

use syncer_common::{
    DiscoveryClient, FetchSchedule, GatewayClient, Result, SyncerError, Target, unix_timestamp,
};

use crate::diff::diff_instances;
use crate::health::HealthRegistry;
use crate::scheduler::Job;

/// Counters of one completed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub services: usize,
    pub excluded: usize,
    pub pushed: usize,
}

pub struct Syncer {
    target: Target,
    schedule: FetchSchedule,
    excludes: Vec<Regex>,
    discovery: Arc<dyn DiscoveryClient>,
    gateway: Arc<dyn GatewayClient>,
    health: HealthRegistry,
}

impl Syncer {
    /// Bind a target to its backends and seed its health record
    pub fn new(
        target: Target,
        discovery: Arc<dyn DiscoveryClient>,
        gateway: Arc<dyn GatewayClient>,
        health: HealthRegistry,
    ) -> Result<Self> {
        let excludes = target
            .exclude_service
            .iter()
            .map(|pattern| Regex::new(pattern).map_err(|e| SyncerError::invalid_pattern(pattern, e)))
            .collect::<Result<Vec<_>>>()?;
        let schedule = target.schedule()?;

        health.seed(target.key(), unix_timestamp());
        Ok(Self {
            target,
            schedule,
            excludes,
            discovery,
            gateway,
            health,
        })
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Search semantics: a pattern matching anywhere excludes the service
    pub fn is_excluded(&self, service_name: &str) -> bool {
        self.excludes.iter().any(|re| re.is_match(service_name))
    }

    pub fn upstream_name(&self, service_name: &str) -> String {
        format!("{}-{}", self.target.upstream_prefix, service_name)
    }

    /// Reconcile every service of the target once
    pub async fn run(&self) -> Result<RunSummary> {
        let options = self.target.discovery_options();
        let services = self.discovery.list_services(&options).await?;
        let mut summary = RunSummary::default();

        for service in services {
            if self.is_excluded(&service.name) {
                summary.excluded += 1;
                continue;
            }
            summary.services += 1;

            let discovery_instances = if service.instances.is_empty() {
                self.discovery.list_instances(&service.name, &options).await?
            } else {
                service.instances
            };
            debug!(
                syncer = self.target.key(),
                service = %service.name,
                count = discovery_instances.len(),
                "fetched discovery instances"
            );

            let upstream = self.upstream_name(&service.name);
            let gateway_instances = self.gateway.list_upstream_instances(&upstream).await?;

            let plan = diff_instances(&discovery_instances, &gateway_instances);
            if plan.is_empty() {
                continue;
            }
            info!(
                syncer = self.target.key(),
                upstream = %upstream,
                additions = plan.additions().count(),
                updates = plan.updates().count(),
                removals = plan.removals().count(),
                plan = ?plan.changes,
                "pushing upstream changes"
            );
            self.gateway
                .sync_instances(&upstream, self.target.template(), &plan)
                .await?;
            summary.pushed += 1;
        }

        self.health.touch(self.target.key(), unix_timestamp());
        Ok(summary)
    }
}

#[async_trait]
impl Job for Syncer {
    fn key(&self) -> &str {
        self.target.key()
    }

    fn schedule(&self) -> FetchSchedule {
        self.schedule.clone()
    }

    async fn execute(&self) -> Result<()> {
        let summary = self.run().await?;
        debug!(
            syncer = self.target.key(),
            services = summary.services,
            excluded = summary.excluded,
            pushed = summary.pushed,
            "sync run completed"
        );
        Ok(())
    }
}
