//! Reload-swappable runtime state
//!
//! `SyncRuntime` is everything built from one configuration document: the
//! backend clients, the syncers and their scheduler. `SyncState` holds the
//! active runtime behind an `Arc` so readers never see a half-built one, and
//! swaps it wholesale on reload. The health registry outlives runtimes, and so
//! does the tokio runtime handle every scheduler spawns onto.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tracing::{info, warn};

use syncer_client::{DiscoveryClients, GatewayClients, build_discovery_clients, build_gateway_clients};
use syncer_common::{
    DiscoveryClient, GatewayClient, Result, SyncerConfig, SyncerError, unix_timestamp,
};

use crate::health::{HealthRegistry, Liveness};
use crate::scheduler::Scheduler;
use crate::syncer::Syncer;

/// Clients, syncers and scheduler built from one configuration
pub struct SyncRuntime {
    discovery_clients: DiscoveryClients,
    gateway_clients: GatewayClients,
    syncers: Vec<Arc<Syncer>>,
    scheduler: Scheduler,
}

impl SyncRuntime {
    /// Runtime with nothing configured
    pub fn empty() -> Self {
        Self::from_parts(
            DiscoveryClients::new(),
            GatewayClients::new(),
            Vec::new(),
            Scheduler::with_runtime(None),
        )
    }

    pub fn from_parts(
        discovery_clients: DiscoveryClients,
        gateway_clients: GatewayClients,
        syncers: Vec<Arc<Syncer>>,
        scheduler: Scheduler,
    ) -> Self {
        Self {
            discovery_clients,
            gateway_clients,
            syncers,
            scheduler,
        }
    }

    /// Build clients and a syncer for every enabled target
    ///
    /// Jobs will run on `runtime`, or on the runtime calling `start` when `None`.
    pub fn build(
        config: &SyncerConfig,
        health: &HealthRegistry,
        runtime: Option<Handle>,
    ) -> Result<Self> {
        let discovery_clients = build_discovery_clients(&config.discovery_servers)?;
        let gateway_clients = build_gateway_clients(&config.gateway_servers)?;

        let mut syncers = Vec::new();
        for target in &config.targets {
            if !target.enabled {
                warn!(target_key = target.key(), "target disabled, not scheduled");
                continue;
            }
            let discovery = discovery_clients
                .get(&target.discovery)
                .cloned()
                .ok_or_else(|| SyncerError::ClientNotFound(format!("discovery {}", target.discovery)))?;
            let gateway = gateway_clients
                .get(&target.gateway)
                .cloned()
                .ok_or_else(|| SyncerError::ClientNotFound(format!("gateway {}", target.gateway)))?;

            syncers.push(Arc::new(Syncer::new(
                target.clone(),
                discovery,
                gateway,
                health.clone(),
            )?));
        }

        Ok(Self::from_parts(
            discovery_clients,
            gateway_clients,
            syncers,
            Scheduler::with_runtime(runtime),
        ))
    }

    /// Register every syncer with the scheduler
    pub fn start(&self) {
        for syncer in &self.syncers {
            self.scheduler.schedule(syncer.clone());
        }
        info!(jobs = self.scheduler.len(), "sync runtime started");
    }

    pub fn syncers(&self) -> &[Arc<Syncer>] {
        &self.syncers
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn discovery_client(&self, name: &str) -> Option<Arc<dyn DiscoveryClient>> {
        self.discovery_clients.get(name).cloned()
    }

    pub fn gateway_client(&self, name: &str) -> Option<Arc<dyn GatewayClient>> {
        self.gateway_clients.get(name).cloned()
    }
}

/// Process-wide state shared with the control surface
pub struct SyncState {
    health: HealthRegistry,
    jobs_runtime: Option<Handle>,
    runtime: RwLock<Arc<SyncRuntime>>,
    started_at: Instant,
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncState {
    /// State whose jobs run on the caller's runtime, if any
    pub fn new() -> Self {
        Self::with_runtime(Handle::try_current().ok())
    }

    /// State whose jobs always run on `runtime`, wherever reloads come from
    pub fn with_runtime(runtime: impl Into<Option<Handle>>) -> Self {
        Self {
            health: HealthRegistry::new(),
            jobs_runtime: runtime.into(),
            runtime: RwLock::new(Arc::new(SyncRuntime::empty())),
            started_at: Instant::now(),
        }
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    /// Snapshot of the active runtime
    pub fn runtime(&self) -> Arc<SyncRuntime> {
        self.runtime.read().clone()
    }

    /// Swap in `runtime` and stop the previous one's tickers
    pub fn install(&self, runtime: SyncRuntime) -> Arc<SyncRuntime> {
        let previous = std::mem::replace(&mut *self.runtime.write(), Arc::new(runtime));
        previous.scheduler().stop();
        previous
    }

    /// Build, start and install a runtime for `config`
    ///
    /// On failure the active runtime keeps running untouched.
    pub fn apply_config(&self, config: &SyncerConfig) -> Result<()> {
        let runtime = SyncRuntime::build(config, &self.health, self.jobs_runtime.clone())?;
        runtime.start();
        self.install(runtime);
        info!(targets = self.runtime().syncers().len(), "configuration applied");
        Ok(())
    }

    pub fn get_discovery_client(&self, name: &str) -> Result<Arc<dyn DiscoveryClient>> {
        self.runtime()
            .discovery_client(name)
            .ok_or_else(|| SyncerError::ClientNotFound(format!("discovery {}", name)))
    }

    pub fn get_gateway_client(&self, name: &str) -> Result<Arc<dyn GatewayClient>> {
        self.runtime()
            .gateway_client(name)
            .ok_or_else(|| SyncerError::ClientNotFound(format!("gateway {}", name)))
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Liveness of the active targets
    pub fn liveness(&self) -> Liveness {
        let runtime = self.runtime();
        let targets = runtime
            .syncers()
            .iter()
            .map(|s| (s.target().key(), s.target().maximum_interval_sec));
        self.health.liveness(targets, unix_timestamp(), self.uptime())
    }

    /// Stop scheduling and drain the active runtime
    pub async fn shutdown(&self, grace: Duration) {
        self.runtime().scheduler().shutdown(grace).await;
    }
}
