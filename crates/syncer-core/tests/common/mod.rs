//! In-memory backends shared by the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use syncer_common::{
    DiffPlan, DiscoveryClient, GatewayClient, Instance, Options, Result, Service, SyncerError,
};

#[derive(Default)]
pub struct FakeDiscovery {
    pub services: Mutex<Vec<Service>>,
    pub instances: Mutex<HashMap<String, Vec<Instance>>>,
    pub failing: Mutex<Vec<String>>,
    pub fail_listing: AtomicUsize,
    pub fetched: Mutex<Vec<String>>,
    pub overrides: Mutex<Vec<(String, Vec<Instance>)>>,
}

impl FakeDiscovery {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_service(&self, name: &str, instances: Vec<Instance>) {
        self.services.lock().push(Service::new(name));
        self.instances.lock().insert(name.to_string(), instances);
    }

    pub fn add_embedded_service(&self, name: &str, instances: Vec<Instance>) {
        self.services
            .lock()
            .push(Service::with_instances(name, instances));
    }

    pub fn fail_service(&self, name: &str) {
        self.failing.lock().push(name.to_string());
    }

    /// Make the next `count` service listings fail
    pub fn fail_next_listings(&self, count: usize) {
        self.fail_listing.store(count, Ordering::SeqCst);
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().clone()
    }
}

#[async_trait]
impl DiscoveryClient for FakeDiscovery {
    fn kind(&self) -> &'static str {
        "fake"
    }

    async fn list_services(&self, _options: &Options) -> Result<Vec<Service>> {
        let remaining = self.fail_listing.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_listing.store(remaining - 1, Ordering::SeqCst);
            return Err(SyncerError::DiscoveryUnavailable("listing refused".to_string()));
        }
        Ok(self.services.lock().clone())
    }

    async fn list_instances(&self, service_name: &str, _options: &Options) -> Result<Vec<Instance>> {
        self.fetched.lock().push(service_name.to_string());
        if self.failing.lock().iter().any(|s| s == service_name) {
            return Err(SyncerError::DiscoveryUnavailable(format!("{} unreachable", service_name)));
        }
        Ok(self
            .instances
            .lock()
            .get(service_name)
            .cloned()
            .unwrap_or_default())
    }

    async fn apply_overrides(&self, service_name: &str, instances: &[Instance]) -> Result<()> {
        self.overrides
            .lock()
            .push((service_name.to_string(), instances.to_vec()));
        Ok(())
    }
}

/// Gateway applying plans with full-replace semantics
#[derive(Default)]
pub struct FakeGateway {
    pub upstreams: Mutex<HashMap<String, Vec<Instance>>>,
    pub pushes: Mutex<Vec<(String, Option<String>, DiffPlan)>>,
    pub failing: Mutex<Vec<String>>,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_upstream(&self, name: &str, instances: Vec<Instance>) {
        self.upstreams.lock().insert(name.to_string(), instances);
    }

    pub fn upstream(&self, name: &str) -> Vec<Instance> {
        self.upstreams.lock().get(name).cloned().unwrap_or_default()
    }

    pub fn fail_upstream(&self, name: &str) {
        self.failing.lock().push(name.to_string());
    }

    pub fn pushed_upstreams(&self) -> Vec<String> {
        self.pushes.lock().iter().map(|(n, _, _)| n.clone()).collect()
    }
}

#[async_trait]
impl GatewayClient for FakeGateway {
    fn kind(&self) -> &'static str {
        "fake"
    }

    async fn list_upstream_instances(&self, upstream_name: &str) -> Result<Vec<Instance>> {
        Ok(self.upstream(upstream_name))
    }

    async fn sync_instances(
        &self,
        upstream_name: &str,
        template: Option<&str>,
        plan: &DiffPlan,
    ) -> Result<()> {
        if self.failing.lock().iter().any(|s| s == upstream_name) {
            return Err(SyncerError::SyncFailed(format!("{} rejected", upstream_name)));
        }
        self.pushes.lock().push((
            upstream_name.to_string(),
            template.map(str::to_string),
            plan.clone(),
        ));
        self.set_upstream(upstream_name, plan.canonical.clone());
        Ok(())
    }
}
