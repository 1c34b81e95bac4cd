//! Backend capability contracts
//!
//! The reconciliation engine is written only against these two traits. Any
//! registry that can list services and instances is a discovery source; any
//! admin plane that can read and rewrite an upstream is a gateway sink.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{DiffPlan, Instance, Service};

/// Free-form backend options (namespace, group, cluster, ...)
pub type Options = HashMap<String, String>;

/// Registry reporting live service membership
///
/// A 404 from the backend is an empty result, never an error. Every other
/// transport or non-success failure is `SyncerError::DiscoveryUnavailable`.
#[async_trait]
pub trait DiscoveryClient: Send + Sync {
    /// Backend type name, for logging
    fn kind(&self) -> &'static str;

    /// List every service. Backends that embed membership in the listing
    /// return it in `Service::instances`.
    async fn list_services(&self, options: &Options) -> Result<Vec<Service>>;

    /// Fetch the current members of one service
    async fn list_instances(&self, service_name: &str, options: &Options)
    -> Result<Vec<Instance>>;

    /// Push the `enabled` state of every instance flagged `changed`.
    ///
    /// Best effort: a failure on one instance does not stop the others. The
    /// backend identifier needed for the push comes from the instance's `ext`.
    async fn apply_overrides(&self, service_name: &str, instances: &[Instance]) -> Result<()>;
}

/// Gateway admin plane exposing named upstreams
///
/// Implementations are shared by every target pointing at the same gateway
/// and must tolerate concurrent calls. Any internal name to identifier cache
/// has to be safe under concurrent read/write.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Backend type name, for logging
    fn kind(&self) -> &'static str;

    /// Current members of an upstream; a missing upstream is empty
    async fn list_upstream_instances(&self, upstream_name: &str) -> Result<Vec<Instance>>;

    /// Apply a plan to an upstream.
    ///
    /// A backend may rewrite the member list from `plan.canonical` or issue
    /// incremental operations from `plan.changes`. `template` is the optional
    /// upstream-creation template configured on the target. No-op when the
    /// plan carries neither changes nor canonical members.
    async fn sync_instances(
        &self,
        upstream_name: &str,
        template: Option<&str>,
        plan: &DiffPlan,
    ) -> Result<()>;
}
