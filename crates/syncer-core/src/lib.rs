//! Syncer Core - reconciliation between discovery sources and gateways
//!
//! This crate is written only against the backend contracts of
//! `syncer-common`:
//! - Diff engine computing the minimal upstream plan
//! - Per-target reconciliation runs
//! - Periodic scheduling with overlap prevention and fault isolation
//! - Health record and liveness derivation
//! - Registry overrides
//! - The reload-swappable runtime state

pub mod diff;
pub mod health;
pub mod overrides;
pub mod scheduler;
pub mod state;
pub mod syncer;

pub use diff::diff_instances;
pub use health::{HealthRegistry, HealthStatus, Liveness};
pub use overrides::{apply_registration, mark_instances};
pub use scheduler::{Job, Scheduler};
pub use state::{SyncRuntime, SyncState};
pub use syncer::{RunSummary, Syncer};
