//! Syncer Common - Shared types, traits, and utilities
//!
//! This crate provides the foundational types used across all syncer components:
//! - Instance and service data model
//! - Error taxonomy shared by backends and the reconciliation engine
//! - Capability contracts implemented by discovery and gateway backends
//! - The configuration document schema and its validation rules
//! - Fetch-interval schedule expressions

pub mod config;
pub mod error;
pub mod model;
pub mod schedule;
pub mod traits;

// Re-exports for convenience
pub use config::{DiscoveryServer, GatewayServer, LoggerConfig, SyncerConfig, Target};
pub use error::{Result, SyncerError};
pub use model::{DiffPlan, Instance, MatchType, OverrideStatus, Registration, Service};
pub use schedule::FetchSchedule;
pub use traits::{DiscoveryClient, GatewayClient, Options};

/// Target option key holding the gateway upstream-creation template
pub const TEMPLATE_KEY: &str = "template";

/// Default scheduling expression for a target
pub const DEFAULT_FETCH_INTERVAL: &str = "@every 10s";

/// Default staleness threshold for a target, in seconds
pub const DEFAULT_MAXIMUM_INTERVAL_SEC: i64 = 10;

/// Current Unix timestamp in seconds
pub fn unix_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
