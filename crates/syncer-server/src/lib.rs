//! discovery-syncer daemon
//!
//! Wires the configuration document, logging and the control HTTP surface
//! around the sync runtime in `syncer-core`.

pub mod api;
pub mod config;
pub mod error;
pub mod startup;

pub use api::AppState;
pub use config::{Cli, load_config, parse_listen_address};
pub use error::ApiError;
