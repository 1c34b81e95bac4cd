//! Command line flags and configuration document loading

use std::time::Duration;

use clap::Parser;
use syncer_common::{SyncerConfig, SyncerError};
use tracing::{debug, warn};

pub const DEFAULT_LISTEN_ADDRESS: &str = ":8080";
pub const DEFAULT_CONFIG_FILE: &str = "config.yml";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Command line arguments for the daemon
#[derive(Debug, Clone, Parser)]
#[command(name = "discovery-syncer", version, about)]
pub struct Cli {
    /// Address the control surface listens on; `:port` binds all interfaces
    #[arg(
        short = 'p',
        long = "web.listen-address",
        env = "SYNCER_LISTEN_ADDRESS",
        default_value = DEFAULT_LISTEN_ADDRESS
    )]
    pub listen_address: String,
    /// Configuration document, a file path or an http(s) URL
    #[arg(
        short = 'c',
        long = "config.file",
        env = "SYNCER_CONFIG_FILE",
        default_value = DEFAULT_CONFIG_FILE
    )]
    pub config_file: String,
}

/// Split a listen address into a bindable host and port
pub fn parse_listen_address(address: &str) -> anyhow::Result<(String, u16)> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| anyhow::anyhow!("listen address {:?} has no port", address))?;
    let port = port
        .parse::<u16>()
        .map_err(|e| anyhow::anyhow!("listen address {:?}: bad port: {}", address, e))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let host = if host.is_empty() { "0.0.0.0" } else { host };
    Ok((host.to_string(), port))
}

/// Load and validate the configuration document from a path or URL
pub async fn load_config(location: &str) -> Result<SyncerConfig, SyncerError> {
    let document = if location.starts_with("http") {
        fetch_remote(location).await?
    } else {
        tokio::fs::read_to_string(location)
            .await
            .map_err(|e| SyncerError::ConfigInvalid(format!("read {}: {}", location, e)))?
    };
    debug!(location, bytes = document.len(), "configuration document loaded");
    let config = SyncerConfig::from_yaml(&document)?;
    if config.enable_pprof {
        warn!(location, "enable-pprof is set but profiling is not supported, ignoring");
    }
    Ok(config)
}

async fn fetch_remote(url: &str) -> Result<String, SyncerError> {
    let invalid = |e: reqwest::Error| SyncerError::ConfigInvalid(format!("fetch {}: {}", url, e));
    let client = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(invalid)?;
    client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(invalid)?
        .text()
        .await
        .map_err(invalid)
}
