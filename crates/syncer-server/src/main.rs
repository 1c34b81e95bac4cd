//! Entry point for the discovery-syncer daemon.

use std::sync::Arc;
use std::time::Duration;

use actix_web::web;
use anyhow::Context;
use clap::Parser;
use syncer_core::SyncState;
use syncer_server::{
    AppState, Cli, load_config, parse_listen_address,
    startup::{self, LoggingConfig},
};
use tracing::info;

/// How long running syncs may take to finish once shutdown starts
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config_file)
        .await
        .with_context(|| format!("loading {}", cli.config_file))?;
    let _logging_guard = startup::init_logging(&LoggingConfig::from_logger(&config.logger))?;

    // jobs stay on the main runtime; control workers are torn down before the drain
    let state = Arc::new(SyncState::with_runtime(tokio::runtime::Handle::current()));
    state
        .apply_config(&config)
        .context("building sync targets")?;

    let (address, port) = parse_listen_address(&cli.listen_address)?;
    let app_state = web::Data::new(AppState::new(
        state.clone(),
        cli.config_file.clone(),
        config.logger.clone(),
    ));
    let server = startup::control_server(app_state, address.clone(), port)
        .with_context(|| format!("binding {}:{}", address, port))?;
    info!(%address, port, "control server listening");

    let handle = server.handle();
    actix_rt::spawn(async move {
        startup::wait_for_shutdown_signal().await;
        handle.stop(true).await;
    });

    server.await?;
    info!("control server stopped, draining sync runtime");
    state.shutdown(DRAIN_TIMEOUT).await;
    info!("shutdown complete");
    Ok(())
}
