//! Logging setup driven by the `logger` block of the configuration document.
//!
//! A console layer is always installed. With `logger: file` a second layer
//! writes to `log-file` through a non-blocking rolling appender whose period
//! comes from `date-slice`:
//!
//! | date-slice | Rotation |
//! |------------|----------|
//! | h          | hourly   |
//! | d          | daily    |
//! | m, y       | never    |
//!
//! `RUST_LOG` overrides the configured level for every layer.

use std::path::{Path, PathBuf};

use syncer_common::LoggerConfig;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

/// Log rotation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Hourly,
    Daily,
    Never,
}

impl LogRotation {
    pub fn from_date_slice(date_slice: &str) -> Self {
        match date_slice {
            "h" => LogRotation::Hourly,
            "d" => LogRotation::Daily,
            _ => LogRotation::Never,
        }
    }
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

/// Resolved logging settings
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    /// Directory and file name of the file sink, when enabled
    pub file: Option<(PathBuf, String)>,
    pub rotation: LogRotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            file: None,
            rotation: LogRotation::Never,
        }
    }
}

impl LoggingConfig {
    pub fn from_logger(logger: &LoggerConfig) -> Self {
        let level = logger.level.parse().unwrap_or(Level::INFO);
        let file = logger.is_file().then(|| split_log_file(&logger.log_file));
        Self {
            level,
            file,
            rotation: LogRotation::from_date_slice(&logger.date_slice),
        }
    }
}

fn split_log_file(log_file: &str) -> (PathBuf, String) {
    let path = Path::new(log_file);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "discovery-syncer.log".to_string());
    (dir, name)
}

/// Keeps the file writer alive; dropping it flushes buffered output
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()))
}

/// Install the global subscriber. Call once per process.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<LoggingGuard> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_filter(env_filter(config.level));
    layers.push(Box::new(console_layer));

    let mut file_guard = None;
    if let Some((dir, name)) = &config.file {
        std::fs::create_dir_all(dir)?;
        let appender = RollingFileAppender::new(config.rotation.into(), dir, name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        file_guard = Some(guard);

        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_thread_names(true)
            .with_ansi(false)
            .with_filter(env_filter(config.level));
        layers.push(Box::new(file_layer));
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    if let Some((dir, name)) = &config.file {
        tracing::info!(
            log_dir = %dir.display(),
            file = %name,
            rotation = ?config.rotation,
            "file logging initialized"
        );
    }

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}
