//! Process startup: logging, the control server and signal handling

mod http;
mod logging;
mod shutdown;

pub use http::control_server;
pub use logging::{LogRotation, LoggingConfig, LoggingGuard, init_logging};
pub use shutdown::wait_for_shutdown_signal;
