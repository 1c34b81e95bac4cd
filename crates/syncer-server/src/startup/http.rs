//! Control surface HTTP server

use actix_web::{App, HttpServer, dev::Server, middleware::Logger, web};

use crate::api::{self, AppState};

/// Grace period for in-flight control requests on shutdown, in seconds
const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Create and bind the control HTTP server.
///
/// Signal handling is left to the caller so the sync runtime can be drained
/// after the listener stops.
pub fn control_server(app_state: web::Data<AppState>, address: String, port: u16) -> Result<Server, std::io::Error> {
    Ok(HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(app_state.clone())
            .configure(api::routes)
    })
    .disable_signals()
    .shutdown_timeout(SHUTDOWN_TIMEOUT_SECS)
    .bind((address, port))?
    .run())
}
