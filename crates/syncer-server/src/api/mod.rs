//! Control surface handlers
//!
//! | Route               | Method    |
//! |---------------------|-----------|
//! | `/`                 | GET       |
//! | `/-/reload`         | GET, POST |
//! | `/health`           | GET       |
//! | `/discovery/{name}` | POST, PUT |

use std::sync::Arc;

use actix_web::web;
use syncer_common::LoggerConfig;
use syncer_core::SyncState;

mod discovery;
mod health;
mod reload;

/// Shared state handed to every handler
pub struct AppState {
    pub state: Arc<SyncState>,
    /// Where reloads read the configuration document from
    pub config_file: String,
    /// Logger settings the process sink was built with
    pub logger: LoggerConfig,
}

impl AppState {
    pub fn new(state: Arc<SyncState>, config_file: impl Into<String>, logger: LoggerConfig) -> Self {
        Self {
            state,
            config_file: config_file.into(),
            logger,
        }
    }
}

async fn index() -> &'static str {
    "OK"
}

/// Register every control route
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .service(
            web::resource("/-/reload")
                .route(web::get().to(reload::reload))
                .route(web::post().to(reload::reload)),
        )
        .route("/health", web::get().to(health::health))
        .service(
            web::resource("/discovery/{name}")
                .route(web::post().to(discovery::apply_override))
                .route(web::put().to(discovery::apply_override)),
        );
}
