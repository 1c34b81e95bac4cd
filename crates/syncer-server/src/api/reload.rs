use actix_web::{HttpResponse, web};
use tracing::{info, warn};

use super::AppState;
use crate::config::load_config;
use crate::error::ApiError;

/// Re-read the configuration document and replace the running targets
pub async fn reload(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    info!(config_file = %data.config_file, "reloading configuration");
    let config = load_config(&data.config_file).await.inspect_err(|e| {
        warn!(error = %e, "reload rejected");
    })?;

    if config.logger != data.logger {
        warn!("logger settings changed, restart to apply them");
    }

    data.state.apply_config(&config).inspect_err(|e| {
        warn!(error = %e, "reload failed, previous targets keep running");
    })?;
    Ok(HttpResponse::Ok().body("OK"))
}
