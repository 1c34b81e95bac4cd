use actix_web::{HttpResponse, web};
use syncer_common::{Registration, SyncerError};
use syncer_core::apply_registration;
use tracing::warn;

use super::AppState;
use crate::error::ApiError;

/// Push enable/disable overrides to the named discovery backend
pub async fn apply_override(
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<Registration>,
) -> Result<HttpResponse, ApiError> {
    let name = path.into_inner();
    let client = match data.state.get_discovery_client(&name) {
        Ok(client) => client,
        Err(SyncerError::ClientNotFound(_)) => {
            return Ok(HttpResponse::NotFound().body("Not Found"));
        }
        Err(e) => return Err(e.into()),
    };

    let registration = body.into_inner();
    apply_registration(client.as_ref(), &registration)
        .await
        .inspect_err(|e| {
            warn!(discovery = %name, service = %registration.service_name, error = %e, "override failed");
        })?;
    Ok(HttpResponse::Ok().body("OK"))
}
