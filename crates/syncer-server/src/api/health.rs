use actix_web::{HttpResponse, web};

use super::AppState;

/// Aggregate liveness; 500 only when every target is lost
pub async fn health(data: web::Data<AppState>) -> HttpResponse {
    let liveness = data.state.liveness();
    if liveness.is_down() {
        HttpResponse::InternalServerError().json(liveness)
    } else {
        HttpResponse::Ok().json(liveness)
    }
}
