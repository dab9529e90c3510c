use axum::Json;

use rally_shared::types::api::HealthResponse;

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy("rally-notification", env!("CARGO_PKG_VERSION")))
}
