use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use validator::Validate;

use rally_shared::errors::{AppError, AppResult, ErrorCode};
use rally_shared::types::api::ApiResponse;

use crate::models::Notification;
use crate::routes::admin::CreateNotificationRequest;
use crate::services::notification_service;
use crate::AppState;

/// POST /internal/notifications — service-to-service trigger, e.g. the
/// tournament service announcing a room-info update (no auth; the route is
/// only reachable on the internal network).
pub async fn create_notification(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateNotificationRequest>,
) -> AppResult<Json<ApiResponse<Vec<Notification>>>> {
    req.validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;

    let created = notification_service::create_and_dispatch(&state, req.into_create()).await?;

    tracing::debug!(created = created.len(), "internal notification created");

    Ok(Json(ApiResponse::ok(created)))
}
