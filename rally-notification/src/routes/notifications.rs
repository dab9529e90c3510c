use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use uuid::Uuid;

use rally_shared::errors::{AppError, AppResult, ErrorCode};
use rally_shared::types::api::ApiResponse;
use rally_shared::types::auth::AuthUser;
use rally_shared::types::pagination::{Paginated, PaginationParams};

use crate::models::NotificationView;
use crate::services::read_state;
use crate::socket::dispatcher;
use crate::AppState;

/// GET /notifications
/// Reconciled notification list for the authenticated user, newest-first.
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<NotificationView>>>> {
    let views = read_state::view_for_user(state.store.as_ref(), auth_user.id).await?;

    let total = views.len() as u64;
    let items: Vec<NotificationView> = views
        .into_iter()
        .skip(params.offset() as usize)
        .take(params.limit() as usize)
        .collect();

    Ok(Json(ApiResponse::ok(Paginated::new(items, total, &params))))
}

/// GET /notifications/unread-count
pub async fn unread_count(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> AppResult<Json<ApiResponse<UnreadCountResponse>>> {
    let count = read_state::unread_count_for_user(state.store.as_ref(), auth_user.id).await?;

    Ok(Json(ApiResponse::ok(UnreadCountResponse { count })))
}

#[derive(Debug, serde::Serialize)]
pub struct UnreadCountResponse {
    pub count: i64,
}

/// POST /notifications/:id/read
/// Mark a single notification read. Ownership of personal notifications is
/// enforced here at the boundary; the store enforces it again.
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<NotificationView>>> {
    let notification = state
        .store
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::NotificationNotFound, "notification not found"))?;

    if let Some(owner) = notification.recipient_id {
        if owner != auth_user.id {
            return Err(AppError::forbidden("cannot mark another user's notification"));
        }
    }

    state.store.mark_read(id, auth_user.id).await?;
    dispatcher::notify_user(&state, auth_user.id).await;

    // After marking, the reconciled flag is read regardless of channel.
    Ok(Json(ApiResponse::ok(notification.into_view(true))))
}

/// POST /notifications/mark-all-read
pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> AppResult<Json<ApiResponse<MarkAllReadResponse>>> {
    let marked = state.store.mark_all_read(auth_user.id).await?;
    dispatcher::notify_user(&state, auth_user.id).await;

    Ok(Json(ApiResponse::ok(MarkAllReadResponse { marked })))
}

#[derive(Debug, serde::Serialize)]
pub struct MarkAllReadResponse {
    pub marked: usize,
}

/// POST /notifications/hide
/// Client-local dismiss: pushes `{count:0, isHideAction:true}` to the
/// user's live connections and persists nothing.
pub async fn hide(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> AppResult<Json<ApiResponse<HideResponse>>> {
    dispatcher::hide_for_user(&state, auth_user.id);

    Ok(Json(ApiResponse::ok(HideResponse { ok: true })))
}

#[derive(Debug, serde::Serialize)]
pub struct HideResponse {
    pub ok: bool,
}
