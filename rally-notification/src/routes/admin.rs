use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use rally_shared::errors::{AppError, AppResult, ErrorCode};
use rally_shared::middleware::AdminUser;
use rally_shared::types::api::ApiResponse;

use crate::models::Notification;
use crate::services::notification_service::{self, CreateNotifications};
use crate::socket::dispatcher;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateNotificationRequest {
    #[validate(length(min = 1, max = 255, message = "title must be 1-255 characters"))]
    pub title: String,
    #[validate(length(min = 1, message = "message must not be empty"))]
    pub message: String,
    #[validate(length(min = 1, max = 50, message = "kind must be 1-50 characters"))]
    pub kind: String,
    /// Single target; merged with `recipients`. Neither set means broadcast.
    pub recipient: Option<Uuid>,
    #[serde(default)]
    pub recipients: Vec<Uuid>,
    pub related_id: Option<Uuid>,
}

impl CreateNotificationRequest {
    pub fn into_create(self) -> CreateNotifications {
        let mut recipients = self.recipients;
        if let Some(recipient) = self.recipient {
            if !recipients.contains(&recipient) {
                recipients.push(recipient);
            }
        }
        CreateNotifications {
            kind: self.kind,
            title: self.title,
            message: self.message,
            recipients,
            related_id: self.related_id,
        }
    }
}

/// POST /notifications
/// Create a broadcast or targeted notification(s) and push updated counts.
pub async fn create_notifications(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(req): Json<CreateNotificationRequest>,
) -> AppResult<Json<ApiResponse<Vec<Notification>>>> {
    req.validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;

    let created = notification_service::create_and_dispatch(&state, req.into_create()).await?;

    tracing::info!(
        admin_id = %admin.id,
        created = created.len(),
        broadcast = created.iter().any(Notification::is_broadcast),
        "notifications created"
    );

    Ok(Json(ApiResponse::ok(created)))
}

/// DELETE /notifications/:id
pub async fn delete_notification(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<DeleteResponse>>> {
    let removed = state.store.delete_by_id(id).await?;
    if !removed {
        return Err(AppError::new(ErrorCode::NotificationNotFound, "notification not found"));
    }

    tracing::info!(admin_id = %admin.id, notification_id = %id, "notification deleted");

    Ok(Json(ApiResponse::ok(DeleteResponse { deleted: true })))
}

#[derive(Debug, serde::Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

/// DELETE /notifications/users/:user_id
/// Account-cleanup purge: the user's personal notifications plus their
/// broadcast read markers. Best-effort — a store failure is logged and
/// reported as a zero count rather than failing the cleanup.
pub async fn purge_user_notifications(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<Uuid>,
) -> Json<ApiResponse<PurgeResponse>> {
    let deleted = match state.store.delete_all_for_user(user_id).await {
        Ok(count) => count,
        Err(e) => {
            tracing::error!(error = %e, user_id = %user_id, "failed to purge personal notifications");
            0
        }
    };

    let markers_removed = match state.store.delete_read_markers_for_user(user_id).await {
        Ok(count) => count,
        Err(e) => {
            tracing::error!(error = %e, user_id = %user_id, "failed to purge read markers");
            0
        }
    };

    // The purge also serves users who are staying (moderation cleanup), so
    // any live tabs get their count zeroed. For a deleted account the push
    // lands on connections about to close, which is fine.
    dispatcher::notify_user(&state, user_id).await;

    tracing::info!(
        admin_id = %admin.id,
        user_id = %user_id,
        deleted,
        markers_removed,
        "user notifications purged"
    );

    Json(ApiResponse::ok(PurgeResponse { deleted, markers_removed }))
}

#[derive(Debug, serde::Serialize)]
pub struct PurgeResponse {
    pub deleted: usize,
    pub markers_removed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipient_and_recipients_are_merged_without_duplicates() {
        let target = Uuid::new_v4();
        let req = CreateNotificationRequest {
            title: "t".into(),
            message: "m".into(),
            kind: "personal".into(),
            recipient: Some(target),
            recipients: vec![target],
            related_id: None,
        };
        assert_eq!(req.into_create().recipients, vec![target]);
    }

    #[test]
    fn no_recipients_means_broadcast() {
        let req = CreateNotificationRequest {
            title: "t".into(),
            message: "m".into(),
            kind: "broadcast".into(),
            recipient: None,
            recipients: vec![],
            related_id: None,
        };
        assert!(req.into_create().recipients.is_empty());
    }
}
