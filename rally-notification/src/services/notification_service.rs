use std::sync::Arc;

use uuid::Uuid;

use rally_shared::errors::AppResult;

use crate::models::{NewNotification, Notification};
use crate::socket::dispatcher;
use crate::AppState;

/// A validated creation request, already normalized by the route layer:
/// an empty recipient list means broadcast.
#[derive(Debug, Clone)]
pub struct CreateNotifications {
    pub kind: String,
    pub title: String,
    pub message: String,
    pub recipients: Vec<Uuid>,
    pub related_id: Option<Uuid>,
}

/// Persist the notification(s) and push fresh unread counts to every
/// affected live connection. Creation failures propagate; push failures
/// never do.
pub async fn create_and_dispatch(
    state: &Arc<AppState>,
    req: CreateNotifications,
) -> AppResult<Vec<Notification>> {
    if req.recipients.is_empty() {
        let notification = state
            .store
            .create(NewNotification {
                recipient_id: None,
                kind: req.kind,
                title: req.title,
                message: req.message,
                related_id: req.related_id,
            })
            .await?;

        dispatcher::notify_broadcast(state).await;
        return Ok(vec![notification]);
    }

    let mut created = Vec::with_capacity(req.recipients.len());
    for recipient in req.recipients {
        let notification = state
            .store
            .create(NewNotification {
                recipient_id: Some(recipient),
                kind: req.kind.clone(),
                title: req.title.clone(),
                message: req.message.clone(),
                related_id: req.related_id,
            })
            .await?;
        created.push(notification);

        dispatcher::notify_user(state, recipient).await;
    }

    Ok(created)
}
