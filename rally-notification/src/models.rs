use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::schema::{notification_reads, notifications};

/// A stored notification. `recipient_id = None` means broadcast: the row is
/// visible to every user and its `is_read` column is never consulted;
/// per-user read state for broadcasts lives in `notification_reads`.
#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = notifications)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Option<Uuid>,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub related_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn is_broadcast(&self) -> bool {
        self.recipient_id.is_none()
    }

    /// Turn the stored row into a per-user view with the read flag already
    /// resolved. The caller decides the flag; see `services::read_state`.
    pub fn into_view(self, is_read: bool) -> NotificationView {
        NotificationView {
            id: self.id,
            recipient_id: self.recipient_id,
            kind: self.kind,
            title: self.title,
            message: self.message,
            related_id: self.related_id,
            is_read,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotification {
    pub recipient_id: Option<Uuid>,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub related_id: Option<Uuid>,
}

/// Per-(user, broadcast notification) read receipt.
#[derive(Debug, Clone, Queryable, Serialize)]
#[diesel(table_name = notification_reads)]
pub struct ReadMarker {
    pub user_id: Uuid,
    pub notification_id: Uuid,
    pub read_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = notification_reads)]
pub struct NewReadMarker {
    pub user_id: Uuid,
    pub notification_id: Uuid,
}

/// What a specific user sees: the stored row with broadcast read state
/// merged in from their markers.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationView {
    pub id: Uuid,
    pub recipient_id: Option<Uuid>,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub related_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
