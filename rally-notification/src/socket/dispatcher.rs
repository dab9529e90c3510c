use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use socketioxide::extract::SocketRef;
use uuid::Uuid;

use crate::services::read_state;
use crate::AppState;

/// Event name for count-update frames pushed to clients.
pub const NOTIFICATION_UPDATE: &str = "notification_update";

/// Wire frame for a count update. `count` is an absolute value, never a
/// delta; frames from racing triggers are last-write-wins on the client.
/// `isHideAction` distinguishes a client-local dismiss from a real count.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFrame {
    pub count: i64,
    pub is_hide_action: bool,
}

impl UpdateFrame {
    pub fn count(count: i64) -> Self {
        Self {
            count,
            is_hide_action: false,
        }
    }

    pub fn hide() -> Self {
        Self {
            count: 0,
            is_hide_action: true,
        }
    }
}

fn user_room(user_id: Uuid) -> String {
    format!("user:{user_id}")
}

/// Recompute the user's unread count and push it to every connection bound
/// to them. Fire-and-forget: a failed count computation is logged and the
/// push skipped; a send to a connection that closed in the meantime is
/// dropped by the socket layer.
pub async fn notify_user(state: &Arc<AppState>, user_id: Uuid) {
    if !state.registry.is_user_connected(user_id) {
        return;
    }

    let count = match read_state::unread_count_for_user(state.store.as_ref(), user_id).await {
        Ok(count) => count,
        Err(e) => {
            tracing::error!(error = %e, user_id = %user_id, "failed to compute unread count for push");
            return;
        }
    };

    let _ = state
        .io
        .to(user_room(user_id))
        .emit(NOTIFICATION_UPDATE, &UpdateFrame::count(count));
}

/// Push a personalized count to every bound connection. Even for a
/// broadcast-triggered update the count differs per user, so it is computed
/// once per distinct bound user and fanned out to all their connections.
pub async fn notify_broadcast(state: &Arc<AppState>) {
    let users: HashSet<Uuid> = state
        .registry
        .all_bound()
        .into_iter()
        .map(|(_, user_id)| user_id)
        .collect();

    for user_id in users {
        notify_user(state, user_id).await;
    }
}

/// Client-local dismiss signal; touches no persisted state.
pub fn hide_for_user(state: &Arc<AppState>, user_id: Uuid) {
    let _ = state
        .io
        .to(user_room(user_id))
        .emit(NOTIFICATION_UPDATE, &UpdateFrame::hide());
}

/// Immediate push of the current count to a single just-authenticated
/// connection.
pub async fn send_current_count(state: &Arc<AppState>, socket: &SocketRef, user_id: Uuid) {
    let count = match read_state::unread_count_for_user(state.store.as_ref(), user_id).await {
        Ok(count) => count,
        Err(e) => {
            tracing::error!(error = %e, user_id = %user_id, "failed to compute unread count for push");
            return;
        }
    };

    let _ = socket.emit(NOTIFICATION_UPDATE, &UpdateFrame::count(count));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_frame_wire_shape() {
        let json = serde_json::to_string(&UpdateFrame::count(3)).unwrap();
        assert_eq!(json, r#"{"count":3,"isHideAction":false}"#);

        let json = serde_json::to_string(&UpdateFrame::hide()).unwrap();
        assert_eq!(json, r#"{"count":0,"isHideAction":true}"#);
    }
}
