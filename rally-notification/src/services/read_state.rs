//! Per-user read-state reconciliation.
//!
//! A broadcast row's stored `is_read` column means nothing: its read state
//! is per user and lives in `notification_reads`. Every list and every
//! unread count surfaced anywhere must pass through here; counting unread
//! rows straight off the table is how count-mismatch bugs happen.

use std::collections::HashSet;

use uuid::Uuid;

use rally_shared::errors::AppResult;

use crate::models::{Notification, NotificationView};
use crate::store::NotificationStore;

/// Merge raw rows with the user's broadcast read markers. Personal rows
/// keep their stored flag; broadcast rows are read iff a marker exists.
pub fn reconcile(notifications: Vec<Notification>, read_ids: &HashSet<Uuid>) -> Vec<NotificationView> {
    notifications
        .into_iter()
        .map(|n| {
            let is_read = match n.recipient_id {
                Some(_) => n.is_read,
                None => read_ids.contains(&n.id),
            };
            n.into_view(is_read)
        })
        .collect()
}

pub fn unread_count(views: &[NotificationView]) -> i64 {
    views.iter().filter(|v| !v.is_read).count() as i64
}

/// The user's full reconciled notification list, newest-first.
pub async fn view_for_user(
    store: &dyn NotificationStore,
    user_id: Uuid,
) -> AppResult<Vec<NotificationView>> {
    let raw = store.list_for_user(user_id).await?;
    let read_ids = store.read_marker_ids(user_id).await?;
    Ok(reconcile(raw, &read_ids))
}

pub async fn unread_count_for_user(
    store: &dyn NotificationStore,
    user_id: Uuid,
) -> AppResult<i64> {
    let views = view_for_user(store, user_id).await?;
    Ok(unread_count(&views))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn row(recipient_id: Option<Uuid>, is_read: bool) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            recipient_id,
            kind: "tournament".into(),
            title: "Bracket updated".into(),
            message: "Round 2 pairings are live".into(),
            related_id: None,
            is_read,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn broadcast_read_state_comes_only_from_markers() {
        let unread = row(None, false);
        // stored flag is stale garbage for broadcasts; it must be ignored
        let mut tainted = row(None, false);
        tainted.is_read = true;

        let mut read_ids = HashSet::new();
        read_ids.insert(unread.id);

        let views = reconcile(vec![unread.clone(), tainted.clone()], &read_ids);
        assert!(views.iter().find(|v| v.id == unread.id).unwrap().is_read);
        assert!(!views.iter().find(|v| v.id == tainted.id).unwrap().is_read);
    }

    #[test]
    fn personal_rows_keep_their_stored_flag() {
        let user = Uuid::new_v4();
        let read = row(Some(user), true);
        let unread = row(Some(user), false);

        // a marker for a personal row must not flip anything
        let mut read_ids = HashSet::new();
        read_ids.insert(unread.id);

        let views = reconcile(vec![read.clone(), unread.clone()], &read_ids);
        assert!(views.iter().find(|v| v.id == read.id).unwrap().is_read);
        assert!(!views.iter().find(|v| v.id == unread.id).unwrap().is_read);
    }

    #[test]
    fn unread_count_counts_reconciled_views() {
        let user = Uuid::new_v4();
        let views = reconcile(
            vec![row(Some(user), true), row(Some(user), false), row(None, false)],
            &HashSet::new(),
        );
        assert_eq!(unread_count(&views), 2);
    }
}
