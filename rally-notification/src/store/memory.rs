use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use rally_shared::errors::{AppError, AppResult, ErrorCode};

use super::NotificationStore;
use crate::models::{NewNotification, Notification, ReadMarker};

/// In-memory backend. Selected with `store_backend = "memory"` for local
/// development and used by the test suite; mirrors every contract of the
/// Postgres backend, including marker cascade on notification delete.
#[derive(Default)]
pub struct MemoryNotificationStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    notifications: Vec<Notification>,
    markers: Vec<ReadMarker>,
}

impl MemoryNotificationStore {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Test hook: rewrite a notification's creation timestamp so retention
    /// behavior can be exercised without sleeping.
    #[cfg(test)]
    pub(crate) fn backdate(&self, id: Uuid, created_at: DateTime<Utc>) {
        let mut inner = self.lock();
        if let Some(n) = inner.notifications.iter_mut().find(|n| n.id == id) {
            n.created_at = created_at;
        }
    }
}

fn newest_first(mut items: Vec<Notification>) -> Vec<Notification> {
    // stable sort; ties keep reverse insertion order
    items.reverse();
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    items
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn create(&self, new: NewNotification) -> AppResult<Notification> {
        let notification = Notification {
            id: Uuid::new_v4(),
            recipient_id: new.recipient_id,
            kind: new.kind,
            title: new.title,
            message: new.message,
            related_id: new.related_id,
            is_read: false,
            created_at: Utc::now(),
        };

        self.lock().notifications.push(notification.clone());
        Ok(notification)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Notification>> {
        let inner = self.lock();
        Ok(inner.notifications.iter().find(|n| n.id == id).cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Notification>> {
        let inner = self.lock();
        let items = inner
            .notifications
            .iter()
            .filter(|n| n.recipient_id.is_none() || n.recipient_id == Some(user_id))
            .cloned()
            .collect();
        Ok(newest_first(items))
    }

    async fn list_broadcast(&self) -> AppResult<Vec<Notification>> {
        let inner = self.lock();
        let items = inner
            .notifications
            .iter()
            .filter(|n| n.recipient_id.is_none())
            .cloned()
            .collect();
        Ok(newest_first(items))
    }

    async fn read_marker_ids(&self, user_id: Uuid) -> AppResult<HashSet<Uuid>> {
        let inner = self.lock();
        Ok(inner
            .markers
            .iter()
            .filter(|m| m.user_id == user_id)
            .map(|m| m.notification_id)
            .collect())
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> AppResult<()> {
        let mut inner = self.lock();

        let recipient_id = {
            let notification = inner
                .notifications
                .iter()
                .find(|n| n.id == id)
                .ok_or_else(|| {
                    AppError::new(ErrorCode::NotificationNotFound, "notification not found")
                })?;
            notification.recipient_id
        };

        match recipient_id {
            Some(owner) if owner == user_id => {
                if let Some(n) = inner.notifications.iter_mut().find(|n| n.id == id) {
                    n.is_read = true;
                }
                Ok(())
            }
            Some(_) => Err(AppError::forbidden("notification belongs to another user")),
            None => {
                let already = inner
                    .markers
                    .iter()
                    .any(|m| m.user_id == user_id && m.notification_id == id);
                if !already {
                    inner.markers.push(ReadMarker {
                        user_id,
                        notification_id: id,
                        read_at: Utc::now(),
                    });
                }
                Ok(())
            }
        }
    }

    async fn mark_all_read(&self, user_id: Uuid) -> AppResult<usize> {
        let mut inner = self.lock();
        let mut marked = 0;

        for n in inner
            .notifications
            .iter_mut()
            .filter(|n| n.recipient_id == Some(user_id) && !n.is_read)
        {
            n.is_read = true;
            marked += 1;
        }

        let broadcast_ids: Vec<Uuid> = inner
            .notifications
            .iter()
            .filter(|n| n.recipient_id.is_none())
            .map(|n| n.id)
            .collect();

        for id in broadcast_ids {
            let already = inner
                .markers
                .iter()
                .any(|m| m.user_id == user_id && m.notification_id == id);
            if !already {
                inner.markers.push(ReadMarker {
                    user_id,
                    notification_id: id,
                    read_at: Utc::now(),
                });
                marked += 1;
            }
        }

        Ok(marked)
    }

    async fn delete_by_id(&self, id: Uuid) -> AppResult<bool> {
        let mut inner = self.lock();
        let before = inner.notifications.len();
        inner.notifications.retain(|n| n.id != id);
        let removed = inner.notifications.len() < before;
        if removed {
            inner.markers.retain(|m| m.notification_id != id);
        }
        Ok(removed)
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> AppResult<usize> {
        let mut inner = self.lock();
        let before = inner.notifications.len();
        inner
            .notifications
            .retain(|n| n.recipient_id != Some(user_id));
        Ok(before - inner.notifications.len())
    }

    async fn delete_read_markers_for_user(&self, user_id: Uuid) -> AppResult<usize> {
        let mut inner = self.lock();
        let before = inner.markers.len();
        inner.markers.retain(|m| m.user_id != user_id);
        Ok(before - inner.markers.len())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<usize> {
        let mut inner = self.lock();
        let expired: Vec<Uuid> = inner
            .notifications
            .iter()
            .filter(|n| n.created_at < cutoff)
            .map(|n| n.id)
            .collect();

        inner.notifications.retain(|n| n.created_at >= cutoff);
        inner
            .markers
            .retain(|m| !expired.contains(&m.notification_id));

        Ok(expired.len())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::services::read_state;

    fn personal(user_id: Uuid) -> NewNotification {
        NewNotification {
            recipient_id: Some(user_id),
            kind: "personal".into(),
            title: "Match ready".into(),
            message: "Your bracket slot is confirmed".into(),
            related_id: None,
        }
    }

    fn broadcast() -> NewNotification {
        NewNotification {
            recipient_id: None,
            kind: "broadcast".into(),
            title: "Server maintenance".into(),
            message: "Downtime at 02:00 UTC".into(),
            related_id: None,
        }
    }

    #[tokio::test]
    async fn create_assigns_id_and_starts_unread() {
        let store = MemoryNotificationStore::default();
        let user = Uuid::new_v4();

        let n = store.create(personal(user)).await.unwrap();
        assert!(!n.is_read);
        assert_eq!(n.recipient_id, Some(user));
        assert_eq!(store.get_by_id(n.id).await.unwrap().unwrap().id, n.id);
    }

    #[tokio::test]
    async fn list_for_user_merges_broadcast_newest_first() {
        let store = MemoryNotificationStore::default();
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();

        let old = store.create(broadcast()).await.unwrap();
        store.backdate(old.id, Utc::now() - Duration::hours(2));
        store.create(personal(user)).await.unwrap();
        store.create(personal(other)).await.unwrap();

        let items = store.list_for_user(user).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].recipient_id, Some(user));
        assert_eq!(items[1].id, old.id);
    }

    #[tokio::test]
    async fn marking_broadcast_twice_keeps_one_marker() {
        let store = MemoryNotificationStore::default();
        let user = Uuid::new_v4();
        let n = store.create(broadcast()).await.unwrap();

        store.mark_read(n.id, user).await.unwrap();
        store.mark_read(n.id, user).await.unwrap();

        let markers = store.read_marker_ids(user).await.unwrap();
        assert_eq!(markers.len(), 1);
        assert!(markers.contains(&n.id));
    }

    #[tokio::test]
    async fn mark_read_rejects_foreign_personal_notification() {
        let store = MemoryNotificationStore::default();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let n = store.create(personal(owner)).await.unwrap();

        assert!(store.mark_read(n.id, stranger).await.is_err());
        assert!(!store.get_by_id(n.id).await.unwrap().unwrap().is_read);
    }

    #[tokio::test]
    async fn mark_read_missing_id_is_not_found() {
        let store = MemoryNotificationStore::default();
        assert!(store.mark_read(Uuid::new_v4(), Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn broadcast_read_state_is_per_user() {
        // scenario: admin broadcasts, A reads, B's count is untouched
        let store = MemoryNotificationStore::default();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let n = store.create(broadcast()).await.unwrap();

        assert_eq!(read_state::unread_count_for_user(&store, alice).await.unwrap(), 1);
        assert_eq!(read_state::unread_count_for_user(&store, bob).await.unwrap(), 1);

        store.mark_read(n.id, alice).await.unwrap();

        assert_eq!(read_state::unread_count_for_user(&store, alice).await.unwrap(), 0);
        assert_eq!(read_state::unread_count_for_user(&store, bob).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn personal_round_trip_shows_read_in_view() {
        let store = MemoryNotificationStore::default();
        let user = Uuid::new_v4();
        let n = store.create(personal(user)).await.unwrap();

        store.mark_read(n.id, user).await.unwrap();

        let views = read_state::view_for_user(&store, user).await.unwrap();
        assert_eq!(views.len(), 1);
        assert!(views[0].is_read);
    }

    #[tokio::test]
    async fn mark_all_read_zeroes_unread_count() {
        let store = MemoryNotificationStore::default();
        let user = Uuid::new_v4();

        store.create(personal(user)).await.unwrap();
        store.create(personal(user)).await.unwrap();
        store.create(broadcast()).await.unwrap();

        let marked = store.mark_all_read(user).await.unwrap();
        assert_eq!(marked, 3);
        assert_eq!(read_state::unread_count_for_user(&store, user).await.unwrap(), 0);

        // second call has nothing left to mark
        assert_eq!(store.mark_all_read(user).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_all_for_user_preserves_broadcasts_and_markers() {
        let store = MemoryNotificationStore::default();
        let user = Uuid::new_v4();

        store.create(personal(user)).await.unwrap();
        store.create(personal(user)).await.unwrap();
        let b = store.create(broadcast()).await.unwrap();
        store.mark_read(b.id, user).await.unwrap();

        let deleted = store.delete_all_for_user(user).await.unwrap();
        assert_eq!(deleted, 2);

        assert_eq!(store.list_broadcast().await.unwrap().len(), 1);
        assert!(store.read_marker_ids(user).await.unwrap().contains(&b.id));
    }

    #[tokio::test]
    async fn account_cleanup_removes_only_that_users_markers() {
        // scenario: account deletion purges personal rows and A's markers,
        // leaving the broadcast row and B's marker alone
        let store = MemoryNotificationStore::default();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        for _ in 0..3 {
            store.create(personal(alice)).await.unwrap();
        }
        let b = store.create(broadcast()).await.unwrap();
        store.mark_read(b.id, alice).await.unwrap();
        store.mark_read(b.id, bob).await.unwrap();

        assert_eq!(store.delete_all_for_user(alice).await.unwrap(), 3);
        assert_eq!(store.delete_read_markers_for_user(alice).await.unwrap(), 1);

        assert_eq!(store.list_broadcast().await.unwrap().len(), 1);
        assert!(store.read_marker_ids(alice).await.unwrap().is_empty());
        assert!(store.read_marker_ids(bob).await.unwrap().contains(&b.id));
    }

    #[tokio::test]
    async fn delete_older_than_ignores_read_state() {
        let store = MemoryNotificationStore::default();
        let user = Uuid::new_v4();

        let stale = store.create(personal(user)).await.unwrap();
        store.backdate(stale.id, Utc::now() - Duration::hours(25));
        let stale_broadcast = store.create(broadcast()).await.unwrap();
        store.backdate(stale_broadcast.id, Utc::now() - Duration::hours(30));
        let fresh = store.create(personal(user)).await.unwrap();

        let cutoff = Utc::now() - Duration::hours(24);
        assert_eq!(store.delete_older_than(cutoff).await.unwrap(), 2);

        let remaining = store.list_for_user(user).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, fresh.id);
    }

    #[tokio::test]
    async fn delete_by_id_missing_returns_false() {
        let store = MemoryNotificationStore::default();
        assert!(!store.delete_by_id(Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn delete_by_id_cascades_markers() {
        let store = MemoryNotificationStore::default();
        let user = Uuid::new_v4();
        let b = store.create(broadcast()).await.unwrap();
        store.mark_read(b.id, user).await.unwrap();

        assert!(store.delete_by_id(b.id).await.unwrap());
        assert!(store.read_marker_ids(user).await.unwrap().is_empty());
    }
}
