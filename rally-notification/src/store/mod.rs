use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use rally_shared::errors::AppResult;

use crate::models::{NewNotification, Notification};

mod memory;
mod pg;

pub use memory::MemoryNotificationStore;
pub use pg::PgNotificationStore;

/// Persistence seam for notifications and broadcast read markers.
///
/// The backend is chosen exactly once at startup (see `main.rs`) and handed
/// down as `Arc<dyn NotificationStore>`; nothing re-decides storage at call
/// time. Ownership of a personal notification is validated by the HTTP
/// boundary before `mark_read` is called, but implementations enforce it
/// again and reject a foreign personal row with `Forbidden`.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Insert a notification; the store assigns id and creation timestamp
    /// and every row starts unread.
    async fn create(&self, new: NewNotification) -> AppResult<Notification>;

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Notification>>;

    /// The user's personal rows plus all broadcast rows, newest-first.
    /// Read state on broadcast rows is raw here; callers go through
    /// `services::read_state` before surfacing anything.
    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Notification>>;

    /// All broadcast rows, newest-first.
    async fn list_broadcast(&self) -> AppResult<Vec<Notification>>;

    /// Ids of broadcast notifications this user has already read.
    async fn read_marker_ids(&self, user_id: Uuid) -> AppResult<HashSet<Uuid>>;

    /// Personal row owned by the user: flip `is_read`. Broadcast row:
    /// insert a read marker, idempotently. Missing id: `NotificationNotFound`.
    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> AppResult<()>;

    /// Flip every unread personal row and insert markers for every broadcast
    /// row the user has not read yet. Returns how many items were newly
    /// marked.
    async fn mark_all_read(&self, user_id: Uuid) -> AppResult<usize>;

    /// Returns false (not an error) when the id does not exist. Deleting a
    /// notification also removes its read markers.
    async fn delete_by_id(&self, id: Uuid) -> AppResult<bool>;

    /// Delete the user's personal rows only. Broadcast rows and read
    /// markers (theirs or anyone else's) are untouched.
    async fn delete_all_for_user(&self, user_id: Uuid) -> AppResult<usize>;

    /// Account-cleanup companion to `delete_all_for_user`: drop the user's
    /// broadcast read markers.
    async fn delete_read_markers_for_user(&self, user_id: Uuid) -> AppResult<usize>;

    /// Retention sweep: delete every notification created before the cutoff,
    /// personal or broadcast, read or unread.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<usize>;
}
