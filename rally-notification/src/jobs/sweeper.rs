//! Retention sweeper: a pure scheduled task, never event-triggered.
//!
//! Each tick deletes every notification older than the retention window,
//! read or unread, personal or broadcast. A failed sweep is logged and the
//! next tick retries independently; a missed sweep needs no recovery since
//! the following one catches the larger backlog.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use crate::store::NotificationStore;

/// Spawn the background sweep loop. Call once at startup.
pub fn spawn(store: Arc<dyn NotificationStore>, cadence: Duration, retention: chrono::Duration) {
    tokio::spawn(async move {
        let mut interval = time::interval(cadence);
        loop {
            interval.tick().await;
            let cutoff = chrono::Utc::now() - retention;
            match store.delete_older_than(cutoff).await {
                Ok(0) => {}
                Ok(deleted) => {
                    tracing::info!(deleted, cutoff = %cutoff, "retention sweep removed expired notifications");
                }
                Err(e) => {
                    tracing::error!(error = %e, "retention sweep failed");
                }
            }
        }
    });
}
