use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use uuid::Uuid;

use rally_shared::clients::db::DbPool;
use rally_shared::errors::{AppError, AppResult, ErrorCode};

use super::NotificationStore;
use crate::models::{NewNotification, NewReadMarker, Notification};
use crate::schema::{notification_reads, notifications};

/// Diesel/Postgres backend. The `notification_reads` table carries a
/// composite primary key on (user_id, notification_id) and an
/// ON DELETE CASCADE foreign key to `notifications`, which is what makes
/// marker upserts idempotent and per-id deletes clean up read state.
pub struct PgNotificationStore {
    pool: DbPool,
}

impl PgNotificationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> AppResult<PooledConnection<ConnectionManager<PgConnection>>> {
        self.pool.get().map_err(|e| {
            tracing::error!(error = %e, "failed to get db connection");
            AppError::internal("database connection error")
        })
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn create(&self, new: NewNotification) -> AppResult<Notification> {
        let mut conn = self.conn()?;

        let notification = diesel::insert_into(notifications::table)
            .values(&new)
            .get_result::<Notification>(&mut conn)?;

        tracing::debug!(
            notification_id = %notification.id,
            kind = %notification.kind,
            broadcast = notification.is_broadcast(),
            "notification created"
        );

        Ok(notification)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Notification>> {
        let mut conn = self.conn()?;

        let notification = notifications::table
            .find(id)
            .first::<Notification>(&mut conn)
            .optional()?;

        Ok(notification)
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Notification>> {
        let mut conn = self.conn()?;

        let items = notifications::table
            .filter(
                notifications::recipient_id
                    .eq(user_id)
                    .or(notifications::recipient_id.is_null()),
            )
            .order(notifications::created_at.desc())
            .load::<Notification>(&mut conn)?;

        Ok(items)
    }

    async fn list_broadcast(&self) -> AppResult<Vec<Notification>> {
        let mut conn = self.conn()?;

        let items = notifications::table
            .filter(notifications::recipient_id.is_null())
            .order(notifications::created_at.desc())
            .load::<Notification>(&mut conn)?;

        Ok(items)
    }

    async fn read_marker_ids(&self, user_id: Uuid) -> AppResult<HashSet<Uuid>> {
        let mut conn = self.conn()?;

        let ids: Vec<Uuid> = notification_reads::table
            .filter(notification_reads::user_id.eq(user_id))
            .select(notification_reads::notification_id)
            .load(&mut conn)?;

        Ok(ids.into_iter().collect())
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> AppResult<()> {
        let mut conn = self.conn()?;

        let notification = notifications::table
            .find(id)
            .first::<Notification>(&mut conn)
            .optional()?
            .ok_or_else(|| {
                AppError::new(ErrorCode::NotificationNotFound, "notification not found")
            })?;

        match notification.recipient_id {
            Some(owner) if owner == user_id => {
                diesel::update(notifications::table.find(id))
                    .set(notifications::is_read.eq(true))
                    .execute(&mut conn)?;
                Ok(())
            }
            Some(_) => Err(AppError::forbidden("notification belongs to another user")),
            None => {
                let marker = NewReadMarker {
                    user_id,
                    notification_id: id,
                };
                diesel::insert_into(notification_reads::table)
                    .values(&marker)
                    .on_conflict_do_nothing()
                    .execute(&mut conn)?;
                Ok(())
            }
        }
    }

    async fn mark_all_read(&self, user_id: Uuid) -> AppResult<usize> {
        let mut conn = self.conn()?;

        let updated = diesel::update(
            notifications::table
                .filter(notifications::recipient_id.eq(user_id))
                .filter(notifications::is_read.eq(false)),
        )
        .set(notifications::is_read.eq(true))
        .execute(&mut conn)?;

        let broadcast_ids: Vec<Uuid> = notifications::table
            .filter(notifications::recipient_id.is_null())
            .select(notifications::id)
            .load(&mut conn)?;

        let markers: Vec<NewReadMarker> = broadcast_ids
            .into_iter()
            .map(|notification_id| NewReadMarker {
                user_id,
                notification_id,
            })
            .collect();

        let inserted = if markers.is_empty() {
            0
        } else {
            diesel::insert_into(notification_reads::table)
                .values(&markers)
                .on_conflict_do_nothing()
                .execute(&mut conn)?
        };

        Ok(updated + inserted)
    }

    async fn delete_by_id(&self, id: Uuid) -> AppResult<bool> {
        let mut conn = self.conn()?;

        let deleted = diesel::delete(notifications::table.find(id)).execute(&mut conn)?;

        Ok(deleted > 0)
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> AppResult<usize> {
        let mut conn = self.conn()?;

        let deleted = diesel::delete(
            notifications::table.filter(notifications::recipient_id.eq(user_id)),
        )
        .execute(&mut conn)?;

        Ok(deleted)
    }

    async fn delete_read_markers_for_user(&self, user_id: Uuid) -> AppResult<usize> {
        let mut conn = self.conn()?;

        let deleted = diesel::delete(
            notification_reads::table.filter(notification_reads::user_id.eq(user_id)),
        )
        .execute(&mut conn)?;

        Ok(deleted)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<usize> {
        let mut conn = self.conn()?;

        let deleted = diesel::delete(
            notifications::table.filter(notifications::created_at.lt(cutoff)),
        )
        .execute(&mut conn)?;

        Ok(deleted)
    }
}
