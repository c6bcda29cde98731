//! Repository for the `notifications` table.
//!
//! Rows are written by the side-effect router and read back by the
//! notification endpoints; every query is scoped to one user.

use sqlx::PgPool;

use aftercare_core::types::DbId;

use crate::models::notification::Notification;

const COLUMNS: &str = "id, user_id, kind, service_id, body, is_read, read_at, created_at";

pub struct NotificationRepo;

impl NotificationRepo {
    /// Insert a notification and return its id.
    pub async fn create(
        pool: &PgPool,
        user_id: DbId,
        kind: &str,
        service_id: Option<DbId>,
        body: &str,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO notifications (user_id, kind, service_id, body) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(user_id)
        .bind(kind)
        .bind(service_id)
        .bind(body)
        .fetch_one(pool)
        .await
    }

    /// A page of the user's notifications, newest first, optionally
    /// restricted to unread ones.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        let unread_filter = if unread_only { "AND is_read = false" } else { "" };
        let query = format!(
            "SELECT {COLUMNS} FROM notifications WHERE user_id = $1 {unread_filter} \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Notification>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Acknowledge one notification. `false` when it does not exist, does
    /// not belong to the user, or was already read.
    pub async fn mark_read(
        pool: &PgPool,
        notification_id: DbId,
        user_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = true, read_at = NOW() \
             WHERE id = $1 AND user_id = $2 AND is_read = false",
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Acknowledge everything unread for a user; returns the count.
    pub async fn mark_all_read(pool: &PgPool, user_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = true, read_at = NOW() \
             WHERE user_id = $1 AND is_read = false",
        )
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// How many unread notifications the user has.
    pub async fn unread_count(pool: &PgPool, user_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = false",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
    }
}
