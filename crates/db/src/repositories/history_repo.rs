//! Read-side repositories for the append-only audit collections.
//!
//! Inserts happen exclusively inside the `service_requests` mutation
//! transactions (see `service_request_repo`); these repositories expose no
//! update or delete operation at all.

use sqlx::PgPool;

use aftercare_core::types::DbId;

use crate::models::history::{ActivityLogRow, StatusHistoryRow};

/// Column list for `status_history` queries.
const HISTORY_COLUMNS: &str = "id, service_id, status, actor_id, note, created_at";

/// Column list for `activity_log` queries.
const ACTIVITY_COLUMNS: &str =
    "id, service_id, kind, actor_id, metadata, integrity_hash, created_at";

/// Read operations for the status history.
pub struct StatusHistoryRepo;

impl StatusHistoryRepo {
    /// All history entries for a service in commit order.
    pub async fn list_for_service(
        pool: &PgPool,
        service_id: DbId,
    ) -> Result<Vec<StatusHistoryRow>, sqlx::Error> {
        let query = format!(
            "SELECT {HISTORY_COLUMNS} FROM status_history \
             WHERE service_id = $1 \
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, StatusHistoryRow>(&query)
            .bind(service_id)
            .fetch_all(pool)
            .await
    }
}

/// Read operations for the activity log.
pub struct ActivityLogRepo;

impl ActivityLogRepo {
    /// All activity entries for a service in commit order.
    pub async fn list_for_service(
        pool: &PgPool,
        service_id: DbId,
    ) -> Result<Vec<ActivityLogRow>, sqlx::Error> {
        let query = format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activity_log \
             WHERE service_id = $1 \
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, ActivityLogRow>(&query)
            .bind(service_id)
            .fetch_all(pool)
            .await
    }

    /// The most recent integrity hash for a service's chain, if any.
    pub async fn last_hash(
        pool: &PgPool,
        service_id: DbId,
    ) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT integrity_hash FROM activity_log \
             WHERE service_id = $1 ORDER BY id DESC LIMIT 1",
        )
        .bind(service_id)
        .fetch_optional(pool)
        .await
    }
}
