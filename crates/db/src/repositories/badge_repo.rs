//! Repository for the `badges` table and the counters feeding badge rules.

use sqlx::PgPool;

use aftercare_core::badges::BadgeCounts;
use aftercare_core::roles::Role;
use aftercare_core::types::DbId;

use crate::models::badge::BadgeAward;

/// Column list for `badges` queries.
const COLUMNS: &str = "id, user_id, badge, awarded_at";

/// Provides award and query operations for badges.
pub struct BadgeRepo;

impl BadgeRepo {
    /// Award a badge to a user.
    ///
    /// Idempotent per `(user, badge)`: a repeat award is a no-op and
    /// returns `false`.
    pub async fn award(pool: &PgPool, user_id: DbId, badge: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO badges (user_id, badge) VALUES ($1, $2) \
             ON CONFLICT ON CONSTRAINT uq_badges_user_badge DO NOTHING",
        )
        .bind(user_id)
        .bind(badge)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All badges held by a user, in award order.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<BadgeAward>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM badges WHERE user_id = $1 ORDER BY awarded_at ASC, id ASC"
        );
        sqlx::query_as::<_, BadgeAward>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Gather the role-relevant counters for badge evaluation.
    pub async fn counts_for(
        pool: &PgPool,
        user_id: DbId,
        role: Role,
    ) -> Result<BadgeCounts, sqlx::Error> {
        let mut counts = BadgeCounts::default();
        match role {
            Role::Client => {
                counts.services_created = count(
                    pool,
                    "SELECT COUNT(*) FROM service_requests WHERE client_id = $1",
                    user_id,
                )
                .await?;
                counts.reviews_written =
                    count(pool, "SELECT COUNT(*) FROM reviews WHERE client_id = $1", user_id)
                        .await?;
            }
            Role::Technician => {
                counts.services_completed = count(
                    pool,
                    "SELECT COUNT(*) FROM service_requests \
                     WHERE technician_id = $1 AND status = 'completed'",
                    user_id,
                )
                .await?;
                counts.reviews_received = count(
                    pool,
                    "SELECT COUNT(*) FROM reviews WHERE technician_id = $1",
                    user_id,
                )
                .await?;
            }
            Role::Admin | Role::ConstructingCompany => {}
        }
        Ok(counts)
    }
}

async fn count(pool: &PgPool, query: &str, user_id: DbId) -> Result<u64, sqlx::Error> {
    let n: i64 = sqlx::query_scalar(query).bind(user_id).fetch_one(pool).await?;
    Ok(n.max(0) as u64)
}
