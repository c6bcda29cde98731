//! Repository for the `units` and `developments` tables.

use sqlx::PgPool;

use aftercare_core::types::DbId;

use crate::models::unit::{Development, Unit};

/// Provides the ownership-chain resolution used by the authorization
/// matrix, plus creation helpers for seeding.
pub struct UnitRepo;

impl UnitRepo {
    /// Resolve the constructing company that owns a unit, through its
    /// development. Returns `None` for an unknown unit.
    pub async fn resolve_constructor(
        pool: &PgPool,
        unit_id: DbId,
    ) -> Result<Option<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT d.constructor_id FROM units u \
             JOIN developments d ON d.id = u.development_id \
             WHERE u.id = $1",
        )
        .bind(unit_id)
        .fetch_optional(pool)
        .await
    }

    /// Create a development for a constructing company.
    pub async fn create_development(
        pool: &PgPool,
        constructor_id: DbId,
        name: &str,
    ) -> Result<Development, sqlx::Error> {
        sqlx::query_as::<_, Development>(
            "INSERT INTO developments (constructor_id, name) VALUES ($1, $2) \
             RETURNING id, constructor_id, name, created_at",
        )
        .bind(constructor_id)
        .bind(name)
        .fetch_one(pool)
        .await
    }

    /// Create a unit within a development.
    pub async fn create_unit(
        pool: &PgPool,
        development_id: DbId,
        label: &str,
    ) -> Result<Unit, sqlx::Error> {
        sqlx::query_as::<_, Unit>(
            "INSERT INTO units (development_id, label) VALUES ($1, $2) \
             RETURNING id, development_id, label, created_at",
        )
        .bind(development_id)
        .bind(label)
        .fetch_one(pool)
        .await
    }
}
