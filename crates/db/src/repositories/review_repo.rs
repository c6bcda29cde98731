//! Repository for the `reviews` table.

use sqlx::PgPool;

use aftercare_core::types::DbId;

use crate::models::review::Review;

/// Column list for `reviews` queries.
const COLUMNS: &str = "id, service_id, client_id, technician_id, rating, comment, created_at";

/// Provides insert and lookup operations for reviews.
pub struct ReviewRepo;

impl ReviewRepo {
    /// Insert a review. The `uq_reviews_service` constraint rejects a
    /// second review for the same service.
    pub async fn insert(
        pool: &PgPool,
        service_id: DbId,
        client_id: DbId,
        technician_id: Option<DbId>,
        rating: i16,
        comment: Option<&str>,
    ) -> Result<Review, sqlx::Error> {
        let query = format!(
            "INSERT INTO reviews (service_id, client_id, technician_id, rating, comment) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Review>(&query)
            .bind(service_id)
            .bind(client_id)
            .bind(technician_id)
            .bind(rating)
            .bind(comment)
            .fetch_one(pool)
            .await
    }

    /// Find the review for a service, if one exists.
    pub async fn find_by_service(
        pool: &PgPool,
        service_id: DbId,
    ) -> Result<Option<Review>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM reviews WHERE service_id = $1");
        sqlx::query_as::<_, Review>(&query)
            .bind(service_id)
            .fetch_optional(pool)
            .await
    }
}
