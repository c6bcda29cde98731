//! Repository for the `service_requests` table.
//!
//! Every mutation here is a single transaction covering the row change,
//! the status-history append, and the activity-log append. Mutations are
//! compare-and-swap: the UPDATE / DELETE carries the expected
//! `(status, deletion_status)` pair in its WHERE clause, so a concurrent
//! writer that got there first makes this one report a stale guard instead
//! of silently overwriting.

use sqlx::PgPool;

use aftercare_core::activity::{canonical_entry_data, compute_integrity_hash};
use aftercare_core::lifecycle::ServiceStatus;
use aftercare_core::store::{
    NewActivityEntry, NewHistoryEntry, NewServiceRecord, RecordPatch, ServiceFilter, StateGuard,
};
use aftercare_core::types::DbId;

use crate::models::service_request::ServiceRequestRow;

/// Column list for `service_requests` queries.
const COLUMNS: &str = "\
    id, client_id, technician_id, unit_id, subject, description, \
    address, city, postal_code, latitude, longitude, \
    status, deletion_status, deletion_requested_by, deletion_requested_at, \
    completed_at, created_at, updated_at";

/// Outcome of a guarded mutation.
#[derive(Debug)]
pub enum MutationResult<T> {
    /// The guard matched and the mutation committed.
    Applied(T),
    /// The row exists but its state pair no longer matches the guard.
    StaleGuard,
    /// No row with this id exists.
    Missing,
}

/// Typed bind value for dynamically-built UPDATE statements.
enum BindValue {
    BigInt(DbId),
    Text(&'static str),
}

/// Provides guarded, transactional operations on service requests.
pub struct ServiceRequestRepo;

impl ServiceRequestRepo {
    /// Insert a new service request with its first history entry and its
    /// creation activity entry, in one transaction.
    pub async fn insert(
        pool: &PgPool,
        new: &NewServiceRecord,
        status: ServiceStatus,
        history: &NewHistoryEntry,
        activity: &NewActivityEntry,
    ) -> Result<ServiceRequestRow, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO service_requests \
                (client_id, technician_id, unit_id, subject, description, \
                 address, city, postal_code, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, ServiceRequestRow>(&query)
            .bind(new.client_id)
            .bind(new.technician_id)
            .bind(new.unit_id)
            .bind(&new.subject)
            .bind(&new.description)
            .bind(&new.address)
            .bind(&new.city)
            .bind(&new.postal_code)
            .bind(status.as_str())
            .fetch_one(&mut *tx)
            .await?;

        append_history(&mut tx, row.id, history).await?;
        append_activity(&mut tx, row.id, activity).await?;

        tx.commit().await?;
        Ok(row)
    }

    /// Find a service request by id.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<ServiceRequestRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM service_requests WHERE id = $1");
        sqlx::query_as::<_, ServiceRequestRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List service requests matching a visibility filter, newest first.
    pub async fn list(
        pool: &PgPool,
        filter: ServiceFilter,
    ) -> Result<Vec<ServiceRequestRow>, sqlx::Error> {
        match filter {
            ServiceFilter::All => {
                let query = format!(
                    "SELECT {COLUMNS} FROM service_requests \
                     ORDER BY created_at DESC, id DESC"
                );
                sqlx::query_as::<_, ServiceRequestRow>(&query)
                    .fetch_all(pool)
                    .await
            }
            ServiceFilter::ForClient(client_id) => {
                let query = format!(
                    "SELECT {COLUMNS} FROM service_requests \
                     WHERE client_id = $1 \
                     ORDER BY created_at DESC, id DESC"
                );
                sqlx::query_as::<_, ServiceRequestRow>(&query)
                    .bind(client_id)
                    .fetch_all(pool)
                    .await
            }
            ServiceFilter::ForTechnician(technician_id) => {
                // Assigned work plus the unassigned pending pool.
                let query = format!(
                    "SELECT {COLUMNS} FROM service_requests \
                     WHERE technician_id = $1 \
                        OR (technician_id IS NULL AND status = 'pending') \
                     ORDER BY created_at DESC, id DESC"
                );
                sqlx::query_as::<_, ServiceRequestRow>(&query)
                    .bind(technician_id)
                    .fetch_all(pool)
                    .await
            }
            ServiceFilter::ForConstructor(constructor_id) => {
                let query = format!(
                    "SELECT {COLUMNS} FROM service_requests \
                     WHERE unit_id IN ( \
                        SELECT u.id FROM units u \
                        JOIN developments d ON d.id = u.development_id \
                        WHERE d.constructor_id = $1) \
                     ORDER BY created_at DESC, id DESC"
                );
                sqlx::query_as::<_, ServiceRequestRow>(&query)
                    .bind(constructor_id)
                    .fetch_all(pool)
                    .await
            }
        }
    }

    /// Apply a guarded patch with its audit appends in one transaction.
    pub async fn transition(
        pool: &PgPool,
        id: DbId,
        guard: StateGuard,
        patch: &RecordPatch,
        history: Option<&NewHistoryEntry>,
        activity: &NewActivityEntry,
    ) -> Result<MutationResult<ServiceRequestRow>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        // Build the SET clause; $1..$3 are id and the guard pair.
        let mut sets: Vec<String> = vec!["updated_at = NOW()".to_string()];
        let mut bind_values: Vec<BindValue> = Vec::new();
        let mut bind_idx = 4u32;

        if let Some(status) = patch.status {
            sets.push(format!("status = ${bind_idx}"));
            bind_idx += 1;
            bind_values.push(BindValue::Text(status.as_str()));
        }
        if let Some(technician_id) = patch.technician_id {
            sets.push(format!("technician_id = ${bind_idx}"));
            bind_idx += 1;
            bind_values.push(BindValue::BigInt(technician_id));
        }
        if let Some(deletion_status) = patch.deletion_status {
            sets.push(format!("deletion_status = ${bind_idx}"));
            bind_idx += 1;
            bind_values.push(BindValue::Text(deletion_status.as_str()));
        }
        if let Some(requested_by) = patch.deletion_requested_by {
            sets.push(format!("deletion_requested_by = ${bind_idx}"));
            bind_values.push(BindValue::BigInt(requested_by));
            sets.push("deletion_requested_at = NOW()".to_string());
        }
        if patch.clear_deletion_request {
            sets.push("deletion_requested_by = NULL".to_string());
            sets.push("deletion_requested_at = NULL".to_string());
        }
        if patch.set_completed_at {
            sets.push("completed_at = NOW()".to_string());
        }

        let query = format!(
            "UPDATE service_requests SET {} \
             WHERE id = $1 AND status = $2 AND deletion_status = $3 \
             RETURNING {COLUMNS}",
            sets.join(", ")
        );

        let mut q = sqlx::query_as::<_, ServiceRequestRow>(&query)
            .bind(id)
            .bind(guard.status.as_str())
            .bind(guard.deletion_status.as_str());
        for val in &bind_values {
            match val {
                BindValue::BigInt(v) => q = q.bind(*v),
                BindValue::Text(v) => q = q.bind(*v),
            }
        }

        let row = q.fetch_optional(&mut *tx).await?;
        let Some(row) = row else {
            return Self::classify_miss(&mut tx, id).await;
        };

        if let Some(entry) = history {
            append_history(&mut tx, id, entry).await?;
        }
        append_activity(&mut tx, id, activity).await?;

        tx.commit().await?;
        Ok(MutationResult::Applied(row))
    }

    /// Hard-delete a row under guard, appending the given activity entries
    /// in the deleting transaction. The entries survive the row.
    pub async fn delete(
        pool: &PgPool,
        id: DbId,
        guard: StateGuard,
        activities: &[NewActivityEntry],
    ) -> Result<MutationResult<()>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let result = sqlx::query(
            "DELETE FROM service_requests \
             WHERE id = $1 AND status = $2 AND deletion_status = $3",
        )
        .bind(id)
        .bind(guard.status.as_str())
        .bind(guard.deletion_status.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Self::classify_miss(&mut tx, id).await;
        }

        for entry in activities {
            append_activity(&mut tx, id, entry).await?;
        }

        tx.commit().await?;
        Ok(MutationResult::Applied(()))
    }

    /// Store geocoded coordinates on a request. Returns `false` if the
    /// request no longer exists (deleted while the lookup was in flight).
    pub async fn set_coordinates(
        pool: &PgPool,
        id: DbId,
        latitude: f64,
        longitude: f64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE service_requests SET latitude = $2, longitude = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(latitude)
        .bind(longitude)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Whether the client has a completed request without a review.
    pub async fn has_unreviewed_completed(
        pool: &PgPool,
        client_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS( \
                SELECT 1 FROM service_requests sr \
                WHERE sr.client_id = $1 \
                  AND sr.status = 'completed' \
                  AND NOT EXISTS (SELECT 1 FROM reviews r WHERE r.service_id = sr.id))",
        )
        .bind(client_id)
        .fetch_one(pool)
        .await
    }

    /// Distinguish a stale guard from a missing row after a zero-row write.
    async fn classify_miss<T>(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: DbId,
    ) -> Result<MutationResult<T>, sqlx::Error> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM service_requests WHERE id = $1)")
                .bind(id)
                .fetch_one(&mut **tx)
                .await?;
        if exists {
            Ok(MutationResult::StaleGuard)
        } else {
            Ok(MutationResult::Missing)
        }
    }
}

/// Append a status-history entry inside an open transaction.
async fn append_history(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    service_id: DbId,
    entry: &NewHistoryEntry,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO status_history (service_id, status, actor_id, note) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(service_id)
    .bind(entry.status.as_str())
    .bind(entry.actor_id)
    .bind(&entry.note)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Append an activity entry inside an open transaction, chaining its
/// integrity hash off the previous entry for the same service.
///
/// The caller's row-level UPDATE/DELETE serializes concurrent appends for
/// one service, so reading the previous hash here is race-free.
async fn append_activity(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    service_id: DbId,
    entry: &NewActivityEntry,
) -> Result<(), sqlx::Error> {
    let prev_hash: Option<String> = sqlx::query_scalar(
        "SELECT integrity_hash FROM activity_log \
         WHERE service_id = $1 ORDER BY id DESC LIMIT 1",
    )
    .bind(service_id)
    .fetch_optional(&mut **tx)
    .await?;

    let data = canonical_entry_data(service_id, entry.kind, entry.actor_id, &entry.metadata);
    let integrity_hash = compute_integrity_hash(prev_hash.as_deref(), &data);

    sqlx::query(
        "INSERT INTO activity_log (service_id, kind, actor_id, metadata, integrity_hash) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(service_id)
    .bind(entry.kind)
    .bind(entry.actor_id)
    .bind(&entry.metadata)
    .bind(&integrity_hash)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
