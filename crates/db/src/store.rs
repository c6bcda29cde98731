//! Production [`ServiceStore`] over Postgres.
//!
//! Thin adapter from the engine's storage contract onto the repository
//! layer: rows are parsed into domain records, guarded-mutation outcomes
//! map onto `Conflict` / `NotFound`, and raw database failures surface as
//! `Internal` after being traced.

use async_trait::async_trait;

use aftercare_core::error::CoreError;
use aftercare_core::lifecycle::ServiceStatus;
use aftercare_core::store::{
    ActivityLogEntry, NewActivityEntry, NewHistoryEntry, NewServiceRecord, RecordPatch,
    ServiceFilter, ServiceRecord, ServiceStore, StateGuard, StatusHistoryEntry,
};
use aftercare_core::types::DbId;

use crate::repositories::{
    ActivityLogRepo, MutationResult, ReviewRepo, ServiceRequestRepo, StatusHistoryRepo, UnitRepo,
};
use crate::DbPool;

/// Postgres-backed service store.
#[derive(Clone)]
pub struct PgServiceStore {
    pool: DbPool,
}

impl PgServiceStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ServiceStore for PgServiceStore {
    async fn insert_service(
        &self,
        new: NewServiceRecord,
        status: ServiceStatus,
        history: NewHistoryEntry,
        activity: NewActivityEntry,
    ) -> Result<ServiceRecord, CoreError> {
        let row = ServiceRequestRepo::insert(&self.pool, &new, status, &history, &activity)
            .await
            .map_err(internal)?;
        row.into_record()
    }

    async fn fetch_service(&self, id: DbId) -> Result<Option<ServiceRecord>, CoreError> {
        match ServiceRequestRepo::find_by_id(&self.pool, id)
            .await
            .map_err(internal)?
        {
            Some(row) => Ok(Some(row.into_record()?)),
            None => Ok(None),
        }
    }

    async fn list_services(&self, filter: ServiceFilter) -> Result<Vec<ServiceRecord>, CoreError> {
        let rows = ServiceRequestRepo::list(&self.pool, filter)
            .await
            .map_err(internal)?;
        rows.into_iter().map(|row| row.into_record()).collect()
    }

    async fn commit_transition(
        &self,
        id: DbId,
        guard: StateGuard,
        patch: RecordPatch,
        history: Option<NewHistoryEntry>,
        activity: NewActivityEntry,
    ) -> Result<ServiceRecord, CoreError> {
        let result = ServiceRequestRepo::transition(
            &self.pool,
            id,
            guard,
            &patch,
            history.as_ref(),
            &activity,
        )
        .await
        .map_err(internal)?;
        match result {
            MutationResult::Applied(row) => row.into_record(),
            MutationResult::StaleGuard => Err(stale_guard()),
            MutationResult::Missing => Err(not_found(id)),
        }
    }

    async fn delete_service(
        &self,
        id: DbId,
        guard: StateGuard,
        activities: Vec<NewActivityEntry>,
    ) -> Result<(), CoreError> {
        let result = ServiceRequestRepo::delete(&self.pool, id, guard, &activities)
            .await
            .map_err(internal)?;
        match result {
            MutationResult::Applied(()) => Ok(()),
            MutationResult::StaleGuard => Err(stale_guard()),
            MutationResult::Missing => Err(not_found(id)),
        }
    }

    async fn status_history(
        &self,
        service_id: DbId,
    ) -> Result<Vec<StatusHistoryEntry>, CoreError> {
        let rows = StatusHistoryRepo::list_for_service(&self.pool, service_id)
            .await
            .map_err(internal)?;
        rows.into_iter().map(|row| row.into_entry()).collect()
    }

    async fn activity_log(&self, service_id: DbId) -> Result<Vec<ActivityLogEntry>, CoreError> {
        let rows = ActivityLogRepo::list_for_service(&self.pool, service_id)
            .await
            .map_err(internal)?;
        Ok(rows.into_iter().map(|row| row.into_entry()).collect())
    }

    async fn resolve_constructing_company(
        &self,
        unit_id: DbId,
    ) -> Result<Option<DbId>, CoreError> {
        UnitRepo::resolve_constructor(&self.pool, unit_id)
            .await
            .map_err(internal)
    }

    async fn has_unreviewed_completed(&self, client_id: DbId) -> Result<bool, CoreError> {
        ServiceRequestRepo::has_unreviewed_completed(&self.pool, client_id)
            .await
            .map_err(internal)
    }

    async fn insert_review(
        &self,
        service_id: DbId,
        client_id: DbId,
        technician_id: Option<DbId>,
        rating: i16,
        comment: Option<String>,
    ) -> Result<(), CoreError> {
        ReviewRepo::insert(
            &self.pool,
            service_id,
            client_id,
            technician_id,
            rating,
            comment.as_deref(),
        )
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                CoreError::Conflict("this service request has already been reviewed".to_string())
            } else {
                internal(err)
            }
        })?;
        Ok(())
    }
}

fn not_found(id: DbId) -> CoreError {
    CoreError::NotFound {
        entity: "ServiceRequest",
        id,
    }
}

fn stale_guard() -> CoreError {
    CoreError::Conflict(
        "the service request was modified concurrently; retry the operation".to_string(),
    )
}

fn internal(err: sqlx::Error) -> CoreError {
    tracing::error!(error = %err, "Database error");
    CoreError::Internal("database error".to_string())
}

/// PostgreSQL unique constraint violation: error code 23505.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505")
    )
}
