//! Storage contract for the lifecycle engine.
//!
//! [`ServiceStore`] is the single seam between the domain logic and the
//! backing store. Implementations must make every mutating call a single
//! atomic unit: the field changes, the status-history append, and the
//! activity-log append either all commit or none do. Mutations carry a
//! [`StateGuard`] — the `(status, deletion_status)` pair the engine read —
//! and must fail with [`CoreError::Conflict`] when the stored pair no
//! longer matches, so two concurrent callers can never both win mutually
//! exclusive transitions.
//!
//! The production implementation lives in the `aftercare-db` crate
//! (Postgres); [`MemoryStore`](crate::memory::MemoryStore) backs the test
//! suite.

use async_trait::async_trait;
use serde::Serialize;

use crate::capability::ServiceView;
use crate::deletion::DeletionStatus;
use crate::error::CoreError;
use crate::lifecycle::ServiceStatus;
use crate::types::{DbId, Timestamp};

/// A persisted service request.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceRecord {
    pub id: DbId,
    pub client_id: DbId,
    pub technician_id: Option<DbId>,
    pub unit_id: Option<DbId>,
    pub subject: String,
    pub description: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: ServiceStatus,
    pub deletion_status: DeletionStatus,
    pub deletion_requested_by: Option<DbId>,
    pub deletion_requested_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ServiceRecord {
    /// Snapshot for the authorization matrix, with the owning company
    /// already resolved.
    pub fn view(&self, constructing_company_id: Option<DbId>) -> ServiceView {
        ServiceView {
            client_id: self.client_id,
            technician_id: self.technician_id,
            status: self.status,
            deletion_status: self.deletion_status,
            constructing_company_id,
        }
    }

    /// The guard pair for a compare-and-swap mutation based on this
    /// snapshot.
    pub fn guard(&self) -> StateGuard {
        StateGuard {
            status: self.status,
            deletion_status: self.deletion_status,
        }
    }
}

/// Input for creating a service request.
#[derive(Debug, Clone)]
pub struct NewServiceRecord {
    pub client_id: DbId,
    pub technician_id: Option<DbId>,
    pub unit_id: Option<DbId>,
    pub subject: String,
    pub description: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
}

impl NewServiceRecord {
    /// Reject structurally incomplete input before anything is persisted.
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut missing = Vec::new();
        if self.subject.trim().is_empty() {
            missing.push("subject");
        }
        if self.address.trim().is_empty() {
            missing.push("address");
        }
        if self.city.trim().is_empty() {
            missing.push("city");
        }
        if self.postal_code.trim().is_empty() {
            missing.push("postal_code");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )))
        }
    }
}

/// One entry in a service's append-only status history.
#[derive(Debug, Clone, Serialize)]
pub struct StatusHistoryEntry {
    pub id: DbId,
    pub service_id: DbId,
    pub status: ServiceStatus,
    pub actor_id: DbId,
    pub note: Option<String>,
    pub created_at: Timestamp,
}

/// A status-history entry to append alongside a transition.
#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
    pub status: ServiceStatus,
    pub actor_id: DbId,
    pub note: Option<String>,
}

/// One entry in a service's append-only activity log.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityLogEntry {
    pub id: DbId,
    pub service_id: DbId,
    pub kind: String,
    pub actor_id: DbId,
    pub metadata: serde_json::Value,
    pub integrity_hash: String,
    pub created_at: Timestamp,
}

/// An activity entry to append alongside a mutation. The store computes
/// the integrity hash from the per-service chain at append time.
#[derive(Debug, Clone)]
pub struct NewActivityEntry {
    pub kind: &'static str,
    pub actor_id: DbId,
    pub metadata: serde_json::Value,
}

/// The `(status, deletion_status)` pair a mutation was decided against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateGuard {
    pub status: ServiceStatus,
    pub deletion_status: DeletionStatus,
}

/// Field changes to apply in one committed transition.
///
/// Timestamps (`updated_at`, `deletion_requested_at`, `completed_at`) are
/// stamped by the store at commit time.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    pub status: Option<ServiceStatus>,
    pub technician_id: Option<DbId>,
    pub deletion_status: Option<DeletionStatus>,
    /// Stamp the deletion requester and request time.
    pub deletion_requested_by: Option<DbId>,
    /// Clear all deletion metadata (rejected requests).
    pub clear_deletion_request: bool,
    /// Stamp `completed_at` with the commit time.
    pub set_completed_at: bool,
}

/// Role-derived visibility filter for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceFilter {
    /// Every record (admins).
    All,
    /// Records owned by this client.
    ForClient(DbId),
    /// Records assigned to this technician, plus the unassigned pending
    /// pool.
    ForTechnician(DbId),
    /// Records whose unit belongs to one of this company's developments.
    ForConstructor(DbId),
}

/// Storage operations consumed by the lifecycle engine.
#[async_trait]
pub trait ServiceStore: Send + Sync {
    /// Persist a new service request together with its first history entry
    /// and its `service_created` activity entry, atomically.
    async fn insert_service(
        &self,
        new: NewServiceRecord,
        status: ServiceStatus,
        history: NewHistoryEntry,
        activity: NewActivityEntry,
    ) -> Result<ServiceRecord, CoreError>;

    /// Fetch a consistent snapshot of a record, or `None` if it does not
    /// exist.
    async fn fetch_service(&self, id: DbId) -> Result<Option<ServiceRecord>, CoreError>;

    /// List records matching a visibility filter, newest first.
    async fn list_services(&self, filter: ServiceFilter) -> Result<Vec<ServiceRecord>, CoreError>;

    /// Apply `patch` to a record if and only if its current state matches
    /// `guard`, appending the given history / activity entries in the same
    /// transaction. Guard mismatch yields `Conflict`; a missing record
    /// yields `NotFound`.
    async fn commit_transition(
        &self,
        id: DbId,
        guard: StateGuard,
        patch: RecordPatch,
        history: Option<NewHistoryEntry>,
        activity: NewActivityEntry,
    ) -> Result<ServiceRecord, CoreError>;

    /// Hard-delete a record under the same guard semantics as
    /// [`commit_transition`]. The activity entries are appended in the
    /// deleting transaction and survive the record.
    async fn delete_service(
        &self,
        id: DbId,
        guard: StateGuard,
        activities: Vec<NewActivityEntry>,
    ) -> Result<(), CoreError>;

    /// Status history for one service, ordered by commit order ascending.
    async fn status_history(&self, service_id: DbId)
        -> Result<Vec<StatusHistoryEntry>, CoreError>;

    /// Activity log for one service, ordered by commit order ascending.
    /// Entries survive hard deletion of the service itself.
    async fn activity_log(&self, service_id: DbId) -> Result<Vec<ActivityLogEntry>, CoreError>;

    /// Resolve the owning constructing company of a unit through its
    /// development, or `None` for an unknown unit.
    async fn resolve_constructing_company(
        &self,
        unit_id: DbId,
    ) -> Result<Option<DbId>, CoreError>;

    /// Whether the client has any completed service request that has not
    /// been reviewed yet.
    async fn has_unreviewed_completed(&self, client_id: DbId) -> Result<bool, CoreError>;

    /// Record a review for a completed service. A second review for the
    /// same service yields `Conflict`.
    async fn insert_review(
        &self,
        service_id: DbId,
        client_id: DbId,
        technician_id: Option<DbId>,
        rating: i16,
        comment: Option<String>,
    ) -> Result<(), CoreError>;
}
