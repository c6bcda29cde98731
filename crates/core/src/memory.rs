//! In-memory [`ServiceStore`] implementation.
//!
//! Backs the engine test suite and local tooling. Mutations take the whole
//! store lock for their duration, which gives the same atomicity and
//! guard semantics as the transactional Postgres implementation.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::activity::{canonical_entry_data, compute_integrity_hash};
use crate::deletion::DeletionStatus;
use crate::error::CoreError;
use crate::lifecycle::ServiceStatus;
use crate::store::{
    ActivityLogEntry, NewActivityEntry, NewHistoryEntry, NewServiceRecord, RecordPatch,
    ServiceFilter, ServiceRecord, ServiceStore, StateGuard, StatusHistoryEntry,
};
use crate::types::DbId;

#[derive(Default)]
struct Inner {
    next_service_id: DbId,
    next_history_id: DbId,
    next_activity_id: DbId,
    services: BTreeMap<DbId, ServiceRecord>,
    history: Vec<StatusHistoryEntry>,
    activity: Vec<ActivityLogEntry>,
    /// unit id -> owning constructor id
    units: BTreeMap<DbId, DbId>,
    /// service id -> (client id, technician id)
    reviews: BTreeMap<DbId, (DbId, Option<DbId>)>,
}

/// In-memory store with the full [`ServiceStore`] contract.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unit as belonging to a constructing company, for
    /// ownership resolution.
    pub fn add_unit(&self, unit_id: DbId, constructor_id: DbId) {
        let mut inner = self.lock();
        inner.units.insert(unit_id, constructor_id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory store lock poisoned")
    }
}

impl Inner {
    fn check_guard(&self, id: DbId, guard: StateGuard) -> Result<&ServiceRecord, CoreError> {
        let record = self.services.get(&id).ok_or(CoreError::NotFound {
            entity: "ServiceRequest",
            id,
        })?;
        if record.status != guard.status || record.deletion_status != guard.deletion_status {
            return Err(CoreError::Conflict(
                "the service request was modified concurrently; retry the operation".to_string(),
            ));
        }
        Ok(record)
    }

    fn append_history(&mut self, service_id: DbId, entry: NewHistoryEntry) {
        self.next_history_id += 1;
        self.history.push(StatusHistoryEntry {
            id: self.next_history_id,
            service_id,
            status: entry.status,
            actor_id: entry.actor_id,
            note: entry.note,
            created_at: Utc::now(),
        });
    }

    fn append_activity(&mut self, service_id: DbId, entry: NewActivityEntry) {
        let prev_hash = self
            .activity
            .iter()
            .rev()
            .find(|e| e.service_id == service_id)
            .map(|e| e.integrity_hash.clone());
        let data = canonical_entry_data(service_id, entry.kind, entry.actor_id, &entry.metadata);
        let integrity_hash = compute_integrity_hash(prev_hash.as_deref(), &data);
        self.next_activity_id += 1;
        self.activity.push(ActivityLogEntry {
            id: self.next_activity_id,
            service_id,
            kind: entry.kind.to_string(),
            actor_id: entry.actor_id,
            metadata: entry.metadata,
            integrity_hash,
            created_at: Utc::now(),
        });
    }
}

#[async_trait]
impl ServiceStore for MemoryStore {
    async fn insert_service(
        &self,
        new: NewServiceRecord,
        status: ServiceStatus,
        history: NewHistoryEntry,
        activity: NewActivityEntry,
    ) -> Result<ServiceRecord, CoreError> {
        let mut inner = self.lock();
        inner.next_service_id += 1;
        let id = inner.next_service_id;
        let now = Utc::now();
        let record = ServiceRecord {
            id,
            client_id: new.client_id,
            technician_id: new.technician_id,
            unit_id: new.unit_id,
            subject: new.subject,
            description: new.description,
            address: new.address,
            city: new.city,
            postal_code: new.postal_code,
            latitude: None,
            longitude: None,
            status,
            deletion_status: DeletionStatus::None,
            deletion_requested_by: None,
            deletion_requested_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        inner.services.insert(id, record.clone());
        inner.append_history(id, history);
        inner.append_activity(id, activity);
        Ok(record)
    }

    async fn fetch_service(&self, id: DbId) -> Result<Option<ServiceRecord>, CoreError> {
        Ok(self.lock().services.get(&id).cloned())
    }

    async fn list_services(&self, filter: ServiceFilter) -> Result<Vec<ServiceRecord>, CoreError> {
        let inner = self.lock();
        let mut records: Vec<ServiceRecord> = inner
            .services
            .values()
            .filter(|s| match filter {
                ServiceFilter::All => true,
                ServiceFilter::ForClient(client_id) => s.client_id == client_id,
                ServiceFilter::ForTechnician(technician_id) => {
                    s.technician_id == Some(technician_id)
                        || (s.technician_id.is_none() && s.status == ServiceStatus::Pending)
                }
                ServiceFilter::ForConstructor(constructor_id) => s
                    .unit_id
                    .and_then(|unit| inner.units.get(&unit))
                    .is_some_and(|owner| *owner == constructor_id),
            })
            .cloned()
            .collect();
        records.reverse(); // newest first
        Ok(records)
    }

    async fn commit_transition(
        &self,
        id: DbId,
        guard: StateGuard,
        patch: RecordPatch,
        history: Option<NewHistoryEntry>,
        activity: NewActivityEntry,
    ) -> Result<ServiceRecord, CoreError> {
        let mut inner = self.lock();
        let now = Utc::now();

        let record = inner.services.get_mut(&id).ok_or(CoreError::NotFound {
            entity: "ServiceRequest",
            id,
        })?;
        if record.status != guard.status || record.deletion_status != guard.deletion_status {
            return Err(CoreError::Conflict(
                "the service request was modified concurrently; retry the operation".to_string(),
            ));
        }

        if let Some(status) = patch.status {
            record.status = status;
        }
        if let Some(technician_id) = patch.technician_id {
            record.technician_id = Some(technician_id);
        }
        if let Some(deletion_status) = patch.deletion_status {
            record.deletion_status = deletion_status;
        }
        if let Some(requested_by) = patch.deletion_requested_by {
            record.deletion_requested_by = Some(requested_by);
            record.deletion_requested_at = Some(now);
        }
        if patch.clear_deletion_request {
            record.deletion_requested_by = None;
            record.deletion_requested_at = None;
        }
        if patch.set_completed_at {
            record.completed_at = Some(now);
        }
        record.updated_at = now;
        let updated = record.clone();

        if let Some(entry) = history {
            inner.append_history(id, entry);
        }
        inner.append_activity(id, activity);
        Ok(updated)
    }

    async fn delete_service(
        &self,
        id: DbId,
        guard: StateGuard,
        activities: Vec<NewActivityEntry>,
    ) -> Result<(), CoreError> {
        let mut inner = self.lock();
        inner.check_guard(id, guard)?;
        inner.services.remove(&id);
        // History and activity entries survive the record.
        for entry in activities {
            inner.append_activity(id, entry);
        }
        Ok(())
    }

    async fn status_history(
        &self,
        service_id: DbId,
    ) -> Result<Vec<StatusHistoryEntry>, CoreError> {
        Ok(self
            .lock()
            .history
            .iter()
            .filter(|e| e.service_id == service_id)
            .cloned()
            .collect())
    }

    async fn activity_log(&self, service_id: DbId) -> Result<Vec<ActivityLogEntry>, CoreError> {
        Ok(self
            .lock()
            .activity
            .iter()
            .filter(|e| e.service_id == service_id)
            .cloned()
            .collect())
    }

    async fn resolve_constructing_company(
        &self,
        unit_id: DbId,
    ) -> Result<Option<DbId>, CoreError> {
        Ok(self.lock().units.get(&unit_id).copied())
    }

    async fn has_unreviewed_completed(&self, client_id: DbId) -> Result<bool, CoreError> {
        let inner = self.lock();
        Ok(inner.services.values().any(|s| {
            s.client_id == client_id
                && s.status == ServiceStatus::Completed
                && !inner.reviews.contains_key(&s.id)
        }))
    }

    async fn insert_review(
        &self,
        service_id: DbId,
        client_id: DbId,
        technician_id: Option<DbId>,
        _rating: i16,
        _comment: Option<String>,
    ) -> Result<(), CoreError> {
        let mut inner = self.lock();
        if inner.reviews.contains_key(&service_id) {
            return Err(CoreError::Conflict(
                "this service request has already been reviewed".to_string(),
            ));
        }
        inner.reviews.insert(service_id, (client_id, technician_id));
        Ok(())
    }
}
