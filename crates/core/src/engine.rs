//! The lifecycle engine: every public operation on service requests.
//!
//! Each mutating operation follows the same shape: snapshot the record,
//! run the authorization matrix over it, validate the transition, then
//! commit through the store with the snapshot's state pair as a
//! compare-and-swap guard. Only after the commit does the engine hand the
//! resulting event to the effect sink; a failed or lost side effect never
//! rolls back a committed transition.

use std::sync::Arc;

use serde_json::json;

use crate::activity::{event_kinds, transition_metadata};
use crate::capability::{self, Capability, ServiceView};
use crate::deletion::{self, DeletionDisposition, DeletionStatus};
use crate::effects::{EffectSink, LifecycleEvent};
use crate::error::CoreError;
use crate::lifecycle::{self, ServiceStatus};
use crate::roles::{Actor, Role};
use crate::store::{
    ActivityLogEntry, NewActivityEntry, NewHistoryEntry, NewServiceRecord, RecordPatch,
    ServiceFilter, ServiceRecord, ServiceStore, StatusHistoryEntry,
};
use crate::types::DbId;

/// Result of a delete request or a deletion resolution.
#[derive(Debug)]
pub enum DeletionOutcome {
    /// The record was hard-deleted.
    Deleted,
    /// The record is parked awaiting technician sign-off.
    PendingApproval(ServiceRecord),
    /// The request was denied; the record remains fully active.
    Rejected(ServiceRecord),
}

/// Coordinates the authorization matrix, the two state machines, the audit
/// trail, and side-effect dispatch over a [`ServiceStore`].
pub struct LifecycleEngine {
    store: Arc<dyn ServiceStore>,
    effects: Arc<dyn EffectSink>,
}

impl LifecycleEngine {
    pub fn new(store: Arc<dyn ServiceStore>, effects: Arc<dyn EffectSink>) -> Self {
        Self { store, effects }
    }

    /// Create a service request.
    ///
    /// Clients create for themselves; constructing companies and admins may
    /// create on a client's behalf. Supplying a technician at creation time
    /// starts the request directly in `scheduled` (creation-time assignment
    /// is not a post-hoc mutation and skips the matrix).
    pub async fn create_service(
        &self,
        actor: &Actor,
        input: NewServiceRecord,
    ) -> Result<ServiceRecord, CoreError> {
        match actor.role {
            Role::Technician => {
                return Err(CoreError::Forbidden(
                    "technicians cannot create service requests".to_string(),
                ))
            }
            Role::Client if input.client_id != actor.id => {
                return Err(CoreError::Forbidden(
                    "clients may only create service requests for themselves".to_string(),
                ))
            }
            _ => {}
        }
        input.validate()?;

        // A completed request awaiting review blocks new requests for the
        // client. This is a creation precondition, not a lifecycle rule.
        if self.store.has_unreviewed_completed(input.client_id).await? {
            return Err(CoreError::Conflict(
                "a completed service request is awaiting review; \
                 submit the review before filing a new request"
                    .to_string(),
            ));
        }

        let initial = if input.technician_id.is_some() {
            ServiceStatus::Scheduled
        } else {
            ServiceStatus::Pending
        };
        let history = NewHistoryEntry {
            status: initial,
            actor_id: actor.id,
            note: None,
        };
        let activity = NewActivityEntry {
            kind: event_kinds::SERVICE_CREATED,
            actor_id: actor.id,
            metadata: json!({
                "requester_role": actor.role.as_str(),
                "client_id": input.client_id,
                "technician_id": input.technician_id,
            }),
        };
        let record = self
            .store
            .insert_service(input, initial, history, activity)
            .await?;

        self.effects.dispatch(LifecycleEvent::Created {
            service_id: record.id,
            client_id: record.client_id,
            address: record.address.clone(),
        });
        if let Some(technician_id) = record.technician_id {
            self.effects.dispatch(LifecycleEvent::TechnicianAssigned {
                service_id: record.id,
                technician_id,
                assigned_by: actor.id,
            });
        }
        Ok(record)
    }

    /// Fetch one record, subject to the `view` capability.
    pub async fn get_service(&self, actor: &Actor, id: DbId) -> Result<ServiceRecord, CoreError> {
        let record = self.fetch(id).await?;
        let view = self.view_for(&record).await?;
        capability::require(actor, &view, Capability::View)?;
        Ok(record)
    }

    /// List the records visible to the actor. The filter embodies the
    /// matrix's view rules, so no per-record check is needed.
    pub async fn list_services(&self, actor: &Actor) -> Result<Vec<ServiceRecord>, CoreError> {
        let filter = match actor.role {
            Role::Admin => ServiceFilter::All,
            Role::Client => ServiceFilter::ForClient(actor.id),
            Role::Technician => ServiceFilter::ForTechnician(actor.id),
            Role::ConstructingCompany => ServiceFilter::ForConstructor(actor.id),
        };
        self.store.list_services(filter).await
    }

    /// Assign a technician to a pending request, promoting it to
    /// `scheduled` as a single atomic transition.
    pub async fn assign_technician(
        &self,
        actor: &Actor,
        id: DbId,
        technician_id: DbId,
    ) -> Result<ServiceRecord, CoreError> {
        let record = self.fetch(id).await?;
        let view = self.view_for(&record).await?;
        capability::require(actor, &view, Capability::MutateStatus)?;

        if record.technician_id.is_some() {
            return Err(CoreError::InvalidTransition(
                "a technician is already assigned to this service request".to_string(),
            ));
        }
        lifecycle::validate_transition(record.status, ServiceStatus::Scheduled)?;

        let patch = RecordPatch {
            status: Some(ServiceStatus::Scheduled),
            technician_id: Some(technician_id),
            ..Default::default()
        };
        let history = NewHistoryEntry {
            status: ServiceStatus::Scheduled,
            actor_id: actor.id,
            note: None,
        };
        let activity = NewActivityEntry {
            kind: event_kinds::TECHNICIAN_ASSIGNED,
            actor_id: actor.id,
            metadata: json!({
                "technician_id": technician_id,
                "prior_status": record.status.as_str(),
            }),
        };
        let updated = self
            .store
            .commit_transition(id, record.guard(), patch, Some(history), activity)
            .await?;

        self.effects.dispatch(LifecycleEvent::TechnicianAssigned {
            service_id: updated.id,
            technician_id,
            assigned_by: actor.id,
        });
        Ok(updated)
    }

    /// Change the primary status. Technician-only (via the matrix), and
    /// never used for cancellation — that is a separate capability.
    ///
    /// Setting the current status again is accepted as a no-op write but
    /// still appends one history entry.
    pub async fn update_status(
        &self,
        actor: &Actor,
        id: DbId,
        to: ServiceStatus,
        note: Option<String>,
    ) -> Result<ServiceRecord, CoreError> {
        if to == ServiceStatus::Cancelled {
            return Err(CoreError::Validation(
                "cancellation is a separate operation; use cancel".to_string(),
            ));
        }

        let record = self.fetch(id).await?;
        let view = self.view_for(&record).await?;
        capability::require(actor, &view, Capability::MutateStatus)?;

        if record.technician_id.is_none() {
            return Err(CoreError::InvalidTransition(
                "a technician must be assigned before the status can change".to_string(),
            ));
        }
        if to == record.status {
            if record.status.is_terminal() {
                return Err(CoreError::InvalidTransition(
                    "the status of a completed or cancelled service request is frozen"
                        .to_string(),
                ));
            }
        } else {
            lifecycle::validate_transition(record.status, to)?;
        }

        let newly_completed = to == ServiceStatus::Completed && record.status != to;
        let patch = RecordPatch {
            status: Some(to),
            set_completed_at: newly_completed,
            ..Default::default()
        };
        let history = NewHistoryEntry {
            status: to,
            actor_id: actor.id,
            note,
        };
        let activity = NewActivityEntry {
            kind: event_kinds::STATUS_CHANGED,
            actor_id: actor.id,
            metadata: json!({
                "from": record.status.as_str(),
                "to": to.as_str(),
            }),
        };
        let updated = self
            .store
            .commit_transition(id, record.guard(), patch, Some(history), activity)
            .await?;

        self.effects.dispatch(LifecycleEvent::StatusChanged {
            service_id: updated.id,
            client_id: updated.client_id,
            technician_id: updated.technician_id,
            to,
            actor_id: actor.id,
        });
        Ok(updated)
    }

    /// Cancel a non-terminal request. Available to the requesting client,
    /// the owning company, and the assigned technician.
    pub async fn cancel(
        &self,
        actor: &Actor,
        id: DbId,
        note: Option<String>,
    ) -> Result<ServiceRecord, CoreError> {
        let record = self.fetch(id).await?;
        let view = self.view_for(&record).await?;
        capability::require(actor, &view, Capability::Cancel)?;

        lifecycle::validate_transition(record.status, ServiceStatus::Cancelled)?;

        let patch = RecordPatch {
            status: Some(ServiceStatus::Cancelled),
            ..Default::default()
        };
        let history = NewHistoryEntry {
            status: ServiceStatus::Cancelled,
            actor_id: actor.id,
            note,
        };
        let activity = NewActivityEntry {
            kind: event_kinds::STATUS_CHANGED,
            actor_id: actor.id,
            metadata: json!({
                "from": record.status.as_str(),
                "to": ServiceStatus::Cancelled.as_str(),
            }),
        };
        let updated = self
            .store
            .commit_transition(id, record.guard(), patch, Some(history), activity)
            .await?;

        self.effects.dispatch(LifecycleEvent::StatusChanged {
            service_id: updated.id,
            client_id: updated.client_id,
            technician_id: updated.technician_id,
            to: ServiceStatus::Cancelled,
            actor_id: actor.id,
        });
        Ok(updated)
    }

    /// File a deletion request.
    ///
    /// If work has not begun the record is hard-deleted immediately;
    /// otherwise it is parked in `pending_approval` for the assigned
    /// technician to resolve. At most one request may be outstanding.
    pub async fn request_deletion(
        &self,
        actor: &Actor,
        id: DbId,
    ) -> Result<DeletionOutcome, CoreError> {
        let record = self.fetch(id).await?;
        let view = self.view_for(&record).await?;
        capability::require(actor, &view, Capability::RequestDeletion)?;

        deletion::validate_request(record.deletion_status)?;

        match deletion::disposition_for(record.status) {
            DeletionDisposition::Immediate => {
                let activity = NewActivityEntry {
                    kind: event_kinds::SERVICE_DELETED,
                    actor_id: actor.id,
                    metadata: transition_metadata(
                        actor.role,
                        record.status.as_str(),
                        record.technician_id,
                    ),
                };
                self.store
                    .delete_service(id, record.guard(), vec![activity])
                    .await?;
                Ok(DeletionOutcome::Deleted)
            }
            DeletionDisposition::RequiresApproval => {
                let patch = RecordPatch {
                    deletion_status: Some(DeletionStatus::PendingApproval),
                    deletion_requested_by: Some(actor.id),
                    ..Default::default()
                };
                let activity = NewActivityEntry {
                    kind: event_kinds::DELETION_REQUESTED,
                    actor_id: actor.id,
                    metadata: transition_metadata(
                        actor.role,
                        record.status.as_str(),
                        record.technician_id,
                    ),
                };
                let updated = self
                    .store
                    .commit_transition(id, record.guard(), patch, None, activity)
                    .await?;

                self.effects.dispatch(LifecycleEvent::DeletionRequested {
                    service_id: updated.id,
                    technician_id: updated.technician_id,
                    requested_by: actor.id,
                });
                Ok(DeletionOutcome::PendingApproval(updated))
            }
        }
    }

    /// Resolve a pending deletion request.
    ///
    /// Approval hard-deletes the record; rejection clears the deletion
    /// metadata and leaves the record fully active. Only the assigned
    /// technician or an admin may resolve.
    pub async fn resolve_deletion(
        &self,
        actor: &Actor,
        id: DbId,
        approved: bool,
    ) -> Result<DeletionOutcome, CoreError> {
        let record = self.fetch(id).await?;
        // State first: an assigned technician calling this outside
        // `pending_approval` gets `InvalidState`, not `Forbidden`.
        deletion::validate_resolution(record.deletion_status)?;

        let view = self.view_for(&record).await?;
        capability::require(actor, &view, Capability::ApproveDeletion)?;

        let requested_by = record.deletion_requested_by.unwrap_or(record.client_id);

        if approved {
            let approval = NewActivityEntry {
                kind: event_kinds::DELETION_APPROVED,
                actor_id: actor.id,
                metadata: json!({
                    "requested_by": requested_by,
                    "prior_status": record.status.as_str(),
                }),
            };
            let removal = NewActivityEntry {
                kind: event_kinds::SERVICE_DELETED,
                actor_id: actor.id,
                metadata: transition_metadata(
                    actor.role,
                    record.status.as_str(),
                    record.technician_id,
                ),
            };
            self.store
                .delete_service(id, record.guard(), vec![approval, removal])
                .await?;

            self.effects.dispatch(LifecycleEvent::DeletionApproved {
                service_id: id,
                requested_by,
                resolved_by: actor.id,
            });
            Ok(DeletionOutcome::Deleted)
        } else {
            let patch = RecordPatch {
                deletion_status: Some(DeletionStatus::None),
                clear_deletion_request: true,
                ..Default::default()
            };
            let activity = NewActivityEntry {
                kind: event_kinds::DELETION_REJECTED,
                actor_id: actor.id,
                metadata: json!({
                    "requested_by": requested_by,
                    "prior_status": record.status.as_str(),
                }),
            };
            let updated = self
                .store
                .commit_transition(id, record.guard(), patch, None, activity)
                .await?;

            self.effects.dispatch(LifecycleEvent::DeletionRejected {
                service_id: id,
                requested_by,
                resolved_by: actor.id,
            });
            Ok(DeletionOutcome::Rejected(updated))
        }
    }

    /// Status history for one service, oldest first.
    pub async fn status_history(
        &self,
        actor: &Actor,
        id: DbId,
    ) -> Result<Vec<StatusHistoryEntry>, CoreError> {
        let record = self.fetch(id).await?;
        let view = self.view_for(&record).await?;
        capability::require(actor, &view, Capability::View)?;
        self.store.status_history(id).await
    }

    /// Activity log for one service, oldest first.
    pub async fn activity_log(
        &self,
        actor: &Actor,
        id: DbId,
    ) -> Result<Vec<ActivityLogEntry>, CoreError> {
        let record = self.fetch(id).await?;
        let view = self.view_for(&record).await?;
        capability::require(actor, &view, Capability::View)?;
        self.store.activity_log(id).await
    }

    /// Record a client review for a completed service. One review per
    /// service; reviewing unblocks the client's next creation.
    pub async fn create_review(
        &self,
        actor: &Actor,
        id: DbId,
        rating: i16,
        comment: Option<String>,
    ) -> Result<(), CoreError> {
        if actor.role != Role::Client {
            return Err(CoreError::Forbidden(
                "only clients may review service requests".to_string(),
            ));
        }
        let record = self.fetch(id).await?;
        if record.client_id != actor.id {
            return Err(CoreError::Forbidden(
                "only the requesting client may review this service request".to_string(),
            ));
        }
        if record.status != ServiceStatus::Completed {
            return Err(CoreError::InvalidState(
                "only completed service requests can be reviewed".to_string(),
            ));
        }
        if !(1..=5).contains(&rating) {
            return Err(CoreError::Validation(
                "rating must be between 1 and 5".to_string(),
            ));
        }
        self.store
            .insert_review(id, actor.id, record.technician_id, rating, comment)
            .await?;

        self.effects.dispatch(LifecycleEvent::ReviewSubmitted {
            service_id: id,
            client_id: actor.id,
            technician_id: record.technician_id,
        });
        Ok(())
    }

    async fn fetch(&self, id: DbId) -> Result<ServiceRecord, CoreError> {
        self.store
            .fetch_service(id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "ServiceRequest",
                id,
            })
    }

    async fn view_for(&self, record: &ServiceRecord) -> Result<ServiceView, CoreError> {
        let constructing_company_id = match record.unit_id {
            Some(unit_id) => self.store.resolve_constructing_company(unit_id).await?,
            None => None,
        };
        Ok(record.view(constructing_company_id))
    }
}
