//! Side-effect dispatch seam.
//!
//! After a transition commits, the engine hands a [`LifecycleEvent`] to an
//! [`EffectSink`]. Dispatch is fire-and-forget: the sink must not block,
//! and nothing a downstream collaborator does (or fails to do) can roll
//! back the transition that produced the event. The production sink
//! publishes onto the platform event bus; tests use a recording sink.

use crate::lifecycle::ServiceStatus;
use crate::types::DbId;

/// A committed lifecycle or deletion-workflow event.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// A service request was created. Carries the address for the one-shot
    /// geocoding trigger.
    Created {
        service_id: DbId,
        client_id: DbId,
        address: String,
    },
    /// A technician was assigned (at creation or afterwards).
    TechnicianAssigned {
        service_id: DbId,
        technician_id: DbId,
        assigned_by: DbId,
    },
    /// The primary status changed (including cancellation).
    StatusChanged {
        service_id: DbId,
        client_id: DbId,
        technician_id: Option<DbId>,
        to: ServiceStatus,
        actor_id: DbId,
    },
    /// A deletion request was filed against an in-flight record.
    DeletionRequested {
        service_id: DbId,
        technician_id: Option<DbId>,
        requested_by: DbId,
    },
    /// The assigned technician (or an admin) approved the deletion.
    DeletionApproved {
        service_id: DbId,
        requested_by: DbId,
        resolved_by: DbId,
    },
    /// The deletion request was denied; the record stays active.
    DeletionRejected {
        service_id: DbId,
        requested_by: DbId,
        resolved_by: DbId,
    },
    /// A client reviewed a completed service.
    ReviewSubmitted {
        service_id: DbId,
        client_id: DbId,
        technician_id: Option<DbId>,
    },
}

/// Receiver for committed lifecycle events.
pub trait EffectSink: Send + Sync {
    /// Hand off an event. Must not block and must not fail the caller.
    fn dispatch(&self, event: LifecycleEvent);
}

/// Sink that drops every event; used where side effects are not wired up.
pub struct NullSink;

impl EffectSink for NullSink {
    fn dispatch(&self, _event: LifecycleEvent) {}
}
