//! Per-role authorization matrix.
//!
//! [`capabilities`] is a pure function from an actor and a snapshot of a
//! service request to the set of actions the actor may perform on it. It is
//! consulted before every read or mutation; a failed check yields
//! [`CoreError::Forbidden`] with a message that names the blocked rule and
//! leaks nothing else about the record.

use crate::deletion::DeletionStatus;
use crate::error::CoreError;
use crate::lifecycle::ServiceStatus;
use crate::roles::{Actor, Role};
use crate::types::DbId;

/// One action class an actor may hold on a specific record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    View,
    MutateStatus,
    Cancel,
    RequestDeletion,
    ApproveDeletion,
}

/// The set of capabilities an actor holds on one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    pub view: bool,
    pub mutate_status: bool,
    pub cancel: bool,
    pub request_deletion: bool,
    pub approve_deletion: bool,
}

impl CapabilitySet {
    /// The empty set: no access at all.
    pub const NONE: CapabilitySet = CapabilitySet {
        view: false,
        mutate_status: false,
        cancel: false,
        request_deletion: false,
        approve_deletion: false,
    };

    /// The full set, held unconditionally by admins.
    pub const ALL: CapabilitySet = CapabilitySet {
        view: true,
        mutate_status: true,
        cancel: true,
        request_deletion: true,
        approve_deletion: true,
    };

    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::View => self.view,
            Capability::MutateStatus => self.mutate_status,
            Capability::Cancel => self.cancel,
            Capability::RequestDeletion => self.request_deletion,
            Capability::ApproveDeletion => self.approve_deletion,
        }
    }

    /// Whether every capability in `other` is also present here.
    pub fn is_superset_of(&self, other: &CapabilitySet) -> bool {
        (self.view || !other.view)
            && (self.mutate_status || !other.mutate_status)
            && (self.cancel || !other.cancel)
            && (self.request_deletion || !other.request_deletion)
            && (self.approve_deletion || !other.approve_deletion)
    }
}

/// The snapshot of a service request the matrix needs.
///
/// `constructing_company_id` is resolved upfront through the record's
/// `unit -> development -> constructor` chain; a record without a unit has
/// no owning company and grants the company role nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceView {
    pub client_id: DbId,
    pub technician_id: Option<DbId>,
    pub status: ServiceStatus,
    pub deletion_status: DeletionStatus,
    pub constructing_company_id: Option<DbId>,
}

/// Compute the capability set `actor` holds on `service`.
///
/// Cancellation is deliberately a capability of its own: clients and
/// constructing companies may cancel records they could never otherwise
/// mutate.
pub fn capabilities(actor: &Actor, service: &ServiceView) -> CapabilitySet {
    match actor.role {
        Role::Admin => CapabilitySet::ALL,

        Role::Client => {
            if service.client_id == actor.id {
                CapabilitySet {
                    view: true,
                    cancel: true,
                    request_deletion: true,
                    ..CapabilitySet::NONE
                }
            } else {
                CapabilitySet::NONE
            }
        }

        Role::Technician => {
            if service.technician_id == Some(actor.id) {
                CapabilitySet {
                    view: true,
                    mutate_status: true,
                    cancel: true,
                    approve_deletion: service.deletion_status == DeletionStatus::PendingApproval,
                    ..CapabilitySet::NONE
                }
            } else if service.technician_id.is_none()
                && service.status == ServiceStatus::Pending
            {
                // Open pool: unassigned pending requests are visible to any
                // technician, read-only.
                CapabilitySet {
                    view: true,
                    ..CapabilitySet::NONE
                }
            } else {
                CapabilitySet::NONE
            }
        }

        Role::ConstructingCompany => {
            if service.constructing_company_id == Some(actor.id) {
                CapabilitySet {
                    view: true,
                    cancel: true,
                    request_deletion: true,
                    ..CapabilitySet::NONE
                }
            } else {
                CapabilitySet::NONE
            }
        }
    }
}

/// Check a single capability, producing a `Forbidden` error on denial.
pub fn require(
    actor: &Actor,
    service: &ServiceView,
    capability: Capability,
) -> Result<(), CoreError> {
    if capabilities(actor, service).allows(capability) {
        Ok(())
    } else {
        Err(CoreError::Forbidden(
            denial_message(capability).to_string(),
        ))
    }
}

/// The user-facing reason an action was denied.
///
/// Messages name the rule that blocked the action and nothing about the
/// record itself.
fn denial_message(capability: Capability) -> &'static str {
    match capability {
        Capability::View => "you do not have access to this service request",
        Capability::MutateStatus => {
            "only the assigned technician may change the status of a service request"
        }
        Capability::Cancel => {
            "only the requesting client, the owning constructing company, \
             or the assigned technician may cancel a service request"
        }
        Capability::RequestDeletion => {
            "only the requesting client or the owning constructing company \
             may request deletion of a service request"
        }
        Capability::ApproveDeletion => {
            "only the assigned technician may resolve a deletion request"
        }
    }
}
