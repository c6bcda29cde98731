//! Two-phase deletion workflow layered on top of the primary lifecycle.
//!
//! A delete request either removes the record immediately (work has not
//! begun) or parks it in `pending_approval` until the assigned technician
//! signs off. The primary status is never touched by this workflow.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::lifecycle::ServiceStatus;

/// Deletion workflow state, orthogonal to [`ServiceStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionStatus {
    /// No deletion request outstanding.
    None,
    /// Waiting for the assigned technician (or an admin) to resolve.
    PendingApproval,
    /// Approval granted; coincides with the hard delete of the record.
    Approved,
    /// Request denied; the record was reset to `None` and remains active.
    Rejected,
}

impl DeletionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeletionStatus::None => "none",
            DeletionStatus::PendingApproval => "pending_approval",
            DeletionStatus::Approved => "approved",
            DeletionStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for DeletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeletionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(DeletionStatus::None),
            "pending_approval" => Ok(DeletionStatus::PendingApproval),
            "approved" => Ok(DeletionStatus::Approved),
            "rejected" => Ok(DeletionStatus::Rejected),
            other => Err(CoreError::Validation(format!(
                "Invalid deletion status '{other}'"
            ))),
        }
    }
}

/// What a delete request does, given the record's primary status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionDisposition {
    /// Work has not begun: hard delete right away, no approval phase.
    Immediate,
    /// Work is scheduled or underway: park in `pending_approval`.
    RequiresApproval,
}

/// Decide the disposition of a delete request from the primary status.
pub fn disposition_for(status: ServiceStatus) -> DeletionDisposition {
    match status {
        ServiceStatus::Scheduled | ServiceStatus::InProgress => {
            DeletionDisposition::RequiresApproval
        }
        ServiceStatus::Pending | ServiceStatus::Completed | ServiceStatus::Cancelled => {
            DeletionDisposition::Immediate
        }
    }
}

/// Validate that a new deletion request may be filed.
///
/// At most one request may be outstanding per record; a second request
/// while one is pending is rejected, not queued.
pub fn validate_request(current: DeletionStatus) -> Result<(), CoreError> {
    match current {
        DeletionStatus::None => Ok(()),
        DeletionStatus::PendingApproval => Err(CoreError::Conflict(
            "a deletion request is already awaiting approval".to_string(),
        )),
        DeletionStatus::Approved | DeletionStatus::Rejected => Err(CoreError::InvalidState(
            format!("cannot request deletion while deletion status is '{current}'"),
        )),
    }
}

/// Validate that a deletion request may be resolved right now.
pub fn validate_resolution(current: DeletionStatus) -> Result<(), CoreError> {
    if current == DeletionStatus::PendingApproval {
        Ok(())
    } else {
        Err(CoreError::InvalidState(
            "no deletion request is awaiting approval".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::error::CoreError;

    #[test]
    fn work_not_started_deletes_immediately() {
        assert_eq!(
            disposition_for(ServiceStatus::Pending),
            DeletionDisposition::Immediate
        );
        assert_eq!(
            disposition_for(ServiceStatus::Completed),
            DeletionDisposition::Immediate
        );
        assert_eq!(
            disposition_for(ServiceStatus::Cancelled),
            DeletionDisposition::Immediate
        );
    }

    #[test]
    fn work_underway_requires_approval() {
        assert_eq!(
            disposition_for(ServiceStatus::Scheduled),
            DeletionDisposition::RequiresApproval
        );
        assert_eq!(
            disposition_for(ServiceStatus::InProgress),
            DeletionDisposition::RequiresApproval
        );
    }

    #[test]
    fn second_request_while_pending_is_a_conflict() {
        assert!(validate_request(DeletionStatus::None).is_ok());
        assert_matches!(
            validate_request(DeletionStatus::PendingApproval),
            Err(CoreError::Conflict(_))
        );
    }

    #[test]
    fn resolution_requires_a_pending_request() {
        assert!(validate_resolution(DeletionStatus::PendingApproval).is_ok());
        assert_matches!(
            validate_resolution(DeletionStatus::None),
            Err(CoreError::InvalidState(_))
        );
        assert_matches!(
            validate_resolution(DeletionStatus::Rejected),
            Err(CoreError::InvalidState(_))
        );
    }

    #[test]
    fn deletion_status_round_trips_through_its_name() {
        for status in [
            DeletionStatus::None,
            DeletionStatus::PendingApproval,
            DeletionStatus::Approved,
            DeletionStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<DeletionStatus>().unwrap(), status);
        }
    }
}
