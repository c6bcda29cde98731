//! Primary service-request lifecycle: status values and transition rules.
//!
//! The status graph is
//!
//! ```text
//! pending -> scheduled -> in_progress -> completed
//!     \          \             \
//!      +----------+-------------+--> cancelled
//! ```
//!
//! `completed` and `cancelled` are terminal; no edge leaves them. Only the
//! lifecycle engine writes the status field, and every accepted change is
//! recorded in the status history.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Primary lifecycle status of a service request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    /// Filed, no technician assigned yet.
    Pending,
    /// Technician assigned, work not started.
    Scheduled,
    /// Technician has started work.
    InProgress,
    /// Work finished; status is frozen from here on.
    Completed,
    /// Abandoned before completion; terminal.
    Cancelled,
}

impl ServiceStatus {
    /// Every status value, for iteration in tests and validation messages.
    pub const ALL: &'static [ServiceStatus] = &[
        ServiceStatus::Pending,
        ServiceStatus::Scheduled,
        ServiceStatus::InProgress,
        ServiceStatus::Completed,
        ServiceStatus::Cancelled,
    ];

    /// Canonical lowercase name, as stored in the `status` column.
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceStatus::Pending => "pending",
            ServiceStatus::Scheduled => "scheduled",
            ServiceStatus::InProgress => "in_progress",
            ServiceStatus::Completed => "completed",
            ServiceStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the primary lifecycle ends here.
    pub fn is_terminal(self) -> bool {
        matches!(self, ServiceStatus::Completed | ServiceStatus::Cancelled)
    }

    /// The set of statuses this one may transition to.
    pub fn allowed_transitions(self) -> &'static [ServiceStatus] {
        match self {
            ServiceStatus::Pending => &[ServiceStatus::Scheduled, ServiceStatus::Cancelled],
            ServiceStatus::Scheduled => &[
                ServiceStatus::InProgress,
                ServiceStatus::Completed,
                ServiceStatus::Cancelled,
            ],
            ServiceStatus::InProgress => {
                &[ServiceStatus::Completed, ServiceStatus::Cancelled]
            }
            ServiceStatus::Completed | ServiceStatus::Cancelled => &[],
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ServiceStatus::Pending),
            "scheduled" => Ok(ServiceStatus::Scheduled),
            "in_progress" => Ok(ServiceStatus::InProgress),
            "completed" => Ok(ServiceStatus::Completed),
            "cancelled" => Ok(ServiceStatus::Cancelled),
            other => Err(CoreError::Validation(format!(
                "Invalid service status '{other}'"
            ))),
        }
    }
}

/// Validate that a status change from `current` to `next` is allowed.
///
/// Same-value writes are not transitions and are handled by the engine
/// before this check is reached.
pub fn validate_transition(current: ServiceStatus, next: ServiceStatus) -> Result<(), CoreError> {
    if current.allowed_transitions().contains(&next) {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition(format!(
            "cannot move a service request from '{current}' to '{next}'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_its_name() {
        for status in ServiceStatus::ALL {
            assert_eq!(status.as_str().parse::<ServiceStatus>().unwrap(), *status);
        }
    }

    #[test]
    fn pending_can_only_be_scheduled_or_cancelled() {
        assert!(validate_transition(ServiceStatus::Pending, ServiceStatus::Scheduled).is_ok());
        assert!(validate_transition(ServiceStatus::Pending, ServiceStatus::Cancelled).is_ok());
        assert!(validate_transition(ServiceStatus::Pending, ServiceStatus::InProgress).is_err());
        assert!(validate_transition(ServiceStatus::Pending, ServiceStatus::Completed).is_err());
    }

    #[test]
    fn scheduled_can_start_finish_or_cancel() {
        assert!(validate_transition(ServiceStatus::Scheduled, ServiceStatus::InProgress).is_ok());
        assert!(validate_transition(ServiceStatus::Scheduled, ServiceStatus::Completed).is_ok());
        assert!(validate_transition(ServiceStatus::Scheduled, ServiceStatus::Cancelled).is_ok());
        assert!(validate_transition(ServiceStatus::Scheduled, ServiceStatus::Pending).is_err());
    }

    #[test]
    fn in_progress_can_finish_or_cancel() {
        assert!(validate_transition(ServiceStatus::InProgress, ServiceStatus::Completed).is_ok());
        assert!(validate_transition(ServiceStatus::InProgress, ServiceStatus::Cancelled).is_ok());
        assert!(validate_transition(ServiceStatus::InProgress, ServiceStatus::Scheduled).is_err());
    }

    #[test]
    fn terminal_statuses_have_no_outgoing_edges() {
        for terminal in [ServiceStatus::Completed, ServiceStatus::Cancelled] {
            assert!(terminal.is_terminal());
            assert!(terminal.allowed_transitions().is_empty());
            for next in ServiceStatus::ALL {
                assert!(validate_transition(terminal, *next).is_err());
            }
        }
    }

    #[test]
    fn non_terminal_statuses_can_reach_cancelled() {
        for status in [
            ServiceStatus::Pending,
            ServiceStatus::Scheduled,
            ServiceStatus::InProgress,
        ] {
            assert!(validate_transition(status, ServiceStatus::Cancelled).is_ok());
        }
    }
}
