//! Badge award rules.
//!
//! A small rule engine keyed on per-actor counters. Each badge kind has a
//! threshold on one counter; [`earned_badges`] returns every badge whose
//! threshold the counters meet, so evaluation is strictly monotonic — a
//! badge once earned is always earned again on re-evaluation, and the
//! award layer deduplicates per `(user, badge)` to make the whole path
//! idempotent.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::roles::Role;

/// Badge kinds awarded by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeKind {
    /// Client filed their first service request.
    FirstRequest,
    /// Client filed ten service requests.
    TenRequests,
    /// Client wrote their first review.
    FirstReview,
    /// Technician completed their first service request.
    FirstCompletion,
    /// Technician completed ten service requests.
    TenCompletions,
    /// Technician completed fifty service requests.
    FiftyCompletions,
    /// Technician received ten reviews.
    TenReviewsReceived,
}

impl BadgeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BadgeKind::FirstRequest => "first_request",
            BadgeKind::TenRequests => "ten_requests",
            BadgeKind::FirstReview => "first_review",
            BadgeKind::FirstCompletion => "first_completion",
            BadgeKind::TenCompletions => "ten_completions",
            BadgeKind::FiftyCompletions => "fifty_completions",
            BadgeKind::TenReviewsReceived => "ten_reviews_received",
        }
    }
}

impl fmt::Display for BadgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BadgeKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first_request" => Ok(BadgeKind::FirstRequest),
            "ten_requests" => Ok(BadgeKind::TenRequests),
            "first_review" => Ok(BadgeKind::FirstReview),
            "first_completion" => Ok(BadgeKind::FirstCompletion),
            "ten_completions" => Ok(BadgeKind::TenCompletions),
            "fifty_completions" => Ok(BadgeKind::FiftyCompletions),
            "ten_reviews_received" => Ok(BadgeKind::TenReviewsReceived),
            other => Err(CoreError::Validation(format!("Unknown badge '{other}'"))),
        }
    }
}

/// Per-actor counters the rules are keyed on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BadgeCounts {
    /// Service requests filed (clients).
    pub services_created: u64,
    /// Service requests completed (technicians).
    pub services_completed: u64,
    /// Reviews written (clients).
    pub reviews_written: u64,
    /// Reviews received on completed work (technicians).
    pub reviews_received: u64,
}

/// Client-role rules: `(counter threshold, badge)` over services created /
/// reviews written.
const CLIENT_REQUEST_RULES: &[(u64, BadgeKind)] = &[
    (1, BadgeKind::FirstRequest),
    (10, BadgeKind::TenRequests),
];

const CLIENT_REVIEW_RULES: &[(u64, BadgeKind)] = &[(1, BadgeKind::FirstReview)];

/// Technician-role rules over completions / reviews received.
const TECHNICIAN_COMPLETION_RULES: &[(u64, BadgeKind)] = &[
    (1, BadgeKind::FirstCompletion),
    (10, BadgeKind::TenCompletions),
    (50, BadgeKind::FiftyCompletions),
];

const TECHNICIAN_REVIEW_RULES: &[(u64, BadgeKind)] = &[(10, BadgeKind::TenReviewsReceived)];

/// Every badge the counters qualify for under the given role.
///
/// Admins and constructing companies earn no badges.
pub fn earned_badges(role: Role, counts: &BadgeCounts) -> Vec<BadgeKind> {
    let mut earned = Vec::new();
    match role {
        Role::Client => {
            collect(CLIENT_REQUEST_RULES, counts.services_created, &mut earned);
            collect(CLIENT_REVIEW_RULES, counts.reviews_written, &mut earned);
        }
        Role::Technician => {
            collect(
                TECHNICIAN_COMPLETION_RULES,
                counts.services_completed,
                &mut earned,
            );
            collect(TECHNICIAN_REVIEW_RULES, counts.reviews_received, &mut earned);
        }
        Role::Admin | Role::ConstructingCompany => {}
    }
    earned
}

fn collect(rules: &[(u64, BadgeKind)], count: u64, into: &mut Vec<BadgeKind>) {
    for (threshold, badge) in rules {
        if count >= *threshold {
            into.push(*badge);
        }
    }
}
