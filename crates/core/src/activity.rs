//! Activity trail event kinds and the tamper-evident hash chain.
//!
//! Every committed lifecycle or deletion-workflow event appends one entry
//! to the activity log. Entries are never updated or deleted, and each one
//! carries a SHA-256 integrity hash chained to its predecessor within the
//! same service, so any after-the-fact edit breaks the chain.

use serde_json::json;

use crate::hashing;
use crate::roles::Role;
use crate::types::DbId;

/// Known activity event kinds.
pub mod event_kinds {
    pub const SERVICE_CREATED: &str = "service_created";
    pub const TECHNICIAN_ASSIGNED: &str = "technician_assigned";
    pub const STATUS_CHANGED: &str = "status_changed";
    pub const DELETION_REQUESTED: &str = "deletion_requested";
    pub const DELETION_APPROVED: &str = "deletion_approved";
    pub const DELETION_REJECTED: &str = "deletion_rejected";
    pub const SERVICE_DELETED: &str = "service_deleted";
}

/// Known seed value for the first entry in a service's hash chain.
const CHAIN_SEED: &str = "ACTIVITY_CHAIN_SEED_V1";

/// Compute the integrity hash for an activity entry.
///
/// `prev_hash` is the hash of the previous entry for the same service, or
/// `None` for the first entry (which chains off a fixed seed).
/// `entry_data` is the canonical string form of the entry content, see
/// [`canonical_entry_data`].
pub fn compute_integrity_hash(prev_hash: Option<&str>, entry_data: &str) -> String {
    let prev = prev_hash.unwrap_or(CHAIN_SEED);
    let combined = format!("{prev}|{entry_data}");
    hashing::sha256_hex(combined.as_bytes())
}

/// Canonical string representation of an activity entry's content.
///
/// `serde_json` serializes object keys in sorted order, so the output is
/// stable for identical inputs.
pub fn canonical_entry_data(
    service_id: DbId,
    kind: &str,
    actor_id: DbId,
    metadata: &serde_json::Value,
) -> String {
    json!({
        "service_id": service_id,
        "kind": kind,
        "actor_id": actor_id,
        "metadata": metadata,
    })
    .to_string()
}

/// Structured metadata payload for transition-shaped events.
pub fn transition_metadata(
    requester_role: Role,
    prior_status: &str,
    technician_id: Option<DbId>,
) -> serde_json::Value {
    json!({
        "requester_role": requester_role.as_str(),
        "prior_status": prior_status,
        "technician_id": technician_id,
    })
}

/// Walk a chain of `(integrity_hash, entry_data)` pairs, in append order,
/// and report whether every hash matches its recomputed value.
pub fn verify_chain<'a, I>(entries: I) -> bool
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut prev: Option<String> = None;
    for (hash, data) in entries {
        let expected = compute_integrity_hash(prev.as_deref(), data);
        if hash != expected {
            return false;
        }
        prev = Some(hash.to_string());
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_entry_chains_off_the_seed() {
        let hash = compute_integrity_hash(None, "entry");
        assert_eq!(hash.len(), 64);
        assert_ne!(hash, compute_integrity_hash(Some("other"), "entry"));
    }

    #[test]
    fn same_input_produces_same_hash() {
        assert_eq!(
            compute_integrity_hash(None, "data"),
            compute_integrity_hash(None, "data")
        );
    }

    #[test]
    fn canonical_data_is_stable_and_ordered() {
        let metadata = serde_json::json!({"b": 2, "a": 1});
        let a = canonical_entry_data(7, event_kinds::STATUS_CHANGED, 3, &metadata);
        let b = canonical_entry_data(7, event_kinds::STATUS_CHANGED, 3, &metadata);
        assert_eq!(a, b);
        assert!(a.contains("status_changed"));
    }

    #[test]
    fn intact_chain_verifies() {
        let d1 = canonical_entry_data(1, event_kinds::SERVICE_CREATED, 5, &serde_json::json!({}));
        let d2 = canonical_entry_data(1, event_kinds::STATUS_CHANGED, 6, &serde_json::json!({}));
        let h1 = compute_integrity_hash(None, &d1);
        let h2 = compute_integrity_hash(Some(&h1), &d2);
        assert!(verify_chain([(h1.as_str(), d1.as_str()), (h2.as_str(), d2.as_str())]));
    }

    #[test]
    fn edited_entry_breaks_the_chain() {
        let d1 = canonical_entry_data(1, event_kinds::SERVICE_CREATED, 5, &serde_json::json!({}));
        let d2 = canonical_entry_data(1, event_kinds::STATUS_CHANGED, 6, &serde_json::json!({}));
        let h1 = compute_integrity_hash(None, &d1);
        let h2 = compute_integrity_hash(Some(&h1), &d2);
        // Tamper with the first entry's payload after the fact.
        let tampered = canonical_entry_data(1, event_kinds::SERVICE_DELETED, 5, &serde_json::json!({}));
        assert!(!verify_chain([
            (h1.as_str(), tampered.as_str()),
            (h2.as_str(), d2.as_str())
        ]));
    }
}
