//! End-to-end tests for the lifecycle engine over the in-memory store.
//!
//! Covers the full request lifecycle, the two-phase deletion workflow, the
//! authorization matrix at the operation boundary, audit completeness, and
//! the compare-and-swap concurrency guard.

use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;

use aftercare_core::activity::{event_kinds, verify_chain};
use aftercare_core::store::{NewServiceRecord, RecordPatch, ServiceStore, StateGuard};
use aftercare_core::{
    Actor, CoreError, DeletionOutcome, DeletionStatus, EffectSink, LifecycleEngine,
    LifecycleEvent, MemoryStore, Role, ServiceStatus,
};

const CLIENT: i64 = 1;
const TECH: i64 = 2;
const COMPANY: i64 = 3;
const ADMIN: i64 = 4;
const OTHER_CLIENT: i64 = 5;
const UNIT: i64 = 77;

fn client() -> Actor {
    Actor::new(CLIENT, Role::Client)
}
fn technician() -> Actor {
    Actor::new(TECH, Role::Technician)
}
fn company() -> Actor {
    Actor::new(COMPANY, Role::ConstructingCompany)
}
fn admin() -> Actor {
    Actor::new(ADMIN, Role::Admin)
}

/// Effect sink that records every dispatched event for assertions.
#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl EffectSink for RecordingSink {
    fn dispatch(&self, event: LifecycleEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl RecordingSink {
    fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().unwrap().clone()
    }
}

fn engine() -> (LifecycleEngine, Arc<MemoryStore>, Arc<RecordingSink>) {
    let store = Arc::new(MemoryStore::new());
    store.add_unit(UNIT, COMPANY);
    let sink = Arc::new(RecordingSink::default());
    let engine = LifecycleEngine::new(store.clone(), sink.clone());
    (engine, store, sink)
}

fn request() -> NewServiceRecord {
    NewServiceRecord {
        client_id: CLIENT,
        technician_id: None,
        unit_id: Some(UNIT),
        subject: "Leaking kitchen tap".to_string(),
        description: "Water pooling under the sink since Monday".to_string(),
        address: "12 Harbour Street".to_string(),
        city: "Rotterdam".to_string(),
        postal_code: "3011 AB".to_string(),
    }
}

async fn in_progress_service(engine: &LifecycleEngine) -> i64 {
    let record = engine.create_service(&client(), request()).await.unwrap();
    engine
        .assign_technician(&admin(), record.id, TECH)
        .await
        .unwrap();
    engine
        .update_status(&technician(), record.id, ServiceStatus::InProgress, None)
        .await
        .unwrap();
    record.id
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn client_creation_starts_pending_with_one_history_entry() {
    let (engine, _, _) = engine();

    let record = engine.create_service(&client(), request()).await.unwrap();

    assert_eq!(record.status, ServiceStatus::Pending);
    assert_eq!(record.deletion_status, DeletionStatus::None);
    assert!(record.technician_id.is_none());

    let history = engine.status_history(&client(), record.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, ServiceStatus::Pending);
    assert_eq!(history[0].actor_id, CLIENT);
}

#[tokio::test]
async fn creation_with_technician_starts_scheduled() {
    let (engine, _, sink) = engine();
    let mut input = request();
    input.technician_id = Some(TECH);

    let record = engine.create_service(&admin(), input).await.unwrap();

    assert_eq!(record.status, ServiceStatus::Scheduled);
    assert_eq!(record.technician_id, Some(TECH));
    assert!(sink
        .events()
        .iter()
        .any(|e| matches!(e, LifecycleEvent::TechnicianAssigned { technician_id, .. } if *technician_id == TECH)));
}

#[tokio::test]
async fn technicians_cannot_create_requests() {
    let (engine, _, _) = engine();
    let err = engine
        .create_service(&technician(), request())
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Forbidden(_));
}

#[tokio::test]
async fn clients_cannot_create_for_other_clients() {
    let (engine, _, _) = engine();
    let mut input = request();
    input.client_id = OTHER_CLIENT;
    let err = engine.create_service(&client(), input).await.unwrap_err();
    assert_matches!(err, CoreError::Forbidden(_));
}

#[tokio::test]
async fn creation_rejects_missing_address_fields() {
    let (engine, _, _) = engine();
    let mut input = request();
    input.address = "  ".to_string();
    let err = engine.create_service(&client(), input).await.unwrap_err();
    assert_matches!(err, CoreError::Validation(_));
}

#[tokio::test]
async fn creation_dispatches_created_event_with_address() {
    let (engine, _, sink) = engine();
    let record = engine.create_service(&client(), request()).await.unwrap();
    assert!(sink.events().iter().any(|e| matches!(
        e,
        LifecycleEvent::Created { service_id, address, .. }
            if *service_id == record.id && address == "12 Harbour Street"
    )));
}

// ---------------------------------------------------------------------------
// Assignment and status changes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn assigning_technician_promotes_to_scheduled_in_one_step() {
    let (engine, _, _) = engine();
    let record = engine.create_service(&client(), request()).await.unwrap();

    let updated = engine
        .assign_technician(&admin(), record.id, TECH)
        .await
        .unwrap();

    assert_eq!(updated.status, ServiceStatus::Scheduled);
    assert_eq!(updated.technician_id, Some(TECH));

    let history = engine.status_history(&admin(), record.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].status, ServiceStatus::Scheduled);
}

#[tokio::test]
async fn clients_cannot_assign_technicians() {
    let (engine, _, _) = engine();
    let record = engine.create_service(&client(), request()).await.unwrap();
    let err = engine
        .assign_technician(&client(), record.id, TECH)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Forbidden(_));
}

#[tokio::test]
async fn assigned_technician_walks_the_lifecycle() {
    let (engine, _, _) = engine();
    let id = in_progress_service(&engine).await;

    let updated = engine
        .update_status(&technician(), id, ServiceStatus::Completed, None)
        .await
        .unwrap();

    assert_eq!(updated.status, ServiceStatus::Completed);
    assert!(updated.completed_at.is_some());
}

#[tokio::test]
async fn clients_cannot_mutate_status() {
    let (engine, _, _) = engine();
    let id = in_progress_service(&engine).await;
    let err = engine
        .update_status(&client(), id, ServiceStatus::Completed, None)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Forbidden(_));
}

#[tokio::test]
async fn skipping_ahead_is_an_invalid_transition() {
    let (engine, _, _) = engine();
    let record = engine.create_service(&client(), request()).await.unwrap();
    engine
        .assign_technician(&admin(), record.id, TECH)
        .await
        .unwrap();

    // scheduled -> scheduled is a no-op; scheduled -> pending is illegal.
    let err = engine
        .update_status(&technician(), record.id, ServiceStatus::Pending, None)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::InvalidTransition(_));
}

#[tokio::test]
async fn same_status_write_is_a_recorded_no_op() {
    let (engine, _, _) = engine();
    let id = in_progress_service(&engine).await;

    let before = engine.status_history(&admin(), id).await.unwrap().len();
    let updated = engine
        .update_status(&technician(), id, ServiceStatus::InProgress, None)
        .await
        .unwrap();
    let after = engine.status_history(&admin(), id).await.unwrap().len();

    assert_eq!(updated.status, ServiceStatus::InProgress);
    // Idempotent for the caller, but the audit log is not deduplicated.
    assert_eq!(after, before + 1);
}

#[tokio::test]
async fn completed_status_is_frozen() {
    let (engine, _, _) = engine();
    let id = in_progress_service(&engine).await;
    engine
        .update_status(&technician(), id, ServiceStatus::Completed, None)
        .await
        .unwrap();

    let err = engine
        .update_status(&technician(), id, ServiceStatus::InProgress, None)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::InvalidTransition(_));

    // Even the no-op write is rejected on a terminal status.
    let err = engine
        .update_status(&technician(), id, ServiceStatus::Completed, None)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::InvalidTransition(_));
}

#[tokio::test]
async fn cancellation_does_not_require_mutate_status() {
    let (engine, _, _) = engine();
    let id = in_progress_service(&engine).await;

    // The client holds `cancel` but not `mutate_status`.
    let updated = engine.cancel(&client(), id, None).await.unwrap();
    assert_eq!(updated.status, ServiceStatus::Cancelled);

    // And cancelled is terminal.
    let err = engine.cancel(&client(), id, None).await.unwrap_err();
    assert_matches!(err, CoreError::InvalidTransition(_));
}

#[tokio::test]
async fn cancel_through_update_status_is_rejected() {
    let (engine, _, _) = engine();
    let id = in_progress_service(&engine).await;
    let err = engine
        .update_status(&technician(), id, ServiceStatus::Cancelled, None)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Validation(_));
}

#[tokio::test]
async fn foreign_client_cancel_is_forbidden_and_state_unchanged() {
    let (engine, _, _) = engine();
    let id = in_progress_service(&engine).await;

    let err = engine
        .cancel(&Actor::new(OTHER_CLIENT, Role::Client), id, None)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Forbidden(_));

    let record = engine.get_service(&admin(), id).await.unwrap();
    assert_eq!(record.status, ServiceStatus::InProgress);
}

// ---------------------------------------------------------------------------
// Deletion workflow
// ---------------------------------------------------------------------------

#[tokio::test]
async fn deleting_before_work_starts_is_immediate() {
    let (engine, _, _) = engine();
    let record = engine.create_service(&client(), request()).await.unwrap();

    let outcome = engine.request_deletion(&client(), record.id).await.unwrap();
    assert_matches!(outcome, DeletionOutcome::Deleted);

    let err = engine.get_service(&admin(), record.id).await.unwrap_err();
    assert_matches!(err, CoreError::NotFound { .. });
}

#[tokio::test]
async fn owning_company_can_delete_a_pending_service_immediately() {
    let (engine, _, _) = engine();
    let record = engine.create_service(&client(), request()).await.unwrap();

    let outcome = engine
        .request_deletion(&company(), record.id)
        .await
        .unwrap();
    assert_matches!(outcome, DeletionOutcome::Deleted);
}

#[tokio::test]
async fn company_without_the_unit_gets_nothing() {
    let (engine, _, _) = engine();
    let mut input = request();
    input.unit_id = None;
    let record = engine.create_service(&client(), input).await.unwrap();

    let err = engine
        .request_deletion(&company(), record.id)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Forbidden(_));
}

#[tokio::test]
async fn deleting_in_progress_work_requires_approval() {
    let (engine, _, sink) = engine();
    let id = in_progress_service(&engine).await;

    let outcome = engine.request_deletion(&client(), id).await.unwrap();
    let record = match outcome {
        DeletionOutcome::PendingApproval(record) => record,
        other => panic!("expected pending approval, got {other:?}"),
    };

    assert_eq!(record.deletion_status, DeletionStatus::PendingApproval);
    assert_eq!(record.deletion_requested_by, Some(CLIENT));
    assert!(record.deletion_requested_at.is_some());
    // The primary lifecycle is untouched.
    assert_eq!(record.status, ServiceStatus::InProgress);

    assert!(sink.events().iter().any(|e| matches!(
        e,
        LifecycleEvent::DeletionRequested { technician_id: Some(t), .. } if *t == TECH
    )));
}

#[tokio::test]
async fn second_deletion_request_while_pending_is_a_conflict() {
    let (engine, _, _) = engine();
    let id = in_progress_service(&engine).await;

    engine.request_deletion(&client(), id).await.unwrap();
    let err = engine.request_deletion(&client(), id).await.unwrap_err();
    assert_matches!(err, CoreError::Conflict(_));

    // Exactly one pending request exists.
    let record = engine.get_service(&admin(), id).await.unwrap();
    assert_eq!(record.deletion_status, DeletionStatus::PendingApproval);
}

#[tokio::test]
async fn technicians_cannot_request_deletion() {
    let (engine, _, _) = engine();
    let id = in_progress_service(&engine).await;
    let err = engine
        .request_deletion(&technician(), id)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Forbidden(_));
}

#[tokio::test]
async fn approving_deletion_hard_deletes_the_record() {
    let (engine, store, sink) = engine();
    let id = in_progress_service(&engine).await;
    engine.request_deletion(&client(), id).await.unwrap();

    let outcome = engine
        .resolve_deletion(&technician(), id, true)
        .await
        .unwrap();
    assert_matches!(outcome, DeletionOutcome::Deleted);

    let err = engine.get_service(&admin(), id).await.unwrap_err();
    assert_matches!(err, CoreError::NotFound { .. });

    // The activity log survives the record and stays chain-consistent.
    let log = store.activity_log(id).await.unwrap();
    let kinds: Vec<&str> = log.iter().map(|e| e.kind.as_str()).collect();
    assert!(kinds.contains(&event_kinds::DELETION_APPROVED));
    assert!(kinds.contains(&event_kinds::SERVICE_DELETED));

    assert!(sink.events().iter().any(|e| matches!(
        e,
        LifecycleEvent::DeletionApproved { requested_by, .. } if *requested_by == CLIENT
    )));
}

#[tokio::test]
async fn rejecting_deletion_restores_the_record_untouched() {
    let (engine, _, sink) = engine();
    let id = in_progress_service(&engine).await;
    let before = engine.get_service(&admin(), id).await.unwrap();
    engine.request_deletion(&client(), id).await.unwrap();

    let outcome = engine
        .resolve_deletion(&technician(), id, false)
        .await
        .unwrap();
    let record = match outcome {
        DeletionOutcome::Rejected(record) => record,
        other => panic!("expected rejection, got {other:?}"),
    };

    assert_eq!(record.deletion_status, DeletionStatus::None);
    assert!(record.deletion_requested_by.is_none());
    assert!(record.deletion_requested_at.is_none());
    assert_eq!(record.status, before.status);
    assert_eq!(record.technician_id, before.technician_id);

    // The record is fully active again: a new deletion request is allowed.
    assert_matches!(
        engine.request_deletion(&client(), id).await.unwrap(),
        DeletionOutcome::PendingApproval(_)
    );

    assert!(sink
        .events()
        .iter()
        .any(|e| matches!(e, LifecycleEvent::DeletionRejected { .. })));
}

#[tokio::test]
async fn only_the_assigned_technician_or_admin_resolves_deletions() {
    let (engine, _, _) = engine();
    let id = in_progress_service(&engine).await;
    engine.request_deletion(&client(), id).await.unwrap();

    let err = engine
        .resolve_deletion(&client(), id, true)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Forbidden(_));

    let err = engine
        .resolve_deletion(&Actor::new(99, Role::Technician), id, true)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Forbidden(_));

    // Admins may resolve in place of the technician.
    let outcome = engine.resolve_deletion(&admin(), id, true).await.unwrap();
    assert_matches!(outcome, DeletionOutcome::Deleted);
}

#[tokio::test]
async fn resolving_without_a_pending_request_is_invalid_state() {
    let (engine, _, _) = engine();
    let id = in_progress_service(&engine).await;

    let err = engine
        .resolve_deletion(&technician(), id, true)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::InvalidState(_));
}

// ---------------------------------------------------------------------------
// Audit trail
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejected_operations_append_nothing() {
    let (engine, _, _) = engine();
    let id = in_progress_service(&engine).await;
    let history_before = engine.status_history(&admin(), id).await.unwrap().len();
    let activity_before = engine.activity_log(&admin(), id).await.unwrap().len();

    // A forbidden call, an invalid transition, and an invalid resolution.
    let _ = engine
        .update_status(&client(), id, ServiceStatus::Completed, None)
        .await
        .unwrap_err();
    let _ = engine
        .update_status(&technician(), id, ServiceStatus::Scheduled, None)
        .await
        .unwrap_err();
    let _ = engine
        .resolve_deletion(&technician(), id, true)
        .await
        .unwrap_err();

    assert_eq!(
        engine.status_history(&admin(), id).await.unwrap().len(),
        history_before
    );
    assert_eq!(
        engine.activity_log(&admin(), id).await.unwrap().len(),
        activity_before
    );
}

#[tokio::test]
async fn history_count_matches_accepted_status_calls() {
    let (engine, _, _) = engine();
    let record = engine.create_service(&client(), request()).await.unwrap();
    engine
        .assign_technician(&admin(), record.id, TECH)
        .await
        .unwrap();
    engine
        .update_status(&technician(), record.id, ServiceStatus::InProgress, None)
        .await
        .unwrap();
    engine
        .update_status(&technician(), record.id, ServiceStatus::Completed, None)
        .await
        .unwrap();

    // create + assign + in_progress + completed = 4 accepted status writes.
    let history = engine.status_history(&admin(), record.id).await.unwrap();
    assert_eq!(history.len(), 4);
    let statuses: Vec<ServiceStatus> = history.iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        vec![
            ServiceStatus::Pending,
            ServiceStatus::Scheduled,
            ServiceStatus::InProgress,
            ServiceStatus::Completed,
        ]
    );
    // Entries are ordered by commit order.
    for pair in history.windows(2) {
        assert!(pair[0].id < pair[1].id);
    }
}

#[tokio::test]
async fn activity_log_hash_chain_verifies() {
    let (engine, _, _) = engine();
    let id = in_progress_service(&engine).await;
    engine.request_deletion(&client(), id).await.unwrap();
    engine
        .resolve_deletion(&technician(), id, false)
        .await
        .unwrap();

    let log = engine.activity_log(&admin(), id).await.unwrap();
    assert!(log.len() >= 5);

    let data: Vec<(String, String)> = log
        .iter()
        .map(|e| {
            (
                e.integrity_hash.clone(),
                aftercare_core::activity::canonical_entry_data(
                    e.service_id,
                    &e.kind,
                    e.actor_id,
                    &e.metadata,
                ),
            )
        })
        .collect();
    assert!(verify_chain(
        data.iter().map(|(h, d)| (h.as_str(), d.as_str()))
    ));
}

// ---------------------------------------------------------------------------
// Concurrency guard
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stale_guard_yields_conflict_not_partial_state() {
    let (engine, store, _) = engine();
    let id = in_progress_service(&engine).await;
    let record = engine.get_service(&admin(), id).await.unwrap();

    // A concurrent caller cancels between our read and our write.
    engine.cancel(&client(), id, None).await.unwrap();

    // Our write carries the stale (in_progress, none) guard.
    let err = store
        .commit_transition(
            id,
            StateGuard {
                status: record.status,
                deletion_status: record.deletion_status,
            },
            RecordPatch {
                status: Some(ServiceStatus::Completed),
                ..Default::default()
            },
            None,
            aftercare_core::store::NewActivityEntry {
                kind: event_kinds::STATUS_CHANGED,
                actor_id: TECH,
                metadata: serde_json::json!({}),
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Conflict(_));

    // The cancellation won; nothing of the losing write is visible.
    let after = engine.get_service(&admin(), id).await.unwrap();
    assert_eq!(after.status, ServiceStatus::Cancelled);
    assert!(after.completed_at.is_none());
}

// ---------------------------------------------------------------------------
// Reviews and the creation precondition
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unreviewed_completed_service_blocks_new_requests() {
    let (engine, _, _) = engine();
    let id = in_progress_service(&engine).await;
    engine
        .update_status(&technician(), id, ServiceStatus::Completed, None)
        .await
        .unwrap();

    let err = engine.create_service(&client(), request()).await.unwrap_err();
    assert_matches!(err, CoreError::Conflict(_));

    // Reviewing the completed service lifts the block.
    engine
        .create_review(&client(), id, 5, Some("Quick and tidy".to_string()))
        .await
        .unwrap();
    engine.create_service(&client(), request()).await.unwrap();
}

#[tokio::test]
async fn reviews_are_one_per_service_and_completed_only() {
    let (engine, _, _) = engine();
    let id = in_progress_service(&engine).await;

    let err = engine.create_review(&client(), id, 4, None).await.unwrap_err();
    assert_matches!(err, CoreError::InvalidState(_));

    engine
        .update_status(&technician(), id, ServiceStatus::Completed, None)
        .await
        .unwrap();

    let err = engine.create_review(&client(), id, 9, None).await.unwrap_err();
    assert_matches!(err, CoreError::Validation(_));

    engine.create_review(&client(), id, 4, None).await.unwrap();
    let err = engine.create_review(&client(), id, 4, None).await.unwrap_err();
    assert_matches!(err, CoreError::Conflict(_));
}

// ---------------------------------------------------------------------------
// Visibility
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_is_filtered_by_role() {
    let (engine, _, _) = engine();
    let mine = engine.create_service(&client(), request()).await.unwrap();
    let mut other = request();
    other.client_id = OTHER_CLIENT;
    other.unit_id = None;
    engine
        .create_service(&Actor::new(OTHER_CLIENT, Role::Client), other)
        .await
        .unwrap();

    let for_client = engine.list_services(&client()).await.unwrap();
    assert_eq!(for_client.len(), 1);
    assert_eq!(for_client[0].id, mine.id);

    // Both requests are pending and unassigned: pool-visible to technicians.
    let for_tech = engine.list_services(&technician()).await.unwrap();
    assert_eq!(for_tech.len(), 2);

    // The company only sees the request on its own unit.
    let for_company = engine.list_services(&company()).await.unwrap();
    assert_eq!(for_company.len(), 1);
    assert_eq!(for_company[0].id, mine.id);

    let for_admin = engine.list_services(&admin()).await.unwrap();
    assert_eq!(for_admin.len(), 2);
}

#[tokio::test]
async fn unrelated_actors_cannot_read_a_record() {
    let (engine, _, _) = engine();
    let id = in_progress_service(&engine).await;

    let err = engine
        .get_service(&Actor::new(OTHER_CLIENT, Role::Client), id)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Forbidden(_));

    let err = engine
        .status_history(&Actor::new(OTHER_CLIENT, Role::Client), id)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Forbidden(_));
}
