//! Integration tests for `PgServiceStore` against a real database.
//!
//! These run against the database in `DATABASE_URL` and are `#[ignore]`d
//! by default; run them with `cargo test -p aftercare-db -- --ignored`.

use aftercare_core::activity::event_kinds;
use aftercare_core::deletion::DeletionStatus;
use aftercare_core::lifecycle::ServiceStatus;
use aftercare_core::store::{
    NewActivityEntry, NewHistoryEntry, NewServiceRecord, RecordPatch, ServiceStore, StateGuard,
};
use aftercare_core::CoreError;
use aftercare_db::repositories::{ActivityLogRepo, ReviewRepo, UnitRepo};
use aftercare_db::{DbPool, PgServiceStore};

async fn pool() -> DbPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for db tests");
    let pool = aftercare_db::create_pool(&url).await.expect("connect");
    aftercare_db::run_migrations(&pool).await.expect("migrate");
    pool
}

fn request(client_id: i64) -> NewServiceRecord {
    NewServiceRecord {
        client_id,
        technician_id: None,
        unit_id: None,
        subject: "Cracked bathroom tile".to_string(),
        description: "Hairline crack along the grout line".to_string(),
        address: "8 Windmill Lane".to_string(),
        city: "Utrecht".to_string(),
        postal_code: "3511 XK".to_string(),
    }
}

fn created_entry(actor_id: i64) -> NewActivityEntry {
    NewActivityEntry {
        kind: event_kinds::SERVICE_CREATED,
        actor_id,
        metadata: serde_json::json!({}),
    }
}

#[tokio::test]
#[ignore]
async fn insert_fetch_and_history_round_trip() {
    let pool = pool().await;
    let store = PgServiceStore::new(pool);

    let record = store
        .insert_service(
            request(9001),
            ServiceStatus::Pending,
            NewHistoryEntry {
                status: ServiceStatus::Pending,
                actor_id: 9001,
                note: None,
            },
            created_entry(9001),
        )
        .await
        .unwrap();

    assert_eq!(record.status, ServiceStatus::Pending);
    assert_eq!(record.deletion_status, DeletionStatus::None);

    let fetched = store.fetch_service(record.id).await.unwrap().unwrap();
    assert_eq!(fetched.client_id, 9001);

    let history = store.status_history(record.id).await.unwrap();
    assert_eq!(history.len(), 1);

    let log = store.activity_log(record.id).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].kind, event_kinds::SERVICE_CREATED);
    assert_eq!(log[0].integrity_hash.len(), 64);
}

#[tokio::test]
#[ignore]
async fn stale_guard_is_rejected() {
    let pool = pool().await;
    let store = PgServiceStore::new(pool);

    let record = store
        .insert_service(
            request(9002),
            ServiceStatus::Pending,
            NewHistoryEntry {
                status: ServiceStatus::Pending,
                actor_id: 9002,
                note: None,
            },
            created_entry(9002),
        )
        .await
        .unwrap();

    let stale = StateGuard {
        status: ServiceStatus::InProgress,
        deletion_status: DeletionStatus::None,
    };
    let err = store
        .commit_transition(
            record.id,
            stale,
            RecordPatch {
                status: Some(ServiceStatus::Cancelled),
                ..Default::default()
            },
            None,
            NewActivityEntry {
                kind: event_kinds::STATUS_CHANGED,
                actor_id: 9002,
                metadata: serde_json::json!({}),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));

    // The record is untouched.
    let fetched = store.fetch_service(record.id).await.unwrap().unwrap();
    assert_eq!(fetched.status, ServiceStatus::Pending);
}

#[tokio::test]
#[ignore]
async fn activity_entries_survive_hard_delete() {
    let pool = pool().await;
    let store = PgServiceStore::new(pool);

    let record = store
        .insert_service(
            request(9003),
            ServiceStatus::Pending,
            NewHistoryEntry {
                status: ServiceStatus::Pending,
                actor_id: 9003,
                note: None,
            },
            created_entry(9003),
        )
        .await
        .unwrap();

    store
        .delete_service(
            record.id,
            record.guard(),
            vec![NewActivityEntry {
                kind: event_kinds::SERVICE_DELETED,
                actor_id: 9003,
                metadata: serde_json::json!({}),
            }],
        )
        .await
        .unwrap();

    assert!(store.fetch_service(record.id).await.unwrap().is_none());

    let log = store.activity_log(record.id).await.unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].kind, event_kinds::SERVICE_DELETED);
}

#[tokio::test]
#[ignore]
async fn ownership_chain_resolves_through_development() {
    let pool = pool().await;

    let development = UnitRepo::create_development(&pool, 7001, "Harbour Quarter")
        .await
        .unwrap();
    let unit = UnitRepo::create_unit(&pool, development.id, "Block C, Apt 12")
        .await
        .unwrap();

    let store = PgServiceStore::new(pool.clone());
    assert_eq!(
        store.resolve_constructing_company(unit.id).await.unwrap(),
        Some(7001)
    );
    assert_eq!(
        store.resolve_constructing_company(i64::MAX).await.unwrap(),
        None
    );
}

#[tokio::test]
#[ignore]
async fn activity_chain_links_across_transitions() {
    let pool = pool().await;
    let store = PgServiceStore::new(pool.clone());

    let record = store
        .insert_service(
            request(9005),
            ServiceStatus::Pending,
            NewHistoryEntry {
                status: ServiceStatus::Pending,
                actor_id: 9005,
                note: None,
            },
            created_entry(9005),
        )
        .await
        .unwrap();

    store
        .commit_transition(
            record.id,
            record.guard(),
            RecordPatch {
                status: Some(ServiceStatus::Cancelled),
                ..Default::default()
            },
            Some(NewHistoryEntry {
                status: ServiceStatus::Cancelled,
                actor_id: 9005,
                note: None,
            }),
            NewActivityEntry {
                kind: event_kinds::STATUS_CHANGED,
                actor_id: 9005,
                metadata: serde_json::json!({}),
            },
        )
        .await
        .unwrap();

    let log = store.activity_log(record.id).await.unwrap();
    assert_eq!(log.len(), 2);
    assert_ne!(log[0].integrity_hash, log[1].integrity_hash);

    // The newest hash is the chain head the next append will link to.
    let head = ActivityLogRepo::last_hash(&pool, record.id).await.unwrap();
    assert_eq!(head.as_deref(), Some(log[1].integrity_hash.as_str()));
}

#[tokio::test]
#[ignore]
async fn one_review_per_service() {
    let pool = pool().await;
    let store = PgServiceStore::new(pool.clone());

    let record = store
        .insert_service(
            request(9004),
            ServiceStatus::Pending,
            NewHistoryEntry {
                status: ServiceStatus::Pending,
                actor_id: 9004,
                note: None,
            },
            created_entry(9004),
        )
        .await
        .unwrap();

    store
        .insert_review(record.id, 9004, None, 5, None)
        .await
        .unwrap();
    let err = store
        .insert_review(record.id, 9004, None, 4, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));

    let review = ReviewRepo::find_by_service(&pool, record.id)
        .await
        .unwrap()
        .expect("the first review must have been stored");
    assert_eq!(review.rating, 5);
}
