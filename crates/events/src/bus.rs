//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`PlatformEvent`]s. It is
//! shared via `Arc<EventBus>` across the application; publishing never
//! blocks and never fails the publisher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use aftercare_core::effects::LifecycleEvent;
use aftercare_core::types::DbId;

/// Well-known event type names.
pub mod event_types {
    pub const SERVICE_CREATED: &str = "service.created";
    pub const TECHNICIAN_ASSIGNED: &str = "service.technician_assigned";
    pub const STATUS_CHANGED: &str = "service.status_changed";
    pub const DELETION_REQUESTED: &str = "service.deletion_requested";
    pub const DELETION_APPROVED: &str = "service.deletion_approved";
    pub const DELETION_REJECTED: &str = "service.deletion_rejected";
    pub const REVIEW_SUBMITTED: &str = "review.submitted";
}

// ---------------------------------------------------------------------------
// PlatformEvent
// ---------------------------------------------------------------------------

/// A committed domain event, as carried on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEvent {
    /// Dot-separated event name, e.g. `"service.status_changed"`.
    pub event_type: String,

    /// The service request the event concerns.
    pub service_id: Option<DbId>,

    /// The actor whose operation produced the event.
    pub actor_id: Option<DbId>,

    /// Event-specific data (recipient ids, target status, address, ...).
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl PlatformEvent {
    /// Create a new event with only the required `event_type`.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            service_id: None,
            actor_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Attach the subject service request.
    pub fn with_service(mut self, service_id: DbId) -> Self {
        self.service_id = Some(service_id);
        self
    }

    /// Attach the acting user.
    pub fn with_actor(mut self, actor_id: DbId) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    /// Set the JSON payload.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

impl From<LifecycleEvent> for PlatformEvent {
    fn from(event: LifecycleEvent) -> Self {
        match event {
            LifecycleEvent::Created {
                service_id,
                client_id,
                address,
            } => PlatformEvent::new(event_types::SERVICE_CREATED)
                .with_service(service_id)
                .with_actor(client_id)
                .with_payload(serde_json::json!({
                    "client_id": client_id,
                    "address": address,
                })),

            LifecycleEvent::TechnicianAssigned {
                service_id,
                technician_id,
                assigned_by,
            } => PlatformEvent::new(event_types::TECHNICIAN_ASSIGNED)
                .with_service(service_id)
                .with_actor(assigned_by)
                .with_payload(serde_json::json!({
                    "technician_id": technician_id,
                })),

            LifecycleEvent::StatusChanged {
                service_id,
                client_id,
                technician_id,
                to,
                actor_id,
            } => PlatformEvent::new(event_types::STATUS_CHANGED)
                .with_service(service_id)
                .with_actor(actor_id)
                .with_payload(serde_json::json!({
                    "client_id": client_id,
                    "technician_id": technician_id,
                    "to": to.as_str(),
                })),

            LifecycleEvent::DeletionRequested {
                service_id,
                technician_id,
                requested_by,
            } => PlatformEvent::new(event_types::DELETION_REQUESTED)
                .with_service(service_id)
                .with_actor(requested_by)
                .with_payload(serde_json::json!({
                    "technician_id": technician_id,
                    "requested_by": requested_by,
                })),

            LifecycleEvent::DeletionApproved {
                service_id,
                requested_by,
                resolved_by,
            } => PlatformEvent::new(event_types::DELETION_APPROVED)
                .with_service(service_id)
                .with_actor(resolved_by)
                .with_payload(serde_json::json!({
                    "requested_by": requested_by,
                })),

            LifecycleEvent::DeletionRejected {
                service_id,
                requested_by,
                resolved_by,
            } => PlatformEvent::new(event_types::DELETION_REJECTED)
                .with_service(service_id)
                .with_actor(resolved_by)
                .with_payload(serde_json::json!({
                    "requested_by": requested_by,
                })),

            LifecycleEvent::ReviewSubmitted {
                service_id,
                client_id,
                technician_id,
            } => PlatformEvent::new(event_types::REVIEW_SUBMITTED)
                .with_service(service_id)
                .with_actor(client_id)
                .with_payload(serde_json::json!({
                    "client_id": client_id,
                    "technician_id": technician_id,
                })),
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so any number of subscribers can
/// independently receive every published [`PlatformEvent`].
pub struct EventBus {
    sender: broadcast::Sender<PlatformEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// With zero subscribers the event is silently dropped; delivery is
    /// at-least-once only while a subscriber keeps up.
    pub fn publish(&self, event: PlatformEvent) {
        // Ignore the SendError — it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use aftercare_core::lifecycle::ServiceStatus;

    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(
            PlatformEvent::new(event_types::SERVICE_CREATED)
                .with_service(42)
                .with_actor(7)
                .with_payload(serde_json::json!({"address": "12 Harbour Street"})),
        );

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, event_types::SERVICE_CREATED);
        assert_eq!(received.service_id, Some(42));
        assert_eq!(received.actor_id, Some(7));
        assert_eq!(received.payload["address"], "12 Harbour Street");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(PlatformEvent::new(event_types::STATUS_CHANGED));

        assert_eq!(
            rx1.recv().await.unwrap().event_type,
            event_types::STATUS_CHANGED
        );
        assert_eq!(
            rx2.recv().await.unwrap().event_type,
            event_types::STATUS_CHANGED
        );
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(PlatformEvent::new("orphan.event"));
    }

    #[test]
    fn lifecycle_events_map_onto_typed_envelopes() {
        let event: PlatformEvent = LifecycleEvent::StatusChanged {
            service_id: 9,
            client_id: 1,
            technician_id: Some(2),
            to: ServiceStatus::Completed,
            actor_id: 2,
        }
        .into();

        assert_eq!(event.event_type, event_types::STATUS_CHANGED);
        assert_eq!(event.service_id, Some(9));
        assert_eq!(event.payload["to"], "completed");

        let event: PlatformEvent = LifecycleEvent::DeletionRequested {
            service_id: 9,
            technician_id: Some(2),
            requested_by: 1,
        }
        .into();
        assert_eq!(event.event_type, event_types::DELETION_REQUESTED);
        assert_eq!(event.payload["requested_by"], 1);
    }
}
