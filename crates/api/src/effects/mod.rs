//! Side-effect wiring: the bus sink and the event consumer.
//!
//! [`BusSink`] is the production [`EffectSink`]: it turns committed
//! [`LifecycleEvent`]s into [`PlatformEvent`]s and publishes them on the
//! broadcast bus without blocking the engine. [`EffectRouter`] consumes
//! the bus from a background task and performs the actual collaborator
//! calls: notification rows, badge evaluation, and the one-shot geocoding
//! trigger. Collaborator failures are traced and swallowed; they never
//! reach the operation that produced the event.

pub mod geocode;

use std::sync::Arc;

use tokio::sync::broadcast;

use aftercare_core::badges::earned_badges;
use aftercare_core::effects::{EffectSink, LifecycleEvent};
use aftercare_core::roles::Role;
use aftercare_core::types::DbId;
use aftercare_db::repositories::{BadgeRepo, NotificationRepo, ServiceRequestRepo};
use aftercare_db::DbPool;
use aftercare_events::{event_types, EventBus, PlatformEvent};

pub use geocode::GeocodeClient;

/// Production effect sink: publish onto the platform event bus.
pub struct BusSink {
    bus: Arc<EventBus>,
}

impl BusSink {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }
}

impl EffectSink for BusSink {
    fn dispatch(&self, event: LifecycleEvent) {
        self.bus.publish(event.into());
    }
}

/// Routes platform events to collaborators.
///
/// Consumes events from the broadcast channel and, for each event, creates
/// the affected users' notifications, re-evaluates badges, and triggers
/// geocoding for new requests.
pub struct EffectRouter {
    pool: DbPool,
    geocoder: GeocodeClient,
}

impl EffectRouter {
    /// Create a new router with the given database pool and geocoder.
    pub fn new(pool: DbPool, geocoder: GeocodeClient) -> Self {
        Self { pool, geocoder }
    }

    /// Run the main routing loop.
    ///
    /// Subscribes to the event bus via `receiver` and processes each
    /// event. The loop exits when the channel is closed (i.e. the
    /// [`EventBus`] is dropped).
    pub async fn run(self, mut receiver: broadcast::Receiver<PlatformEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Err(e) = self.handle_event(&event).await {
                        tracing::error!(
                            error = %e,
                            event_type = %event.event_type,
                            "Failed to process event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Effect router lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, effect router shutting down");
                    break;
                }
            }
        }
    }

    /// Dispatch one event to its collaborators.
    async fn handle_event(
        &self,
        event: &PlatformEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        match event.event_type.as_str() {
            event_types::SERVICE_CREATED => {
                if let (Some(service_id), Some(address)) =
                    (event.service_id, event.payload["address"].as_str())
                {
                    self.geocode(service_id, address).await;
                }
                if let Some(client_id) = payload_id(event, "client_id") {
                    self.evaluate_badges(client_id, Role::Client).await;
                }
            }

            event_types::TECHNICIAN_ASSIGNED => {
                if let (Some(service_id), Some(technician_id)) =
                    (event.service_id, payload_id(event, "technician_id"))
                {
                    self.notify(
                        technician_id,
                        "technician_assigned",
                        Some(service_id),
                        &format!("You have been assigned service request #{service_id}"),
                    )
                    .await;
                }
            }

            event_types::STATUS_CHANGED => {
                let to = event.payload["to"].as_str().unwrap_or_default();
                if let (Some(service_id), Some(client_id)) =
                    (event.service_id, payload_id(event, "client_id"))
                {
                    self.notify(
                        client_id,
                        "status_changed",
                        Some(service_id),
                        &format!("Service request #{service_id} is now {to}"),
                    )
                    .await;
                }
                if to == "completed" {
                    if let Some(technician_id) = payload_id(event, "technician_id") {
                        self.evaluate_badges(technician_id, Role::Technician).await;
                    }
                }
            }

            event_types::DELETION_REQUESTED => {
                if let (Some(service_id), Some(technician_id)) =
                    (event.service_id, payload_id(event, "technician_id"))
                {
                    self.notify(
                        technician_id,
                        "deletion_requested",
                        Some(service_id),
                        &format!(
                            "Deletion of service request #{service_id} awaits your approval"
                        ),
                    )
                    .await;
                }
            }

            event_types::DELETION_APPROVED => {
                if let (Some(service_id), Some(requested_by)) =
                    (event.service_id, payload_id(event, "requested_by"))
                {
                    self.notify(
                        requested_by,
                        "deletion_approved",
                        Some(service_id),
                        &format!("Your deletion request for service #{service_id} was approved"),
                    )
                    .await;
                }
            }

            event_types::DELETION_REJECTED => {
                if let (Some(service_id), Some(requested_by)) =
                    (event.service_id, payload_id(event, "requested_by"))
                {
                    self.notify(
                        requested_by,
                        "deletion_rejected",
                        Some(service_id),
                        &format!("Your deletion request for service #{service_id} was rejected"),
                    )
                    .await;
                }
            }

            event_types::REVIEW_SUBMITTED => {
                if let Some(client_id) = payload_id(event, "client_id") {
                    self.evaluate_badges(client_id, Role::Client).await;
                }
                if let Some(technician_id) = payload_id(event, "technician_id") {
                    self.evaluate_badges(technician_id, Role::Technician).await;
                }
            }

            other => {
                tracing::debug!(event_type = other, "No effects registered for event");
            }
        }

        Ok(())
    }

    /// Create a notification row; failures are logged and swallowed.
    async fn notify(&self, user_id: DbId, kind: &str, service_id: Option<DbId>, body: &str) {
        if let Err(e) =
            NotificationRepo::create(&self.pool, user_id, kind, service_id, body).await
        {
            tracing::error!(error = %e, user_id, kind, "Failed to create notification");
        }
    }

    /// Re-evaluate badge rules for a user and award anything new.
    ///
    /// Awarding is idempotent per `(user, badge)`, so re-delivered events
    /// are harmless.
    async fn evaluate_badges(&self, user_id: DbId, role: Role) {
        let counts = match BadgeRepo::counts_for(&self.pool, user_id, role).await {
            Ok(counts) => counts,
            Err(e) => {
                tracing::error!(error = %e, user_id, "Failed to load badge counters");
                return;
            }
        };
        for badge in earned_badges(role, &counts) {
            match BadgeRepo::award(&self.pool, user_id, badge.as_str()).await {
                Ok(true) => {
                    tracing::info!(user_id, badge = %badge, "Badge awarded");
                    self.notify(
                        user_id,
                        "badge_awarded",
                        None,
                        &format!("You earned the '{badge}' badge"),
                    )
                    .await;
                }
                Ok(false) => {} // already held
                Err(e) => {
                    tracing::error!(error = %e, user_id, badge = %badge, "Failed to award badge");
                }
            }
        }
    }

    /// One-shot geocoding trigger for a freshly created request.
    async fn geocode(&self, service_id: DbId, address: &str) {
        let Some((latitude, longitude)) = self.geocoder.lookup(address).await else {
            return;
        };
        match ServiceRequestRepo::set_coordinates(&self.pool, service_id, latitude, longitude)
            .await
        {
            Ok(true) => {
                tracing::debug!(service_id, latitude, longitude, "Stored geocoded coordinates");
            }
            Ok(false) => {
                tracing::debug!(service_id, "Request deleted before geocoding finished");
            }
            Err(e) => {
                tracing::error!(error = %e, service_id, "Failed to store coordinates");
            }
        }
    }
}

/// Extract an id-shaped field from an event payload.
fn payload_id(event: &PlatformEvent, key: &str) -> Option<DbId> {
    event.payload.get(key).and_then(|v| v.as_i64())
}
