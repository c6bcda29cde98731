use std::sync::Arc;

use aftercare_core::LifecycleEngine;
use aftercare_events::EventBus;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`.
///
/// Cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (used directly by read-side handlers).
    pub pool: aftercare_db::DbPool,
    /// Server configuration (accessed by middleware and handlers).
    pub config: Arc<ServerConfig>,
    /// The lifecycle engine every service-request operation goes through.
    pub engine: Arc<LifecycleEngine>,
    /// Centralized event bus for committed lifecycle events.
    pub event_bus: Arc<EventBus>,
}
