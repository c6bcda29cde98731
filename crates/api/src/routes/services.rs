//! Route definitions for the service-request lifecycle.

use axum::routing::{get, patch, post};
use axum::Router;

use crate::handlers::services;
use crate::state::AppState;

/// Service routes mounted at `/services`.
///
/// Authorization is per-record and enforced by the lifecycle engine's
/// capability matrix, not at the route layer.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(services::create_service).get(services::list_services),
        )
        .route(
            "/{id}",
            get(services::get_service).delete(services::request_deletion),
        )
        .route("/{id}/assign", post(services::assign_technician))
        .route("/{id}/status", patch(services::update_status))
        .route("/{id}/cancel", post(services::cancel_service))
        .route("/{id}/deletion", post(services::resolve_deletion))
        .route("/{id}/history", get(services::status_history))
        .route("/{id}/activity", get(services::activity_log))
        .route("/{id}/review", post(services::create_review))
}
