//! Route tree assembly.

pub mod badges;
pub mod health;
pub mod notifications;
pub mod services;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /services                          create (POST), list (GET)
/// /services/{id}                     get (GET), request deletion (DELETE)
/// /services/{id}/assign              assign technician (POST)
/// /services/{id}/status              update status (PATCH)
/// /services/{id}/cancel              cancel (POST)
/// /services/{id}/deletion            resolve deletion request (POST)
/// /services/{id}/history             status history (GET)
/// /services/{id}/activity            activity log (GET)
/// /services/{id}/review              create review (POST)
///
/// /notifications                     list (GET)
/// /notifications/{id}/read           mark read (POST)
/// /notifications/read-all            mark all read (POST)
/// /notifications/unread-count        unread count (GET)
///
/// /badges                            list own badges (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/services", services::router())
        .nest("/notifications", notifications::router())
        .nest("/badges", badges::router())
}
