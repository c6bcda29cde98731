//! Route definitions for badges.

use axum::routing::get;
use axum::Router;

use crate::handlers::badges;
use crate::state::AppState;

/// Badge routes mounted at `/badges`.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(badges::list_badges))
}
