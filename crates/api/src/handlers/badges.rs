//! Handlers for the `/badges` resource.

use axum::extract::State;
use axum::Json;

use aftercare_db::models::badge::BadgeAward;
use aftercare_db::repositories::BadgeRepo;

use crate::error::AppResult;
use crate::middleware::AuthUser;
use crate::state::AppState;

/// GET /api/v1/badges
///
/// List the authenticated user's badges in award order.
pub async fn list_badges(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<Vec<BadgeAward>>> {
    let badges = BadgeRepo::list_for_user(&state.pool, user.user_id).await?;
    Ok(Json(badges))
}
