//! Badge award row model.

use serde::Serialize;
use sqlx::FromRow;

use aftercare_core::types::{DbId, Timestamp};

/// A row from the `badges` table. One row per `(user, badge)` pair.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BadgeAward {
    pub id: DbId,
    pub user_id: DbId,
    pub badge: String,
    pub awarded_at: Timestamp,
}
