//! Development and unit row models (constructing-company ownership chain).

use serde::Serialize;
use sqlx::FromRow;

use aftercare_core::types::{DbId, Timestamp};

/// A row from the `developments` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Development {
    pub id: DbId,
    pub constructor_id: DbId,
    pub name: String,
    pub created_at: Timestamp,
}

/// A row from the `units` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Unit {
    pub id: DbId,
    pub development_id: DbId,
    pub label: String,
    pub created_at: Timestamp,
}
