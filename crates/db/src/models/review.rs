//! Review row model.

use serde::Serialize;
use sqlx::FromRow;

use aftercare_core::types::{DbId, Timestamp};

/// A row from the `reviews` table. At most one per service request.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Review {
    pub id: DbId,
    pub service_id: DbId,
    pub client_id: DbId,
    pub technician_id: Option<DbId>,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: Timestamp,
}
