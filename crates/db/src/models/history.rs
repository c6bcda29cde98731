//! Row models for the append-only audit collections.

use std::str::FromStr;

use serde::Serialize;
use sqlx::FromRow;

use aftercare_core::error::CoreError;
use aftercare_core::lifecycle::ServiceStatus;
use aftercare_core::store::{ActivityLogEntry, StatusHistoryEntry};
use aftercare_core::types::{DbId, Timestamp};

/// A row from the `status_history` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StatusHistoryRow {
    pub id: DbId,
    pub service_id: DbId,
    pub status: String,
    pub actor_id: DbId,
    pub note: Option<String>,
    pub created_at: Timestamp,
}

impl StatusHistoryRow {
    pub fn into_entry(self) -> Result<StatusHistoryEntry, CoreError> {
        let status = ServiceStatus::from_str(&self.status)
            .map_err(|_| CoreError::Internal(format!("corrupt status '{}'", self.status)))?;
        Ok(StatusHistoryEntry {
            id: self.id,
            service_id: self.service_id,
            status,
            actor_id: self.actor_id,
            note: self.note,
            created_at: self.created_at,
        })
    }
}

/// A row from the `activity_log` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ActivityLogRow {
    pub id: DbId,
    pub service_id: DbId,
    pub kind: String,
    pub actor_id: DbId,
    pub metadata: serde_json::Value,
    pub integrity_hash: String,
    pub created_at: Timestamp,
}

impl ActivityLogRow {
    pub fn into_entry(self) -> ActivityLogEntry {
        ActivityLogEntry {
            id: self.id,
            service_id: self.service_id,
            kind: self.kind,
            actor_id: self.actor_id,
            metadata: self.metadata,
            integrity_hash: self.integrity_hash,
            created_at: self.created_at,
        }
    }
}
