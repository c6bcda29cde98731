//! Service request row model and its mapping into the domain record.

use std::str::FromStr;

use serde::Serialize;
use sqlx::FromRow;

use aftercare_core::deletion::DeletionStatus;
use aftercare_core::error::CoreError;
use aftercare_core::lifecycle::ServiceStatus;
use aftercare_core::store::ServiceRecord;
use aftercare_core::types::{DbId, Timestamp};

/// A row from the `service_requests` table.
///
/// Status columns are TEXT in the database (constrained by CHECKs); the
/// conversion into [`ServiceRecord`] parses them into the typed enums.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ServiceRequestRow {
    pub id: DbId,
    pub client_id: DbId,
    pub technician_id: Option<DbId>,
    pub unit_id: Option<DbId>,
    pub subject: String,
    pub description: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: String,
    pub deletion_status: String,
    pub deletion_requested_by: Option<DbId>,
    pub deletion_requested_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ServiceRequestRow {
    /// Convert into the domain record, parsing the status columns.
    ///
    /// A parse failure means the row violates its CHECK constraints and is
    /// reported as an internal error, not a validation error.
    pub fn into_record(self) -> Result<ServiceRecord, CoreError> {
        let status = ServiceStatus::from_str(&self.status)
            .map_err(|_| CoreError::Internal(format!("corrupt status '{}'", self.status)))?;
        let deletion_status = DeletionStatus::from_str(&self.deletion_status).map_err(|_| {
            CoreError::Internal(format!("corrupt deletion status '{}'", self.deletion_status))
        })?;
        Ok(ServiceRecord {
            id: self.id,
            client_id: self.client_id,
            technician_id: self.technician_id,
            unit_id: self.unit_id,
            subject: self.subject,
            description: self.description,
            address: self.address,
            city: self.city,
            postal_code: self.postal_code,
            latitude: self.latitude,
            longitude: self.longitude,
            status,
            deletion_status,
            deletion_requested_by: self.deletion_requested_by,
            deletion_requested_at: self.deletion_requested_at,
            completed_at: self.completed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
