//! Handlers for the `/services` resource.
//!
//! Every operation delegates to the lifecycle engine, which owns
//! authorization, transition validation, and the audit trail. Handlers
//! only shape payloads and responses.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use aftercare_core::error::CoreError;
use aftercare_core::lifecycle::ServiceStatus;
use aftercare_core::roles::Role;
use aftercare_core::store::{
    ActivityLogEntry, NewServiceRecord, ServiceRecord, StatusHistoryEntry,
};
use aftercare_core::types::DbId;
use aftercare_core::DeletionOutcome;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::state::AppState;

/// Payload for creating a service request.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateServicePayload {
    /// Required when a company or admin files on a client's behalf;
    /// ignored for clients (always themselves).
    pub client_id: Option<DbId>,
    /// Optional creation-time assignment; starts the request `scheduled`.
    pub technician_id: Option<DbId>,
    pub unit_id: Option<DbId>,
    #[validate(length(min = 1, max = 200))]
    pub subject: String,
    #[validate(length(max = 10_000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub address: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 20))]
    pub postal_code: String,
}

/// Payload for a status update.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusPayload {
    pub status: ServiceStatus,
    pub note: Option<String>,
}

/// Payload for assigning a technician.
#[derive(Debug, Deserialize)]
pub struct AssignTechnicianPayload {
    pub technician_id: DbId,
}

/// Payload for cancelling a request.
#[derive(Debug, Default, Deserialize)]
pub struct CancelPayload {
    pub note: Option<String>,
}

/// Payload for resolving a pending deletion request.
#[derive(Debug, Deserialize)]
pub struct ResolveDeletionPayload {
    pub approved: bool,
}

/// Payload for reviewing a completed service.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewPayload {
    pub rating: i16,
    #[validate(length(max = 5_000))]
    pub comment: Option<String>,
}

/// Response for deletion-workflow operations.
#[derive(Debug, Serialize)]
pub struct DeletionResponse {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceRecord>,
}

impl From<DeletionOutcome> for DeletionResponse {
    fn from(outcome: DeletionOutcome) -> Self {
        match outcome {
            DeletionOutcome::Deleted => DeletionResponse {
                outcome: "deleted",
                service: None,
            },
            DeletionOutcome::PendingApproval(service) => DeletionResponse {
                outcome: "pending_approval",
                service: Some(service),
            },
            DeletionOutcome::Rejected(service) => DeletionResponse {
                outcome: "rejected",
                service: Some(service),
            },
        }
    }
}

/// POST /api/v1/services
pub async fn create_service(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateServicePayload>,
) -> AppResult<(StatusCode, Json<ServiceRecord>)> {
    payload
        .validate()
        .map_err(|e| AppError::Core(CoreError::Validation(e.to_string())))?;

    let actor = user.actor();
    let client_id = match actor.role {
        Role::Client => actor.id,
        _ => payload.client_id.ok_or_else(|| {
            AppError::BadRequest("client_id is required when filing on a client's behalf".into())
        })?,
    };

    let input = NewServiceRecord {
        client_id,
        technician_id: payload.technician_id,
        unit_id: payload.unit_id,
        subject: payload.subject,
        description: payload.description.unwrap_or_default(),
        address: payload.address,
        city: payload.city,
        postal_code: payload.postal_code,
    };
    let record = state.engine.create_service(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/v1/services
pub async fn list_services(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<Vec<ServiceRecord>>> {
    let records = state.engine.list_services(&user.actor()).await?;
    Ok(Json(records))
}

/// GET /api/v1/services/{id}
pub async fn get_service(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<ServiceRecord>> {
    let record = state.engine.get_service(&user.actor(), id).await?;
    Ok(Json(record))
}

/// POST /api/v1/services/{id}/assign
pub async fn assign_technician(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
    Json(payload): Json<AssignTechnicianPayload>,
) -> AppResult<Json<ServiceRecord>> {
    let record = state
        .engine
        .assign_technician(&user.actor(), id, payload.technician_id)
        .await?;
    Ok(Json(record))
}

/// PATCH /api/v1/services/{id}/status
pub async fn update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
    Json(payload): Json<UpdateStatusPayload>,
) -> AppResult<Json<ServiceRecord>> {
    let record = state
        .engine
        .update_status(&user.actor(), id, payload.status, payload.note)
        .await?;
    Ok(Json(record))
}

/// POST /api/v1/services/{id}/cancel
pub async fn cancel_service(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
    payload: Option<Json<CancelPayload>>,
) -> AppResult<Json<ServiceRecord>> {
    let note = payload.and_then(|Json(p)| p.note);
    let record = state.engine.cancel(&user.actor(), id, note).await?;
    Ok(Json(record))
}

/// DELETE /api/v1/services/{id}
pub async fn request_deletion(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<DeletionResponse>> {
    let outcome = state.engine.request_deletion(&user.actor(), id).await?;
    Ok(Json(outcome.into()))
}

/// POST /api/v1/services/{id}/deletion
pub async fn resolve_deletion(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
    Json(payload): Json<ResolveDeletionPayload>,
) -> AppResult<Json<DeletionResponse>> {
    let outcome = state
        .engine
        .resolve_deletion(&user.actor(), id, payload.approved)
        .await?;
    Ok(Json(outcome.into()))
}

/// GET /api/v1/services/{id}/history
pub async fn status_history(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<Vec<StatusHistoryEntry>>> {
    let entries = state.engine.status_history(&user.actor(), id).await?;
    Ok(Json(entries))
}

/// GET /api/v1/services/{id}/activity
pub async fn activity_log(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<Vec<ActivityLogEntry>>> {
    let entries = state.engine.activity_log(&user.actor(), id).await?;
    Ok(Json(entries))
}

/// POST /api/v1/services/{id}/review
pub async fn create_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<DbId>,
    Json(payload): Json<CreateReviewPayload>,
) -> AppResult<StatusCode> {
    payload
        .validate()
        .map_err(|e| AppError::Core(CoreError::Validation(e.to_string())))?;
    state
        .engine
        .create_review(&user.actor(), id, payload.rating, payload.comment)
        .await?;
    Ok(StatusCode::CREATED)
}
