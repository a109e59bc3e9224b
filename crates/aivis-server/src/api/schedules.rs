//! Schedule lifecycle and first-schedule suggestion handlers.
//!
//! Mutations return the stored schedule so callers can re-render from the
//! backend's view rather than patching local state.

use aivis_core::{parse_providers, Frequency, ScheduledQuery};
use aivis_engine::{RunDueOutcome, ScheduleSuggestion};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_core_error, map_engine_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct CreateScheduleRequest {
    query: String,
    providers: Vec<String>,
    #[serde(default)]
    frequency: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct DeletedResponse {
    id: String,
    deleted: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct DismissedResponse {
    dismissed: bool,
}

/// GET /api/v1/projects/{project}/schedules
pub(super) async fn list_schedules(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(project): Path<String>,
) -> Result<Json<ApiResponse<Vec<ScheduledQuery>>>, ApiError> {
    let schedules = state
        .engine
        .schedules
        .list(&project)
        .await
        .map_err(|e| map_engine_error(&req_id.0, &e))?;
    Ok(ApiResponse::new(&req_id, schedules))
}

/// POST /api/v1/projects/{project}/schedules (frequency defaults to weekly)
pub(super) async fn create_schedule(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(project): Path<String>,
    Json(body): Json<CreateScheduleRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ScheduledQuery>>), ApiError> {
    let rid = &req_id.0;
    let providers = parse_providers(&body.providers).map_err(|e| map_core_error(rid, e))?;
    let frequency: Frequency = match body.frequency.as_deref() {
        Some(raw) => raw.parse().map_err(|e| map_core_error(rid, e))?,
        None => Frequency::Weekly,
    };

    let created = state
        .engine
        .schedules
        .create(&project, &body.query, providers, frequency)
        .await
        .map_err(|e| map_engine_error(rid, &e))?;

    Ok((StatusCode::CREATED, ApiResponse::new(&req_id, created)))
}

/// POST /api/v1/schedules/{id}/toggle
pub(super) async fn toggle_schedule(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ScheduledQuery>>, ApiError> {
    let updated = state
        .engine
        .schedules
        .toggle(&id)
        .await
        .map_err(|e| map_engine_error(&req_id.0, &e))?;
    Ok(ApiResponse::new(&req_id, updated))
}

/// POST /api/v1/schedules/{id}/run
///
/// Runs the schedule only if it is due; otherwise reports why it was skipped.
pub(super) async fn run_schedule(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<RunDueOutcome>>, ApiError> {
    let outcome = state
        .engine
        .schedules
        .run_due(&id)
        .await
        .map_err(|e| map_engine_error(&req_id.0, &e))?;
    Ok(ApiResponse::new(&req_id, outcome))
}

/// DELETE /api/v1/schedules/{id}
pub(super) async fn delete_schedule(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<DeletedResponse>>, ApiError> {
    state
        .engine
        .schedules
        .delete(&id)
        .await
        .map_err(|e| map_engine_error(&req_id.0, &e))?;
    Ok(ApiResponse::new(&req_id, DeletedResponse { id, deleted: true }))
}

/// GET /api/v1/projects/{project}/schedules/suggestion. `data` is null when
/// no suggestion should be shown.
pub(super) async fn get_suggestion(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(project): Path<String>,
) -> Result<Json<ApiResponse<Option<ScheduleSuggestion>>>, ApiError> {
    let suggestion = state
        .engine
        .suggestions
        .suggest_from_history(&project)
        .await
        .map_err(|e| map_engine_error(&req_id.0, &e))?;
    Ok(ApiResponse::new(&req_id, suggestion))
}

/// POST /api/v1/projects/{project}/schedules/suggestion/dismiss
pub(super) async fn dismiss_suggestion(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(project): Path<String>,
) -> Result<Json<ApiResponse<DismissedResponse>>, ApiError> {
    state
        .engine
        .suggestions
        .dismiss(&project)
        .await
        .map_err(|e| map_engine_error(&req_id.0, &e))?;
    Ok(ApiResponse::new(&req_id, DismissedResponse { dismissed: true }))
}

/// POST /api/v1/projects/{project}/schedules/suggestion/accept
pub(super) async fn accept_suggestion(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(project): Path<String>,
) -> Result<(StatusCode, Json<ApiResponse<ScheduledQuery>>), ApiError> {
    let rid = &req_id.0;
    let suggestion = state
        .engine
        .suggestions
        .suggest_from_history(&project)
        .await
        .map_err(|e| map_engine_error(rid, &e))?
        .ok_or_else(|| {
            ApiError::new(rid, "not_found", "no schedule suggestion for this project")
        })?;

    let created = state
        .engine
        .suggestions
        .accept(&suggestion)
        .await
        .map_err(|e| map_engine_error(rid, &e))?;
    Ok((StatusCode::CREATED, ApiResponse::new(&req_id, created)))
}
