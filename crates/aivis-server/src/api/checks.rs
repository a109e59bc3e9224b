//! Query materialisation, check runs and history.

use aivis_core::{parse_providers, RegionFilter, Tier};
use aivis_engine::{CompetitorGap, HistorySummary, RunOutcome};
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_core_error, map_engine_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct MaterializeRequest {
    /// Keyword ids and `persona:<id>:<text>` tokens.
    selection: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct MaterializeResponse {
    query_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RunChecksRequest {
    selection: Vec<String>,
    providers: Vec<String>,
    #[serde(default)]
    region: Option<RegionFilter>,
    #[serde(default)]
    tier: Option<Tier>,
}

#[derive(Debug, Deserialize)]
pub(super) struct HistoryQuery {
    region: Option<String>,
    language: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct HistoryResponse {
    summary: HistorySummary,
    competitor_gaps: Vec<CompetitorGap>,
}

/// POST /api/v1/projects/{project}/materialize
pub(super) async fn materialize(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(project): Path<String>,
    Json(body): Json<MaterializeRequest>,
) -> Result<Json<ApiResponse<MaterializeResponse>>, ApiError> {
    let query_ids = state
        .engine
        .runner
        .materializer()
        .materialize(&project, &body.selection)
        .await
        .map_err(|e| map_engine_error(&req_id.0, &e))?;

    Ok(ApiResponse::new(&req_id, MaterializeResponse { query_ids }))
}

/// POST /api/v1/projects/{project}/checks runs a batch and returns it with
/// the refreshed history summary.
pub(super) async fn run_checks(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(project): Path<String>,
    Json(body): Json<RunChecksRequest>,
) -> Result<Json<ApiResponse<RunOutcome>>, ApiError> {
    let rid = &req_id.0;
    let providers = parse_providers(&body.providers).map_err(|e| map_core_error(rid, e))?;

    let outcome = state
        .engine
        .runner
        .run_and_refresh(
            &project,
            &body.selection,
            providers,
            body.region,
            body.tier.unwrap_or(Tier::Free),
        )
        .await
        .map_err(|e| map_engine_error(rid, &e))?;

    Ok(ApiResponse::new(&req_id, outcome))
}

/// GET /api/v1/projects/{project}/history?region=..&language=..
pub(super) async fn history(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(project): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<HistoryResponse>>, ApiError> {
    let rid = &req_id.0;
    let region = match (query.region, query.language) {
        (None, None) => None,
        (Some(region), Some(language)) => Some(RegionFilter { region, language }),
        _ => {
            return Err(ApiError::new(
                rid,
                "validation_error",
                "region and language must be given together",
            ))
        }
    };

    let aggregator = state.engine.runner.history();
    let (summary, competitor_gaps) = tokio::try_join!(
        aggregator.refresh(&project, region.as_ref()),
        aggregator.competitor_gaps(&project, region.as_ref()),
    )
    .map_err(|e| map_engine_error(rid, &e))?;

    Ok(ApiResponse::new(
        &req_id,
        HistoryResponse {
            summary,
            competitor_gaps,
        },
    ))
}
