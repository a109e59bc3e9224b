//! Stateless confidence scoring endpoints.

use aivis_core::{
    coverage_confidence, page_sample_confidence, recommendation_confidence,
    recommendation_points, ConfidenceBadge, RecommendationInput,
};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::ApiResponse;

/// Counts are optional and may be negative on the wire; both read as zero so
/// the score degrades to `Low` instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct PagesRequest {
    pages_sampled: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct CoverageRequest {
    checks: Option<i64>,
    distinct_providers: Option<i64>,
    distinct_queries: Option<i64>,
}

fn count(raw: Option<i64>) -> u64 {
    raw.and_then(|n| u64::try_from(n).ok()).unwrap_or(0)
}

fn count_usize(raw: Option<i64>) -> usize {
    raw.and_then(|n| usize::try_from(n).ok()).unwrap_or(0)
}

#[derive(Debug, Serialize)]
pub(super) struct RecommendationScore {
    points: u32,
    #[serde(flatten)]
    badge: ConfidenceBadge,
}

/// POST /api/v1/confidence/pages
pub(super) async fn pages(
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<PagesRequest>,
) -> Json<ApiResponse<ConfidenceBadge>> {
    ApiResponse::new(&req_id, page_sample_confidence(count(body.pages_sampled)))
}

/// POST /api/v1/confidence/coverage
pub(super) async fn coverage(
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CoverageRequest>,
) -> Json<ApiResponse<ConfidenceBadge>> {
    ApiResponse::new(
        &req_id,
        coverage_confidence(
            count_usize(body.checks),
            count_usize(body.distinct_providers),
            count_usize(body.distinct_queries),
        ),
    )
}

/// POST /api/v1/confidence/recommendation
pub(super) async fn recommendation(
    Extension(req_id): Extension<RequestId>,
    Json(input): Json<RecommendationInput>,
) -> Json<ApiResponse<RecommendationScore>> {
    ApiResponse::new(
        &req_id,
        RecommendationScore {
            points: recommendation_points(&input),
            badge: recommendation_confidence(&input),
        },
    )
}
