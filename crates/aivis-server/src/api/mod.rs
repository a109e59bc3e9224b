mod checks;
mod confidence;
mod providers;
mod schedules;

use aivis_core::CoreError;
use aivis_engine::{Engine, EngineError};
use axum::{
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
};

#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(request_id: &RequestId, data: T) -> Json<Self> {
        Json(Self {
            data,
            meta: ResponseMeta::new(request_id.0.clone()),
        })
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "quota_exceeded" => StatusCode::PAYMENT_REQUIRED,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "upstream_unavailable" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn map_engine_error(request_id: &str, error: &EngineError) -> ApiError {
    match error {
        EngineError::Validation(msg) => ApiError::new(request_id, "validation_error", msg.clone()),
        EngineError::Quota { .. } => {
            ApiError::new(request_id, "quota_exceeded", error.to_string())
        }
        EngineError::Auth => ApiError::new(
            request_id,
            "unauthorized",
            "the visibility backend rejected the session",
        ),
        EngineError::NotFound(what) => {
            ApiError::new(request_id, "not_found", format!("{what} not found"))
        }
        EngineError::Rejected(msg) => ApiError::new(request_id, "validation_error", msg.clone()),
        EngineError::Conflict(msg) => ApiError::new(request_id, "conflict", msg.clone()),
        EngineError::Transient(_) | EngineError::IncompleteBatch { .. } => {
            tracing::warn!(error = %error, "visibility backend unavailable");
            ApiError::new(request_id, "upstream_unavailable", error.to_string())
        }
    }
}

pub(super) fn map_core_error(request_id: &str, error: CoreError) -> ApiError {
    map_engine_error(request_id, &EngineError::from(error))
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/providers", get(providers::list_providers))
        .route(
            "/api/v1/providers/recommend",
            get(providers::recommend),
        )
        .route("/api/v1/providers/preset", post(providers::apply_preset))
        .route("/api/v1/confidence/pages", post(confidence::pages))
        .route("/api/v1/confidence/coverage", post(confidence::coverage))
        .route(
            "/api/v1/confidence/recommendation",
            post(confidence::recommendation),
        )
        .route(
            "/api/v1/projects/{project}/materialize",
            post(checks::materialize),
        )
        .route("/api/v1/projects/{project}/checks", post(checks::run_checks))
        .route("/api/v1/projects/{project}/history", get(checks::history))
        .route(
            "/api/v1/projects/{project}/schedules",
            get(schedules::list_schedules).post(schedules::create_schedule),
        )
        .route(
            "/api/v1/projects/{project}/schedules/suggestion",
            get(schedules::get_suggestion),
        )
        .route(
            "/api/v1/projects/{project}/schedules/suggestion/dismiss",
            post(schedules::dismiss_suggestion),
        )
        .route(
            "/api/v1/projects/{project}/schedules/suggestion/accept",
            post(schedules::accept_suggestion),
        )
        .route(
            "/api/v1/schedules/{id}/toggle",
            post(schedules::toggle_schedule),
        )
        .route("/api/v1/schedules/{id}/run", post(schedules::run_schedule))
        .route("/api/v1/schedules/{id}", delete(schedules::delete_schedule))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(Extension(req_id): Extension<RequestId>) -> impl IntoResponse {
    ApiResponse::new(&req_id, HealthData { status: "ok" })
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
