use std::sync::Arc;

use aivis_engine::{Engine, InMemoryBackend, PortError, SystemClock};
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::*;

fn app_with(backend: Arc<InMemoryBackend>, auth: AuthState) -> Router {
    let engine = Engine::new(backend, Arc::new(SystemClock), 2);
    build_app(AppState { engine }, auth, default_rate_limit_state())
}

fn open_app() -> (Arc<InMemoryBackend>, Router) {
    let backend = Arc::new(InMemoryBackend::new());
    backend.seed_keyword("p1", "kw-1", "crm for startups");
    let app = app_with(Arc::clone(&backend), AuthState::disabled());
    (backend, app)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

fn send_json(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.expect("response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).expect("json parse")
    };
    (status, json)
}

#[test]
fn api_error_codes_map_to_statuses() {
    let cases = [
        ("validation_error", StatusCode::BAD_REQUEST),
        ("quota_exceeded", StatusCode::PAYMENT_REQUIRED),
        ("conflict", StatusCode::CONFLICT),
        ("unauthorized", StatusCode::UNAUTHORIZED),
        ("not_found", StatusCode::NOT_FOUND),
        ("upstream_unavailable", StatusCode::BAD_GATEWAY),
        ("internal_error", StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (code, status) in cases {
        let response = ApiError::new("req-1", code, "x").into_response();
        assert_eq!(response.status(), status, "code {code}");
    }
}

#[tokio::test]
async fn health_is_public_and_echoes_request_id() {
    let backend = Arc::new(InMemoryBackend::new());
    let auth = AuthState::from_keys("secret", false).expect("auth");
    let app = app_with(backend, auth);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/health")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "req-42");
}

#[tokio::test]
async fn protected_routes_require_bearer_token() {
    let backend = Arc::new(InMemoryBackend::new());
    let auth = AuthState::from_keys("secret", false).expect("auth");
    let app = app_with(backend, auth);

    let (status, body) = call(&app, get("/api/v1/providers")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");

    let authed = Request::builder()
        .uri("/api/v1/providers")
        .header("authorization", "Bearer secret")
        .body(Body::empty())
        .expect("request");
    let (status, _) = call(&app, authed).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn provider_catalog_lists_providers_and_presets() {
    let (_, app) = open_app();
    let (status, body) = call(&app, get("/api/v1/providers")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["providers"].as_array().unwrap().len(), 10);
    assert_eq!(body["data"]["providers"][0]["id"], "chatgpt");
    assert_eq!(body["data"]["presets"][2]["id"], "full_coverage");
    assert_eq!(body["data"]["presets"][2]["requiresPro"], true);
    assert!(body["meta"]["request_id"].is_string());
}

#[tokio::test]
async fn recommendation_adds_pro_provider() {
    let (_, app) = open_app();
    let (status, body) = call(
        &app,
        get("/api/v1/providers/recommend?intent=comparison&tier=pro"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"]["providers"],
        json!(["perplexity", "gemini", "chatgpt", "grok"])
    );

    let (status, body) = call(&app, get("/api/v1/providers/recommend?intent=vibes")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");
}

#[tokio::test]
async fn full_coverage_preset_is_gated_by_tier() {
    let (_, app) = open_app();
    let (status, body) = call(
        &app,
        send_json(
            "POST",
            "/api/v1/providers/preset",
            &json!({"preset": "full-coverage", "tier": "free"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"]["code"], "quota_exceeded");

    let (status, body) = call(
        &app,
        send_json(
            "POST",
            "/api/v1/providers/preset",
            &json!({"preset": "full_coverage", "tier": "agency"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["providers"].as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn confidence_endpoints_score_inputs() {
    let (_, app) = open_app();

    let (_, body) = call(
        &app,
        send_json(
            "POST",
            "/api/v1/confidence/coverage",
            &json!({"checks": 30, "distinctProviders": 4, "distinctQueries": 5}),
        ),
    )
    .await;
    assert_eq!(body["data"]["label"], "High");
    assert_eq!(body["data"]["variant"], "default");

    let (_, body) = call(
        &app,
        send_json("POST", "/api/v1/confidence/pages", &json!({"pagesSampled": 74})),
    )
    .await;
    assert_eq!(body["data"]["label"], "Medium");

    let (_, body) = call(
        &app,
        send_json(
            "POST",
            "/api/v1/confidence/recommendation",
            &json!({"severity": "critical", "scoreImpact": 12, "affectedPages": 8, "totalPages": 10}),
        ),
    )
    .await;
    assert_eq!(body["data"]["points"], 8);
    assert_eq!(body["data"]["label"], "High");
}

#[tokio::test]
async fn schedule_lifecycle_over_http() {
    let (_, app) = open_app();

    let (status, created) = call(
        &app,
        send_json(
            "POST",
            "/api/v1/projects/p1/schedules",
            &json!({"query": "best crm", "providers": ["claude", "grok"], "frequency": "daily"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["data"]["id"].as_str().expect("id").to_string();
    assert_eq!(created["data"]["frequency"], "daily");
    assert_eq!(created["data"]["enabled"], true);

    let (_, listed) = call(&app, get("/api/v1/projects/p1/schedules")).await;
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);

    let (_, toggled) = call(&app, post(&format!("/api/v1/schedules/{id}/toggle"))).await;
    assert_eq!(toggled["data"]["enabled"], false);
    assert_eq!(toggled["data"]["nextRunAt"], created["data"]["nextRunAt"]);

    let (status, _) = call(
        &app,
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/v1/schedules/{id}"))
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, post(&format!("/api/v1/schedules/{id}/toggle"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn schedule_with_unknown_provider_is_rejected() {
    let (_, app) = open_app();
    let (status, _) = call(
        &app,
        send_json(
            "POST",
            "/api/v1/projects/p1/schedules",
            &json!({"query": "best crm", "providers": ["bard"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn run_checks_materializes_and_refreshes_history() {
    let (backend, app) = open_app();
    backend.set_mentioning([aivis_core::Provider::Claude]);

    let (status, body) = call(
        &app,
        send_json(
            "POST",
            "/api/v1/projects/p1/checks",
            &json!({
                "selection": ["kw-1", "persona:p1:best crm software"],
                "providers": ["chatgpt", "claude"]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["checks"].as_array().unwrap().len(), 4);
    assert_eq!(body["data"]["history"]["totalChecks"], 4);
    assert_eq!(body["data"]["history"]["mentionRate"], 0.5);

    let (status, history) = call(&app, get("/api/v1/projects/p1/history")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["data"]["summary"]["distinctQueries"], 2);
}

#[tokio::test]
async fn regional_run_on_free_tier_is_quota_error() {
    let (backend, app) = open_app();
    let (status, body) = call(
        &app,
        send_json(
            "POST",
            "/api/v1/projects/p1/checks",
            &json!({
                "selection": ["kw-1"],
                "providers": ["chatgpt"],
                "region": {"region": "de", "language": "de"}
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"]["code"], "quota_exceeded");
    assert_eq!(backend.run_check_calls(), 0);
}

#[tokio::test]
async fn backend_outage_is_bad_gateway() {
    let (backend, app) = open_app();
    backend.fail_next_run_check(PortError::Transient("connection refused".to_string()));
    let (status, body) = call(
        &app,
        send_json(
            "POST",
            "/api/v1/projects/p1/checks",
            &json!({"selection": ["kw-1"], "providers": ["chatgpt"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "upstream_unavailable");
}

#[tokio::test]
async fn history_requires_region_and_language_together() {
    let (_, app) = open_app();
    let (status, _) = call(&app, get("/api/v1/projects/p1/history?region=de")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn suggestion_follows_first_run_until_dismissed() {
    let (_, app) = open_app();

    let (_, before) = call(&app, get("/api/v1/projects/p1/schedules/suggestion")).await;
    assert!(before["data"].is_null());

    call(
        &app,
        send_json(
            "POST",
            "/api/v1/projects/p1/checks",
            &json!({"selection": ["kw-1"], "providers": ["claude", "chatgpt"]}),
        ),
    )
    .await;

    let (_, suggested) = call(&app, get("/api/v1/projects/p1/schedules/suggestion")).await;
    assert_eq!(suggested["data"]["query"], "crm for startups");
    assert_eq!(suggested["data"]["frequency"], "weekly");
    assert_eq!(suggested["data"]["providers"], json!(["chatgpt", "claude"]));

    let (status, _) = call(
        &app,
        post("/api/v1/projects/p1/schedules/suggestion/dismiss"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, after) = call(&app, get("/api/v1/projects/p1/schedules/suggestion")).await;
    assert!(after["data"].is_null());
}

#[tokio::test]
async fn accepting_suggestion_creates_weekly_schedule() {
    let (_, app) = open_app();

    let (status, _) = call(&app, post("/api/v1/projects/p1/schedules/suggestion/accept")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    call(
        &app,
        send_json(
            "POST",
            "/api/v1/projects/p1/checks",
            &json!({"selection": ["kw-1"], "providers": ["gemini"]}),
        ),
    )
    .await;

    let (status, created) =
        call(&app, post("/api/v1/projects/p1/schedules/suggestion/accept")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["data"]["query"], "crm for startups");
    assert_eq!(created["data"]["frequency"], "weekly");

    let (_, after) = call(&app, get("/api/v1/projects/p1/schedules/suggestion")).await;
    assert!(after["data"].is_null());
}

#[tokio::test]
async fn running_a_fresh_schedule_reports_not_due() {
    let (backend, app) = open_app();
    let (_, created) = call(
        &app,
        send_json(
            "POST",
            "/api/v1/projects/p1/schedules",
            &json!({"query": "best crm", "providers": ["claude"]}),
        ),
    )
    .await;
    let id = created["data"]["id"].as_str().expect("id").to_string();

    let (status, body) = call(&app, post(&format!("/api/v1/schedules/{id}/run"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "not_due");
    assert_eq!(body["data"]["nextRunAt"], created["data"]["nextRunAt"]);
    assert_eq!(backend.run_check_calls(), 0);
}

#[tokio::test]
async fn confidence_with_missing_or_negative_counts_is_low() {
    let (_, app) = open_app();

    let cases = [
        ("/api/v1/confidence/pages", json!({})),
        ("/api/v1/confidence/pages", json!({"pagesSampled": -5})),
        ("/api/v1/confidence/coverage", json!({})),
        (
            "/api/v1/confidence/coverage",
            json!({"checks": -1, "distinctProviders": 4, "distinctQueries": 5}),
        ),
    ];
    for (uri, body) in cases {
        let (status, response) = call(&app, send_json("POST", uri, &body)).await;
        assert_eq!(status, StatusCode::OK, "{uri} {body}");
        assert_eq!(response["data"]["label"], "Low", "{uri} {body}");
        assert_eq!(response["data"]["variant"], "outline");
    }
}

#[test]
fn conflict_maps_to_409() {
    let response =
        map_engine_error("req-1", &aivis_engine::EngineError::Conflict("moved".into()))
            .into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
