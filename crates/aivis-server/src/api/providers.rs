//! Provider catalog, intent recommendations and preset application.

use aivis_core::{Intent, Preset, Provider, ProviderSelection, Tier};
use axum::{extract::Query, Extension, Json};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_core_error, ApiError, ApiResponse};

#[derive(Debug, Serialize)]
pub(super) struct ProviderItem {
    id: Provider,
    label: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PresetItem {
    id: Preset,
    label: &'static str,
    providers: Vec<Provider>,
    requires_pro: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct ProviderCatalog {
    providers: Vec<ProviderItem>,
    presets: Vec<PresetItem>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RecommendQuery {
    intent: String,
    tier: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct Recommendation {
    intent: Intent,
    tier: Tier,
    providers: Vec<Provider>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ApplyPresetRequest {
    preset: String,
    #[serde(default)]
    tier: Option<Tier>,
}

#[derive(Debug, Serialize)]
pub(super) struct SelectionResponse {
    preset: Preset,
    providers: Vec<Provider>,
}

/// GET /api/v1/providers
pub(super) async fn list_providers(
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<ProviderCatalog>> {
    let providers = Provider::ALL
        .iter()
        .map(|p| ProviderItem {
            id: *p,
            label: p.label(),
        })
        .collect();
    let presets = Preset::ALL
        .iter()
        .map(|p| PresetItem {
            id: *p,
            label: p.label(),
            providers: p.providers(),
            requires_pro: p.requires_pro(),
        })
        .collect();
    ApiResponse::new(&req_id, ProviderCatalog { providers, presets })
}

/// GET /api/v1/providers/recommend?intent=...&tier=...
pub(super) async fn recommend(
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<RecommendQuery>,
) -> Result<Json<ApiResponse<Recommendation>>, ApiError> {
    let rid = &req_id.0;
    let intent: Intent = query.intent.parse().map_err(|e| map_core_error(rid, e))?;
    let tier: Tier = match query.tier.as_deref() {
        Some(raw) => raw.parse().map_err(|e| map_core_error(rid, e))?,
        None => Tier::Free,
    };

    let mut selection = ProviderSelection::default();
    selection.apply_recommendation(intent, tier);
    Ok(ApiResponse::new(
        &req_id,
        Recommendation {
            intent,
            tier,
            providers: selection.providers().to_vec(),
        },
    ))
}

/// POST /api/v1/providers/preset
pub(super) async fn apply_preset(
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<ApplyPresetRequest>,
) -> Result<Json<ApiResponse<SelectionResponse>>, ApiError> {
    let rid = &req_id.0;
    let preset: Preset = body.preset.parse().map_err(|e| map_core_error(rid, e))?;

    let mut selection = ProviderSelection::default();
    selection
        .apply_preset(preset, body.tier.unwrap_or(Tier::Free))
        .map_err(|e| map_core_error(rid, e))?;

    Ok(ApiResponse::new(
        &req_id,
        SelectionResponse {
            preset,
            providers: selection.providers().to_vec(),
        },
    ))
}
