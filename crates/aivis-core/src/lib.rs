//! Domain types and pure scoring for the AI visibility engine.
//!
//! Holds the closed provider catalog with its presets and intent tables, the
//! confidence scoring functions, the check/schedule data model, and the
//! environment-driven application config shared by the binaries.

pub mod app_config;
pub mod checks;
pub mod confidence;
pub mod config;
pub mod providers;
pub mod schedules;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use checks::{Competitor, CompetitorMention, Keyword, RegionFilter, VisibilityCheck};
pub use confidence::{
    coverage_confidence, history_confidence, page_sample_confidence, recommendation_confidence,
    recommendation_points, BadgeVariant, ConfidenceBadge, ConfidenceLevel, RecommendationInput,
    Severity,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use providers::{
    filter_known, parse_providers, recommend_providers, Intent, Preset, Provider,
    ProviderSelection, Tier,
};
pub use schedules::{Frequency, ScheduleState, ScheduledQuery};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("unknown provider id: {0}")]
    UnknownProvider(String),

    #[error("unknown intent: {0}")]
    UnknownIntent(String),

    #[error("unknown preset: {0}")]
    UnknownPreset(String),

    #[error("unknown tier: {0}")]
    UnknownTier(String),

    #[error("unknown frequency: {0}")]
    UnknownFrequency(String),

    #[error("{feature} requires the pro tier or above")]
    TierTooLow { feature: &'static str },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
