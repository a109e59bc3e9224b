//! Confidence scoring.
//!
//! Every function here is pure and total: inputs that are missing, zero, or
//! negative degrade to a `Low` verdict instead of an error, because too little
//! data is an expected state.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::checks::VisibilityCheck;

pub const PAGES_HIGH: u64 = 75;
pub const PAGES_MEDIUM: u64 = 25;

pub const COVERAGE_HIGH_CHECKS: usize = 30;
pub const COVERAGE_HIGH_PROVIDERS: usize = 4;
pub const COVERAGE_HIGH_QUERIES: usize = 5;
pub const COVERAGE_MEDIUM_CHECKS: usize = 12;
pub const COVERAGE_MEDIUM_PROVIDERS: usize = 3;
pub const COVERAGE_MEDIUM_QUERIES: usize = 3;

pub const RECOMMENDATION_HIGH_POINTS: u32 = 5;
pub const RECOMMENDATION_MEDIUM_POINTS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

/// Presentation hint paired with each level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeVariant {
    Default,
    Secondary,
    Outline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfidenceBadge {
    pub label: ConfidenceLevel,
    pub variant: BadgeVariant,
}

impl From<ConfidenceLevel> for ConfidenceBadge {
    fn from(label: ConfidenceLevel) -> Self {
        let variant = match label {
            ConfidenceLevel::High => BadgeVariant::Default,
            ConfidenceLevel::Medium => BadgeVariant::Secondary,
            ConfidenceLevel::Low => BadgeVariant::Outline,
        };
        Self { label, variant }
    }
}

/// Confidence in an audit given how many pages were sampled.
#[must_use]
pub fn page_sample_confidence(pages_sampled: u64) -> ConfidenceBadge {
    let level = if pages_sampled >= PAGES_HIGH {
        ConfidenceLevel::High
    } else if pages_sampled >= PAGES_MEDIUM {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    };
    level.into()
}

/// Confidence in visibility results given sample volume and diversity.
///
/// Each tier requires all three minimums at once. Volume alone never lifts
/// the tier: fifty checks against one provider stay `Low`.
#[must_use]
pub fn coverage_confidence(
    checks: usize,
    distinct_providers: usize,
    distinct_queries: usize,
) -> ConfidenceBadge {
    let level = if checks >= COVERAGE_HIGH_CHECKS
        && distinct_providers >= COVERAGE_HIGH_PROVIDERS
        && distinct_queries >= COVERAGE_HIGH_QUERIES
    {
        ConfidenceLevel::High
    } else if checks >= COVERAGE_MEDIUM_CHECKS
        && distinct_providers >= COVERAGE_MEDIUM_PROVIDERS
        && distinct_queries >= COVERAGE_MEDIUM_QUERIES
    {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    };
    level.into()
}

/// Coverage confidence over a slice of history.
///
/// Providers are counted by their stored id and queries by their text.
#[must_use]
pub fn history_confidence(checks: &[VisibilityCheck]) -> ConfidenceBadge {
    let providers: HashSet<&str> = checks.iter().map(|c| c.llm_provider.as_str()).collect();
    let queries: HashSet<&str> = checks.iter().map(|c| c.query.as_str()).collect();
    coverage_confidence(checks.len(), providers.len(), queries.len())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    #[default]
    #[serde(other)]
    Info,
}

/// Attributes of an audit recommendation. Missing numbers count as zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationInput {
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub score_impact: Option<f64>,
    #[serde(default)]
    pub affected_pages: Option<i64>,
    #[serde(default)]
    pub total_pages: Option<i64>,
}

/// Raw points behind [`recommendation_confidence`], in `0..=8`.
#[must_use]
pub fn recommendation_points(input: &RecommendationInput) -> u32 {
    let score_impact = input
        .score_impact
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
        .max(0.0);
    let affected = input.affected_pages.unwrap_or(0).max(0);
    let total = input.total_pages.unwrap_or(0).max(0);

    let mut points = match input.severity {
        Severity::Critical => 2,
        Severity::Warning => 1,
        Severity::Info => 0,
    };

    if score_impact >= 12.0 {
        points += 2;
    } else if score_impact >= 6.0 {
        points += 1;
    }

    if affected >= 8 {
        points += 2;
    } else if affected >= 3 {
        points += 1;
    }

    #[allow(clippy::cast_precision_loss)]
    let ratio = if total == 0 {
        0.0
    } else {
        affected as f64 / total as f64
    };
    if ratio >= 0.3 {
        points += 1;
    }
    if ratio >= 0.6 {
        points += 1;
    }

    points
}

#[must_use]
pub fn recommendation_confidence(input: &RecommendationInput) -> ConfidenceBadge {
    let points = recommendation_points(input);
    let level = if points >= RECOMMENDATION_HIGH_POINTS {
        ConfidenceLevel::High
    } else if points >= RECOMMENDATION_MEDIUM_POINTS {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    };
    level.into()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn level(badge: ConfidenceBadge) -> ConfidenceLevel {
        badge.label
    }

    #[test]
    fn page_sample_boundaries() {
        assert_eq!(level(page_sample_confidence(0)), ConfidenceLevel::Low);
        assert_eq!(level(page_sample_confidence(24)), ConfidenceLevel::Low);
        assert_eq!(level(page_sample_confidence(25)), ConfidenceLevel::Medium);
        assert_eq!(level(page_sample_confidence(74)), ConfidenceLevel::Medium);
        assert_eq!(level(page_sample_confidence(75)), ConfidenceLevel::High);
    }

    #[test]
    fn page_sample_is_monotonic() {
        let mut previous = ConfidenceLevel::Low;
        for pages in 0..200 {
            let current = level(page_sample_confidence(pages));
            assert!(current >= previous, "dropped at {pages}");
            previous = current;
        }
    }

    #[test]
    fn coverage_high_at_minimums() {
        assert_eq!(level(coverage_confidence(30, 4, 5)), ConfidenceLevel::High);
        assert_eq!(level(coverage_confidence(500, 10, 40)), ConfidenceLevel::High);
    }

    #[test]
    fn coverage_one_check_short_is_medium() {
        assert_eq!(level(coverage_confidence(29, 10, 10)), ConfidenceLevel::Medium);
    }

    #[test]
    fn coverage_volume_without_diversity_stays_low() {
        assert_eq!(level(coverage_confidence(50, 1, 1)), ConfidenceLevel::Low);
        assert_eq!(level(coverage_confidence(50, 2, 10)), ConfidenceLevel::Low);
    }

    #[test]
    fn coverage_partial_high_falls_to_medium() {
        assert_eq!(level(coverage_confidence(40, 3, 10)), ConfidenceLevel::Medium);
        assert_eq!(level(coverage_confidence(40, 10, 4)), ConfidenceLevel::Medium);
    }

    #[test]
    fn coverage_medium_boundaries() {
        assert_eq!(level(coverage_confidence(12, 3, 3)), ConfidenceLevel::Medium);
        assert_eq!(level(coverage_confidence(11, 3, 3)), ConfidenceLevel::Low);
        assert_eq!(level(coverage_confidence(0, 0, 0)), ConfidenceLevel::Low);
    }

    #[test]
    fn badge_variants_follow_level() {
        assert_eq!(coverage_confidence(30, 4, 5).variant, BadgeVariant::Default);
        assert_eq!(coverage_confidence(12, 3, 3).variant, BadgeVariant::Secondary);
        assert_eq!(coverage_confidence(0, 0, 0).variant, BadgeVariant::Outline);
    }

    #[test]
    fn recommendation_full_marks() {
        let input = RecommendationInput {
            severity: Severity::Critical,
            score_impact: Some(12.0),
            affected_pages: Some(8),
            total_pages: Some(10),
        };
        assert_eq!(recommendation_points(&input), 8);
        assert_eq!(level(recommendation_confidence(&input)), ConfidenceLevel::High);
    }

    #[test]
    fn recommendation_ratio_thresholds_both_fire() {
        let input = RecommendationInput {
            affected_pages: Some(6),
            total_pages: Some(10),
            ..RecommendationInput::default()
        };
        // affected 6 -> +1, ratio 0.6 -> +2
        assert_eq!(recommendation_points(&input), 3);
    }

    #[test]
    fn recommendation_zero_total_pages_does_not_divide() {
        let input = RecommendationInput {
            severity: Severity::Warning,
            affected_pages: Some(3),
            total_pages: Some(0),
            ..RecommendationInput::default()
        };
        assert_eq!(recommendation_points(&input), 2);
        assert_eq!(level(recommendation_confidence(&input)), ConfidenceLevel::Medium);
    }

    #[test]
    fn recommendation_negative_inputs_clamp_to_zero() {
        let input = RecommendationInput {
            severity: Severity::Info,
            score_impact: Some(-40.0),
            affected_pages: Some(-5),
            total_pages: Some(-10),
        };
        assert_eq!(recommendation_points(&input), 0);
        assert_eq!(level(recommendation_confidence(&input)), ConfidenceLevel::Low);
    }

    #[test]
    fn recommendation_missing_inputs_are_low() {
        let input = RecommendationInput::default();
        assert_eq!(recommendation_points(&input), 0);
        let nan = RecommendationInput {
            score_impact: Some(f64::NAN),
            ..RecommendationInput::default()
        };
        assert_eq!(recommendation_points(&nan), 0);
    }

    #[test]
    fn unknown_severity_decodes_as_info() {
        let input: RecommendationInput =
            serde_json::from_str(r#"{"severity":"notice","scoreImpact":6}"#).unwrap();
        assert_eq!(input.severity, Severity::Info);
        assert_eq!(recommendation_points(&input), 1);
    }

    #[test]
    fn history_confidence_counts_distinct_providers_and_queries() {
        let providers = ["chatgpt", "claude", "perplexity", "gemini"];
        let mut checks = Vec::new();
        for (i, provider) in providers.iter().cycle().take(30).enumerate() {
            checks.push(VisibilityCheck {
                id: format!("c{i}"),
                project_id: "p1".to_string(),
                query: format!("query {}", i % 5),
                llm_provider: (*provider).to_string(),
                checked_at: Utc::now(),
                brand_mentioned: i % 2 == 0,
                url_cited: false,
                citation_position: None,
                response_text: None,
                competitor_mentions: Vec::new(),
            });
        }
        assert_eq!(level(history_confidence(&checks)), ConfidenceLevel::High);
        assert_eq!(level(history_confidence(&checks[..29])), ConfidenceLevel::Medium);
        assert_eq!(level(history_confidence(&[])), ConfidenceLevel::Low);
    }

    #[test]
    fn badge_is_deterministic() {
        let a = coverage_confidence(20, 3, 4);
        let b = coverage_confidence(20, 3, 4);
        assert_eq!(a, b);
    }
}
