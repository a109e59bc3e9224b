//! Derived views over a project's check history.
//!
//! Nothing here is stored: summaries are recomputed from the history slice on
//! every read, and always yield the same result for the same slice.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use aivis_core::{
    history_confidence, Competitor, ConfidenceBadge, RegionFilter, VisibilityCheck,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::EngineError;
use crate::ports::VisibilityBackend;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderBreakdown {
    pub provider: String,
    pub checks: usize,
    pub mentions: usize,
    pub citations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySummary {
    pub total_checks: usize,
    pub distinct_providers: usize,
    pub distinct_queries: usize,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub mention_rate: f64,
    pub citation_rate: f64,
    pub average_citation_position: Option<f64>,
    pub providers: Vec<ProviderBreakdown>,
    pub confidence: ConfidenceBadge,
}

#[must_use]
pub fn summarize(checks: &[VisibilityCheck]) -> HistorySummary {
    let mut by_provider: BTreeMap<&str, ProviderBreakdown> = BTreeMap::new();
    let mut queries: HashSet<&str> = HashSet::new();
    let mut mentions = 0usize;
    let mut citations = 0usize;
    let mut positions: Vec<u32> = Vec::new();

    for check in checks {
        queries.insert(check.query.as_str());
        let entry = by_provider
            .entry(check.llm_provider.as_str())
            .or_insert_with(|| ProviderBreakdown {
                provider: check.llm_provider.clone(),
                checks: 0,
                mentions: 0,
                citations: 0,
            });
        entry.checks += 1;
        if check.brand_mentioned {
            entry.mentions += 1;
            mentions += 1;
        }
        if check.url_cited {
            entry.citations += 1;
            citations += 1;
        }
        if let Some(pos) = check.citation_position {
            positions.push(pos);
        }
    }

    HistorySummary {
        total_checks: checks.len(),
        distinct_providers: by_provider.len(),
        distinct_queries: queries.len(),
        last_checked_at: checks.iter().map(|c| c.checked_at).max(),
        mention_rate: rate(mentions, checks.len()),
        citation_rate: rate(citations, checks.len()),
        average_citation_position: average(&positions),
        providers: by_provider.into_values().collect(),
        confidence: history_confidence(checks),
    }
}

#[allow(clippy::cast_precision_loss)]
fn rate(hits: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

fn average(values: &[u32]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sum: u64 = values.iter().map(|v| u64::from(*v)).sum();
    #[allow(clippy::cast_precision_loss)]
    Some(sum as f64 / values.len() as f64)
}

/// How often a competitor shows up in answers where the brand does not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitorGap {
    pub domain: String,
    /// Checks where the competitor was mentioned and the brand was not.
    pub competitor_only: usize,
    /// Checks where both were mentioned.
    pub shared: usize,
}

/// Gap analysis for each tracked competitor, widest gap first.
#[must_use]
pub fn competitor_gaps(checks: &[VisibilityCheck], competitors: &[Competitor]) -> Vec<CompetitorGap> {
    let mut gaps: HashMap<String, CompetitorGap> = competitors
        .iter()
        .map(|c| {
            let domain = normalize_domain(&c.domain);
            (
                domain.clone(),
                CompetitorGap {
                    domain,
                    competitor_only: 0,
                    shared: 0,
                },
            )
        })
        .collect();

    for check in checks {
        for mention in check.competitor_mentions.iter().filter(|m| m.is_mentioned()) {
            let Some(gap) = gaps.get_mut(&normalize_domain(mention.domain())) else {
                continue;
            };
            if check.brand_mentioned {
                gap.shared += 1;
            } else {
                gap.competitor_only += 1;
            }
        }
    }

    let mut out: Vec<CompetitorGap> = gaps.into_values().collect();
    out.sort_by(|a, b| {
        b.competitor_only
            .cmp(&a.competitor_only)
            .then_with(|| a.domain.cmp(&b.domain))
    });
    out
}

fn normalize_domain(domain: &str) -> String {
    let lower = domain.trim().to_ascii_lowercase();
    let without_scheme = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .unwrap_or(&lower);
    let host = without_scheme.split('/').next().unwrap_or(without_scheme);
    host.strip_prefix("www.").unwrap_or(host).to_string()
}

/// Re-reads history from the collaborator. Callers use this after every
/// run instead of appending locally, since scheduled runs may have landed in
/// between.
pub struct HistoryAggregator {
    backend: Arc<dyn VisibilityBackend>,
}

impl HistoryAggregator {
    #[must_use]
    pub fn new(backend: Arc<dyn VisibilityBackend>) -> Self {
        Self { backend }
    }

    /// # Errors
    ///
    /// Propagates the collaborator failure from `list_history`.
    pub async fn refresh(
        &self,
        project_id: &str,
        region: Option<&RegionFilter>,
    ) -> Result<HistorySummary, EngineError> {
        let checks = self.backend.list_history(project_id, region).await?;
        Ok(summarize(&checks))
    }

    /// # Errors
    ///
    /// Propagates the first collaborator failure from either read.
    pub async fn competitor_gaps(
        &self,
        project_id: &str,
        region: Option<&RegionFilter>,
    ) -> Result<Vec<CompetitorGap>, EngineError> {
        let (checks, competitors) = tokio::try_join!(
            self.backend.list_history(project_id, region),
            self.backend.list_competitors(project_id),
        )?;
        Ok(competitor_gaps(&checks, &competitors))
    }
}
