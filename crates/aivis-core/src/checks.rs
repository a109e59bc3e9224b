//! Visibility check history records and the collaborator-owned inputs that
//! accompany them (keywords, competitors, region filters).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::providers::Provider;

/// Immutable result of one (query, provider) test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityCheck {
    pub id: String,
    pub project_id: String,
    pub query: String,
    /// Raw provider id as stored. May name a provider that has since been
    /// retired from the catalog; see [`VisibilityCheck::provider`].
    pub llm_provider: String,
    pub checked_at: DateTime<Utc>,
    pub brand_mentioned: bool,
    pub url_cited: bool,
    #[serde(default)]
    pub citation_position: Option<u32>,
    #[serde(default)]
    pub response_text: Option<String>,
    #[serde(default)]
    pub competitor_mentions: Vec<CompetitorMention>,
}

impl VisibilityCheck {
    /// The catalog provider this check ran against, if it is still known.
    #[must_use]
    pub fn provider(&self) -> Option<Provider> {
        Provider::from_id(&self.llm_provider)
    }
}

/// Whether a competitor domain appeared in an answer.
///
/// A position is carried exactly when the competitor was mentioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCompetitorMention", into = "RawCompetitorMention")]
pub enum CompetitorMention {
    Mentioned { domain: String, position: u32 },
    NotMentioned { domain: String },
}

impl CompetitorMention {
    #[must_use]
    pub fn domain(&self) -> &str {
        match self {
            CompetitorMention::Mentioned { domain, .. }
            | CompetitorMention::NotMentioned { domain } => domain,
        }
    }

    #[must_use]
    pub fn is_mentioned(&self) -> bool {
        matches!(self, CompetitorMention::Mentioned { .. })
    }

    #[must_use]
    pub fn position(&self) -> Option<u32> {
        match self {
            CompetitorMention::Mentioned { position, .. } => Some(*position),
            CompetitorMention::NotMentioned { .. } => None,
        }
    }
}

/// Wire shape: `{domain, mentioned, position}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawCompetitorMention {
    domain: String,
    mentioned: bool,
    #[serde(default)]
    position: Option<u32>,
}

impl TryFrom<RawCompetitorMention> for CompetitorMention {
    type Error = String;

    fn try_from(raw: RawCompetitorMention) -> Result<Self, Self::Error> {
        match (raw.mentioned, raw.position) {
            (true, Some(position)) => Ok(CompetitorMention::Mentioned {
                domain: raw.domain,
                position,
            }),
            (false, None) => Ok(CompetitorMention::NotMentioned { domain: raw.domain }),
            (true, None) => Err(format!(
                "competitor mention for '{}' is marked mentioned but has no position",
                raw.domain
            )),
            (false, Some(_)) => Err(format!(
                "competitor mention for '{}' has a position but is not mentioned",
                raw.domain
            )),
        }
    }
}

impl From<CompetitorMention> for RawCompetitorMention {
    fn from(m: CompetitorMention) -> Self {
        match m {
            CompetitorMention::Mentioned { domain, position } => Self {
                domain,
                mentioned: true,
                position: Some(position),
            },
            CompetitorMention::NotMentioned { domain } => Self {
                domain,
                mentioned: false,
                position: None,
            },
        }
    }
}

/// A persisted keyword as returned by the batch-create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Competitor {
    pub id: String,
    pub domain: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Region and language applied identically to every check in one batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionFilter {
    pub region: String,
    pub language: String,
}
