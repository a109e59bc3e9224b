//! Provider registry, subscription tiers, presets, and intent recommendations.
//!
//! The provider catalog is closed: every id the engine accepts is a variant of
//! [`Provider`]. Input containing an unknown id is rejected with
//! [`CoreError::UnknownProvider`]; stored data is passed through
//! [`filter_known`] instead so that deprecated providers drop out quietly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Chatgpt,
    Claude,
    Perplexity,
    Gemini,
    GeminiAiMode,
    GoogleAiOverview,
    Copilot,
    Grok,
    Deepseek,
    MetaAi,
}

impl Provider {
    /// Catalog order. Full-Coverage and listings follow this order.
    pub const ALL: [Provider; 10] = [
        Provider::Chatgpt,
        Provider::Claude,
        Provider::Perplexity,
        Provider::Gemini,
        Provider::GeminiAiMode,
        Provider::GoogleAiOverview,
        Provider::Copilot,
        Provider::Grok,
        Provider::Deepseek,
        Provider::MetaAi,
    ];

    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Provider::Chatgpt => "chatgpt",
            Provider::Claude => "claude",
            Provider::Perplexity => "perplexity",
            Provider::Gemini => "gemini",
            Provider::GeminiAiMode => "gemini_ai_mode",
            Provider::GoogleAiOverview => "google_ai_overview",
            Provider::Copilot => "copilot",
            Provider::Grok => "grok",
            Provider::Deepseek => "deepseek",
            Provider::MetaAi => "meta_ai",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Provider::Chatgpt => "ChatGPT",
            Provider::Claude => "Claude",
            Provider::Perplexity => "Perplexity",
            Provider::Gemini => "Gemini",
            Provider::GeminiAiMode => "Google AI Mode",
            Provider::GoogleAiOverview => "Google AI Overviews",
            Provider::Copilot => "Microsoft Copilot",
            Provider::Grok => "Grok",
            Provider::Deepseek => "DeepSeek",
            Provider::MetaAi => "Meta AI",
        }
    }

    /// Looks up a provider by its stable id. Returns `None` for unknown ids.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.id() == id)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Provider {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_id(s.trim()).ok_or_else(|| CoreError::UnknownProvider(s.to_string()))
    }
}

/// Parses caller-supplied provider ids, rejecting the first unknown id.
///
/// Duplicates are dropped; first-seen order is kept.
///
/// # Errors
///
/// Returns [`CoreError::UnknownProvider`] if any id is outside the catalog.
pub fn parse_providers<I, S>(ids: I) -> Result<Vec<Provider>, CoreError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = Vec::new();
    for id in ids {
        let provider = id.as_ref().parse::<Provider>()?;
        if !out.contains(&provider) {
            out.push(provider);
        }
    }
    Ok(out)
}

/// Keeps only ids that name a catalog provider. Used for stored data, where a
/// provider may have been retired since the record was written.
#[must_use]
pub fn filter_known<I, S>(ids: I) -> Vec<Provider>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = Vec::new();
    for provider in ids.into_iter().filter_map(|id| Provider::from_id(id.as_ref())) {
        if !out.contains(&provider) {
            out.push(provider);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Starter,
    Pro,
    Agency,
}

impl Tier {
    #[must_use]
    pub fn is_pro_or_above(self) -> bool {
        self >= Tier::Pro
    }
}

impl FromStr for Tier {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Tier::Free),
            "starter" => Ok(Tier::Starter),
            "pro" => Ok(Tier::Pro),
            "agency" => Ok(Tier::Agency),
            _ => Err(CoreError::UnknownTier(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Intent recommendations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Discovery,
    Comparison,
    Transactional,
}

impl FromStr for Intent {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discovery" => Ok(Intent::Discovery),
            "comparison" => Ok(Intent::Comparison),
            "transactional" => Ok(Intent::Transactional),
            _ => Err(CoreError::UnknownIntent(s.to_string())),
        }
    }
}

/// Returns the ordered provider recommendation for a search intent.
///
/// Pro and above get one extra provider appended to the base list.
#[must_use]
pub fn recommend_providers(intent: Intent, is_pro_or_above: bool) -> Vec<Provider> {
    use Provider::{Chatgpt, Claude, Copilot, Gemini, GeminiAiMode, Grok, Perplexity};

    let (base, pro_extra): (&[Provider], Provider) = match intent {
        Intent::Discovery => (&[Chatgpt, Claude, Perplexity], GeminiAiMode),
        Intent::Comparison => (&[Perplexity, Gemini, Chatgpt], Grok),
        Intent::Transactional => (&[Chatgpt, Gemini, Copilot], GeminiAiMode),
    };

    let mut providers = base.to_vec();
    if is_pro_or_above {
        providers.push(pro_extra);
    }
    providers
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Balanced,
    AiSearchFocus,
    FullCoverage,
}

impl Preset {
    pub const ALL: [Preset; 3] = [Preset::Balanced, Preset::AiSearchFocus, Preset::FullCoverage];

    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Preset::Balanced => "balanced",
            Preset::AiSearchFocus => "ai_search_focus",
            Preset::FullCoverage => "full_coverage",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Preset::Balanced => "Balanced",
            Preset::AiSearchFocus => "AI-Search Focus",
            Preset::FullCoverage => "Full Coverage",
        }
    }

    #[must_use]
    pub fn providers(self) -> Vec<Provider> {
        match self {
            Preset::Balanced => vec![
                Provider::Chatgpt,
                Provider::Claude,
                Provider::Perplexity,
                Provider::Gemini,
            ],
            Preset::AiSearchFocus => vec![
                Provider::Perplexity,
                Provider::GeminiAiMode,
                Provider::GoogleAiOverview,
                Provider::Copilot,
            ],
            Preset::FullCoverage => Provider::ALL.to_vec(),
        }
    }

    #[must_use]
    pub const fn requires_pro(self) -> bool {
        matches!(self, Preset::FullCoverage)
    }
}

impl FromStr for Preset {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "balanced" => Ok(Preset::Balanced),
            "ai_search_focus" | "ai_search" => Ok(Preset::AiSearchFocus),
            "full_coverage" | "full" => Ok(Preset::FullCoverage),
            _ => Err(CoreError::UnknownPreset(s.to_string())),
        }
    }
}

/// A caller's current provider selection.
///
/// Presets and recommendations replace the selection wholesale; they never
/// merge into it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSelection {
    providers: Vec<Provider>,
}

impl ProviderSelection {
    #[must_use]
    pub fn new(providers: impl IntoIterator<Item = Provider>) -> Self {
        let mut out: Vec<Provider> = Vec::new();
        for p in providers {
            if !out.contains(&p) {
                out.push(p);
            }
        }
        Self { providers: out }
    }

    #[must_use]
    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Replaces the selection with a preset's providers.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TierTooLow`] when the preset needs pro and `tier`
    /// is below it. The selection is left untouched in that case.
    pub fn apply_preset(&mut self, preset: Preset, tier: Tier) -> Result<(), CoreError> {
        if preset.requires_pro() && !tier.is_pro_or_above() {
            return Err(CoreError::TierTooLow {
                feature: "full coverage preset",
            });
        }
        self.providers = preset.providers();
        Ok(())
    }

    /// Replaces the selection with the intent recommendation for `tier`.
    pub fn apply_recommendation(&mut self, intent: Intent, tier: Tier) {
        self.providers = recommend_providers(intent, tier.is_pro_or_above());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(providers: &[Provider]) -> Vec<&'static str> {
        providers.iter().map(|p| p.id()).collect()
    }

    #[test]
    fn every_catalog_id_round_trips_through_from_id() {
        for p in Provider::ALL {
            assert_eq!(Provider::from_id(p.id()), Some(p));
        }
    }

    #[test]
    fn serde_ids_match_catalog_ids() {
        for p in Provider::ALL {
            let json = serde_json::to_string(&p).unwrap();
            assert_eq!(json, format!("\"{}\"", p.id()));
        }
    }

    #[test]
    fn unknown_provider_is_rejected_on_parse() {
        let err = "bard".parse::<Provider>().unwrap_err();
        assert_eq!(err, CoreError::UnknownProvider("bard".to_string()));
    }

    #[test]
    fn parse_providers_fails_on_any_unknown_id() {
        let err = parse_providers(["chatgpt", "bard"]).unwrap_err();
        assert!(matches!(err, CoreError::UnknownProvider(ref id) if id == "bard"));
    }

    #[test]
    fn parse_providers_dedups() {
        let parsed = parse_providers(["claude", "chatgpt", "claude"]).unwrap();
        assert_eq!(ids(&parsed), vec!["claude", "chatgpt"]);
    }

    #[test]
    fn filter_known_drops_retired_ids_silently() {
        let kept = filter_known(["chatgpt", "bard", "grok", "chatgpt"]);
        assert_eq!(ids(&kept), vec!["chatgpt", "grok"]);
    }

    #[test]
    fn discovery_recommendations() {
        assert_eq!(
            ids(&recommend_providers(Intent::Discovery, false)),
            vec!["chatgpt", "claude", "perplexity"]
        );
        assert_eq!(
            ids(&recommend_providers(Intent::Discovery, true)),
            vec!["chatgpt", "claude", "perplexity", "gemini_ai_mode"]
        );
    }

    #[test]
    fn comparison_recommendations() {
        assert_eq!(
            ids(&recommend_providers(Intent::Comparison, false)),
            vec!["perplexity", "gemini", "chatgpt"]
        );
        assert_eq!(
            ids(&recommend_providers(Intent::Comparison, true)),
            vec!["perplexity", "gemini", "chatgpt", "grok"]
        );
    }

    #[test]
    fn transactional_recommendations() {
        assert_eq!(
            ids(&recommend_providers(Intent::Transactional, false)),
            vec!["chatgpt", "gemini", "copilot"]
        );
        assert_eq!(
            ids(&recommend_providers(Intent::Transactional, true)),
            vec!["chatgpt", "gemini", "copilot", "gemini_ai_mode"]
        );
    }

    #[test]
    fn tier_ordering_gates_pro() {
        assert!(!Tier::Free.is_pro_or_above());
        assert!(!Tier::Starter.is_pro_or_above());
        assert!(Tier::Pro.is_pro_or_above());
        assert!(Tier::Agency.is_pro_or_above());
    }

    #[test]
    fn full_coverage_rejected_below_pro_and_selection_unchanged() {
        let mut selection = ProviderSelection::new([Provider::Claude]);
        let before = selection.clone();
        let err = selection
            .apply_preset(Preset::FullCoverage, Tier::Free)
            .unwrap_err();
        assert!(matches!(err, CoreError::TierTooLow { .. }));
        assert_eq!(selection, before);
    }

    #[test]
    fn full_coverage_applies_for_pro() {
        let mut selection = ProviderSelection::default();
        selection
            .apply_preset(Preset::FullCoverage, Tier::Pro)
            .unwrap();
        assert_eq!(selection.providers(), Provider::ALL.as_slice());
    }

    #[test]
    fn preset_replaces_rather_than_merges() {
        let mut selection = ProviderSelection::new([Provider::Grok, Provider::Deepseek]);
        selection.apply_preset(Preset::Balanced, Tier::Free).unwrap();
        assert_eq!(
            ids(selection.providers()),
            vec!["chatgpt", "claude", "perplexity", "gemini"]
        );
    }

    #[test]
    fn recommendation_replaces_selection() {
        let mut selection = ProviderSelection::new([Provider::MetaAi]);
        selection.apply_recommendation(Intent::Comparison, Tier::Agency);
        assert_eq!(
            ids(selection.providers()),
            vec!["perplexity", "gemini", "chatgpt", "grok"]
        );
    }

    #[test]
    fn preset_names_parse_in_kebab_and_snake_case() {
        assert_eq!("ai-search-focus".parse::<Preset>().unwrap(), Preset::AiSearchFocus);
        assert_eq!("full_coverage".parse::<Preset>().unwrap(), Preset::FullCoverage);
        assert!("everything".parse::<Preset>().is_err());
    }
}
