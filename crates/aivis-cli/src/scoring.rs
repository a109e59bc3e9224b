//! Offline commands: confidence scoring and provider selection.
//!
//! Nothing here touches the backend, so these work without any config.

use aivis_core::{
    coverage_confidence, page_sample_confidence, recommendation_confidence,
    recommendation_points, ConfidenceBadge, Intent, Preset, Provider, ProviderSelection,
    RecommendationInput, Tier,
};

pub(crate) fn badge_line(badge: ConfidenceBadge) -> String {
    format!("{:?} ({:?})", badge.label, badge.variant).to_lowercase()
}

pub(crate) fn provider_ids(providers: &[Provider]) -> String {
    providers
        .iter()
        .map(|p| p.id())
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn print_pages(pages: u64) {
    println!("pages sampled: {pages}");
    println!("confidence:    {}", badge_line(page_sample_confidence(pages)));
}

pub(crate) fn print_coverage(checks: usize, providers: usize, queries: usize) {
    println!("checks: {checks}  providers: {providers}  queries: {queries}");
    println!(
        "confidence: {}",
        badge_line(coverage_confidence(checks, providers, queries))
    );
}

pub(crate) fn print_recommendation(input: &RecommendationInput) {
    println!("points:     {}", recommendation_points(input));
    println!("confidence: {}", badge_line(recommendation_confidence(input)));
}

pub(crate) fn print_catalog() {
    println!("{:<20}LABEL", "PROVIDER");
    for provider in Provider::ALL {
        println!("{:<20}{}", provider.id(), provider.label());
    }
    println!();
    println!("{:<18}{:<10}PROVIDERS", "PRESET", "PLAN");
    for preset in Preset::ALL {
        let plan = if preset.requires_pro() { "pro+" } else { "any" };
        println!(
            "{:<18}{:<10}{}",
            preset.id(),
            plan,
            provider_ids(&preset.providers())
        );
    }
}

pub(crate) fn print_recommendation_for(intent: Intent, tier: Tier) {
    let mut selection = ProviderSelection::default();
    selection.apply_recommendation(intent, tier);
    println!("{}", provider_ids(selection.providers()));
}

/// Prints the preset's providers, or fails when the tier does not include it.
///
/// # Errors
///
/// Returns an error if the preset requires a higher plan than `tier`.
pub(crate) fn print_preset(preset: Preset, tier: Tier) -> anyhow::Result<()> {
    let mut selection = ProviderSelection::default();
    selection.apply_preset(preset, tier)?;
    println!("{}", provider_ids(selection.providers()));
    Ok(())
}
