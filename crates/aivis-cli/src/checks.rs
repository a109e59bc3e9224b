use aivis_core::{parse_providers, RegionFilter, Tier, VisibilityCheck};
use aivis_engine::{CompetitorGap, Engine, HistorySummary};

use crate::scoring::badge_line;

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        format!("{}...", text.chars().take(max).collect::<String>())
    } else {
        text.to_string()
    }
}

pub(crate) fn fmt_rate(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

fn print_checks(checks: &[VisibilityCheck]) {
    println!(
        "{:<14}{:<11}{:<8}{:<6}QUERY",
        "PROVIDER", "MENTIONED", "CITED", "POS"
    );
    for check in checks {
        let position = check
            .citation_position
            .map_or_else(|| "\u{2014}".to_string(), |p| p.to_string());
        println!(
            "{:<14}{:<11}{:<8}{:<6}{}",
            check.llm_provider,
            yes_no(check.brand_mentioned),
            yes_no(check.url_cited),
            position,
            truncate(&check.query, 50),
        );
    }
}

fn print_summary(summary: &HistorySummary) {
    println!(
        "checks: {}  providers: {}  queries: {}",
        summary.total_checks, summary.distinct_providers, summary.distinct_queries
    );
    println!(
        "mention rate: {}  citation rate: {}",
        fmt_rate(summary.mention_rate),
        fmt_rate(summary.citation_rate)
    );
    if let Some(avg) = summary.average_citation_position {
        println!("average citation position: {avg:.1}");
    }
    println!("confidence: {}", badge_line(summary.confidence));

    if summary.providers.is_empty() {
        return;
    }
    println!();
    println!("{:<14}{:<8}{:<10}CITED", "PROVIDER", "CHECKS", "MENTIONS");
    for row in &summary.providers {
        println!(
            "{:<14}{:<8}{:<10}{}",
            row.provider, row.checks, row.mentions, row.citations
        );
    }
}

fn print_gaps(gaps: &[CompetitorGap]) {
    if gaps.is_empty() {
        return;
    }
    println!();
    println!("{:<30}{:<17}SHARED", "COMPETITOR", "COMPETITOR ONLY");
    for gap in gaps {
        println!("{:<30}{:<17}{}", gap.domain, gap.competitor_only, gap.shared);
    }
}

/// Runs one batch from keyword ids and persona tokens, then prints the new
/// checks followed by the refreshed project summary.
///
/// # Errors
///
/// Returns an error for unknown providers, an invalid selection, a plan that
/// lacks regional filtering, or any backend failure.
pub(crate) async fn run_checks(
    engine: &Engine,
    project: &str,
    queries: &[String],
    providers: &[String],
    region: Option<RegionFilter>,
    tier: Tier,
) -> anyhow::Result<()> {
    let providers = parse_providers(providers)?;
    let outcome = engine
        .runner
        .run_and_refresh(project, queries, providers, region, tier)
        .await?;

    print_checks(&outcome.checks);
    println!();
    print_summary(&outcome.history);
    Ok(())
}

/// # Errors
///
/// Returns an error if history or competitors cannot be read.
pub(crate) async fn run_history(
    engine: &Engine,
    project: &str,
    region: Option<&RegionFilter>,
) -> anyhow::Result<()> {
    let history = engine.runner.history();
    let (summary, gaps) = tokio::try_join!(
        history.refresh(project, region),
        history.competitor_gaps(project, region),
    )?;

    if summary.total_checks == 0 {
        println!("no checks recorded for project {project}; run `run` first");
        return Ok(());
    }
    print_summary(&summary);
    print_gaps(&gaps);
    Ok(())
}
