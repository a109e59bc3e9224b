mod checks;
mod schedules;
mod scoring;

use std::sync::Arc;

use aivis_client::BackendClient;
use aivis_core::{Frequency, Intent, Preset, RegionFilter, Severity, Tier};
use aivis_engine::{Engine, SystemClock};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "aivis-cli")]
#[command(about = "AI answer-engine visibility command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Score confidence from sample sizes (offline)
    Confidence {
        #[command(subcommand)]
        command: ConfidenceCommands,
    },
    /// Inspect the provider catalog, presets and recommendations (offline)
    Providers {
        #[command(subcommand)]
        command: ProviderCommands,
    },
    /// Manage recurring visibility schedules
    Schedules {
        #[command(subcommand)]
        command: ScheduleCommands,
    },
    /// Run a visibility check batch and print the refreshed summary
    Run {
        #[arg(long)]
        project: String,
        /// Keyword ids or `persona:<id>:<text>` tokens
        #[arg(long = "query", required = true)]
        queries: Vec<String>,
        /// Comma-separated provider ids
        #[arg(long, value_delimiter = ',', required = true)]
        providers: Vec<String>,
        #[arg(long, requires = "language")]
        region: Option<String>,
        #[arg(long, requires = "region")]
        language: Option<String>,
        #[arg(long, default_value = "free")]
        tier: Tier,
    },
    /// Summarise a project's check history
    History {
        #[arg(long)]
        project: String,
        #[arg(long, requires = "language")]
        region: Option<String>,
        #[arg(long, requires = "region")]
        language: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum ConfidenceCommands {
    /// Confidence from the number of pages sampled in an audit
    Pages { pages: u64 },
    /// Confidence from check volume and diversity
    Coverage {
        #[arg(long)]
        checks: usize,
        #[arg(long)]
        providers: usize,
        #[arg(long)]
        queries: usize,
    },
    /// Confidence in a single recommendation
    Recommendation {
        #[arg(long, default_value = "info")]
        severity: String,
        #[arg(long)]
        score_impact: Option<f64>,
        #[arg(long)]
        affected_pages: Option<i64>,
        #[arg(long)]
        total_pages: Option<i64>,
    },
}

#[derive(Debug, Subcommand)]
enum ProviderCommands {
    /// List every provider and preset
    List,
    /// Recommended providers for a search intent
    Recommend {
        intent: Intent,
        #[arg(long, default_value = "free")]
        tier: Tier,
    },
    /// Providers a preset selects for a tier
    Preset {
        preset: Preset,
        #[arg(long, default_value = "free")]
        tier: Tier,
    },
}

#[derive(Debug, Subcommand)]
enum ScheduleCommands {
    /// List a project's schedules
    List {
        #[arg(long)]
        project: String,
    },
    /// Create an active schedule
    Create {
        #[arg(long)]
        project: String,
        #[arg(long)]
        query: String,
        /// Comma-separated provider ids
        #[arg(long, value_delimiter = ',', required = true)]
        providers: Vec<String>,
        #[arg(long, default_value = "weekly")]
        frequency: Frequency,
    },
    /// Pause an active schedule or resume a paused one
    Toggle { id: String },
    /// Run one schedule now if it is due
    Run { id: String },
    /// Delete a schedule permanently
    Delete { id: String },
    /// Run every due schedule once, as the server's trigger would
    RunDue,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Confidence { command }) => {
            run_confidence(command);
            Ok(())
        }
        Some(Commands::Providers { command }) => run_providers(command),
        Some(Commands::Schedules { command }) => {
            let engine = connect()?;
            match command {
                ScheduleCommands::List { project } => {
                    schedules::run_list(&engine, &project).await
                }
                ScheduleCommands::Create {
                    project,
                    query,
                    providers,
                    frequency,
                } => schedules::run_create(&engine, &project, &query, &providers, frequency).await,
                ScheduleCommands::Toggle { id } => schedules::run_toggle(&engine, &id).await,
                ScheduleCommands::Run { id } => schedules::run_one(&engine, &id).await,
                ScheduleCommands::Delete { id } => schedules::run_delete(&engine, &id).await,
                ScheduleCommands::RunDue => schedules::run_due(&engine).await,
            }
        }
        Some(Commands::Run {
            project,
            queries,
            providers,
            region,
            language,
            tier,
        }) => {
            let engine = connect()?;
            let region = region_filter(region, language);
            checks::run_checks(&engine, &project, &queries, &providers, region, tier).await
        }
        Some(Commands::History {
            project,
            region,
            language,
        }) => {
            let engine = connect()?;
            checks::run_history(&engine, &project, region_filter(region, language).as_ref()).await
        }
        None => {
            println!("aivis-cli ready; see --help for commands");
            Ok(())
        }
    }
}

fn run_confidence(command: ConfidenceCommands) {
    match command {
        ConfidenceCommands::Pages { pages } => scoring::print_pages(pages),
        ConfidenceCommands::Coverage {
            checks,
            providers,
            queries,
        } => scoring::print_coverage(checks, providers, queries),
        ConfidenceCommands::Recommendation {
            severity,
            score_impact,
            affected_pages,
            total_pages,
        } => scoring::print_recommendation(&aivis_core::RecommendationInput {
            severity: parse_severity(&severity),
            score_impact,
            affected_pages,
            total_pages,
        }),
    }
}

fn run_providers(command: ProviderCommands) -> anyhow::Result<()> {
    match command {
        ProviderCommands::List => {
            scoring::print_catalog();
            Ok(())
        }
        ProviderCommands::Recommend { intent, tier } => {
            scoring::print_recommendation_for(intent, tier);
            Ok(())
        }
        ProviderCommands::Preset { preset, tier } => scoring::print_preset(preset, tier),
    }
}

/// Unknown severities score as informational.
fn parse_severity(raw: &str) -> Severity {
    serde_json::from_value(serde_json::Value::String(raw.trim().to_ascii_lowercase()))
        .unwrap_or_default()
}

fn region_filter(region: Option<String>, language: Option<String>) -> Option<RegionFilter> {
    match (region, language) {
        (Some(region), Some(language)) => Some(RegionFilter { region, language }),
        _ => None,
    }
}

fn connect() -> anyhow::Result<Engine> {
    let config = aivis_core::load_app_config()?;
    tracing::debug!(backend_url = %config.backend_url, "cli: connecting to backend");
    let backend = Arc::new(BackendClient::new(&config)?);
    Ok(Engine::new(
        backend,
        Arc::new(SystemClock),
        config.scheduler_max_concurrent,
    ))
}
