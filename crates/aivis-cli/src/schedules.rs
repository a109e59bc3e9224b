//! Schedule command handlers.

use aivis_core::{parse_providers, Frequency, ScheduledQuery};
use aivis_engine::{Engine, RunDueOutcome};
use chrono::{DateTime, Utc};

use crate::scoring::provider_ids;

fn fmt_time(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(
        || "\u{2014}".to_string(),
        |t| t.format("%Y-%m-%d %H:%M").to_string(),
    )
}

fn print_schedule(schedule: &ScheduledQuery) {
    println!(
        "{:<38}{:<8}{:<9}{:<18}{:<18}{} [{}]",
        schedule.id,
        schedule.frequency,
        if schedule.enabled { "active" } else { "paused" },
        fmt_time(schedule.last_run_at),
        fmt_time(Some(schedule.next_run_at)),
        schedule.query,
        provider_ids(&schedule.providers),
    );
}

/// # Errors
///
/// Returns an error if the backend cannot be reached.
pub(crate) async fn run_list(engine: &Engine, project: &str) -> anyhow::Result<()> {
    let schedules = engine.schedules.list(project).await?;
    if schedules.is_empty() {
        println!("no schedules for project {project}");
        return Ok(());
    }
    println!(
        "{:<38}{:<8}{:<9}{:<18}{:<18}QUERY",
        "ID", "EVERY", "STATE", "LAST RUN", "NEXT RUN"
    );
    for schedule in &schedules {
        print_schedule(schedule);
    }
    Ok(())
}

/// # Errors
///
/// Returns an error for unknown provider ids, invalid input, or a backend
/// failure.
pub(crate) async fn run_create(
    engine: &Engine,
    project: &str,
    query: &str,
    providers: &[String],
    frequency: Frequency,
) -> anyhow::Result<()> {
    let providers = parse_providers(providers)?;
    let created = engine
        .schedules
        .create(project, query, providers, frequency)
        .await?;
    println!("created schedule {}", created.id);
    print_schedule(&created);
    Ok(())
}

/// # Errors
///
/// Returns an error if the schedule does not exist or the backend fails.
pub(crate) async fn run_toggle(engine: &Engine, id: &str) -> anyhow::Result<()> {
    let updated = engine.schedules.toggle(id).await?;
    print_schedule(&updated);
    Ok(())
}

/// # Errors
///
/// Returns an error if the schedule does not exist or its run fails.
pub(crate) async fn run_one(engine: &Engine, id: &str) -> anyhow::Result<()> {
    let outcome = engine.schedules.run_due(id).await?;
    println!("{id}: {}", describe_outcome(&outcome));
    Ok(())
}

/// # Errors
///
/// Returns an error if the schedule does not exist or the backend fails.
pub(crate) async fn run_delete(engine: &Engine, id: &str) -> anyhow::Result<()> {
    engine.schedules.delete(id).await?;
    println!("deleted schedule {id}");
    Ok(())
}

/// # Errors
///
/// Returns an error if the due list cannot be read.
pub(crate) async fn run_due(engine: &Engine) -> anyhow::Result<()> {
    let report = engine.schedules.run_all_due().await?;
    println!(
        "ran: {}  skipped: {}  failed: {}",
        report.ran, report.skipped, report.failed
    );
    Ok(())
}

pub(crate) fn describe_outcome(outcome: &RunDueOutcome) -> String {
    match outcome {
        RunDueOutcome::Ran {
            checks,
            next_run_at,
            ..
        } => format!("ran {checks} checks; next run {}", fmt_time(Some(*next_run_at))),
        RunDueOutcome::NotDue { next_run_at } => {
            format!("not due until {}", fmt_time(Some(*next_run_at)))
        }
        RunDueOutcome::Paused => "paused".to_string(),
    }
}
