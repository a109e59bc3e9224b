//! Background job scheduler.
//!
//! Registers the periodic trigger that runs every due visibility schedule.
//! The cron expression and per-pass concurrency come from [`AppConfig`].

use std::sync::Arc;

use aivis_core::AppConfig;
use aivis_engine::Engine;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive for
/// the lifetime of the process. Dropping it shuts down all scheduled jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised, the
/// cron expression is rejected, or the scheduler fails to start.
pub async fn build_scheduler(
    engine: Engine,
    config: Arc<AppConfig>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    register_due_runs_job(&scheduler, engine, &config.scheduler_cron).await?;
    scheduler.start().await?;
    Ok(scheduler)
}

/// Registers the job that runs due schedules on each tick.
///
/// A pass that overlaps the next tick is harmless: each schedule's run is
/// serialised per id, and a schedule already advanced reports "not due".
async fn register_due_runs_job(
    scheduler: &JobScheduler,
    engine: Engine,
    cron: &str,
) -> Result<(), JobSchedulerError> {
    let engine = Arc::new(engine);

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let engine = Arc::clone(&engine);

        Box::pin(async move {
            tracing::debug!("scheduler: due-run tick");
            if let Err(e) = engine.schedules.run_all_due().await {
                tracing::error!(error = %e, "scheduler: failed to load due schedules");
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron, "scheduler: due-run job registered");
    Ok(())
}
