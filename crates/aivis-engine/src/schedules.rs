//! Schedule Manager: lifecycle of recurring visibility checks.
//!
//! States are `Active` (enabled), `Paused` (disabled) and `Deleted` (gone).
//! Every mutation of one schedule id runs under that id's async mutex. Across
//! processes, `run_due` claims the slot with a conditional write of
//! `next_run_at` before running, so a CLI pass, a second server replica and
//! the local cron can never run the same slot twice.
//!
//! Deletion dominates: once a delete has been applied, the id is tombstoned and
//! any toggle or run queued behind it fails with `NotFound` without touching
//! the collaborator. Tombstones expire after [`TOMBSTONE_TTL_MINUTES`]; past
//! that the collaborator's own `NotFound` is authoritative.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use aivis_core::{Frequency, Provider, ScheduledQuery};
use chrono::{DateTime, TimeDelta, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;

use crate::clock::Clock;
use crate::error::{EngineError, PortError};
use crate::ports::{NewSchedule, ScheduleUpdate, VisibilityBackend};
use crate::runner::CheckRunner;

/// What a single `run_due` call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunDueOutcome {
    #[serde(rename_all = "camelCase")]
    Ran {
        checks: usize,
        last_run_at: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    NotDue {
        next_run_at: DateTime<Utc>,
    },
    Paused,
}

/// Totals for one pass of the periodic trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DueRunReport {
    pub ran: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub const TOMBSTONE_TTL_MINUTES: i64 = 15;

type IdLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

pub struct ScheduleManager {
    backend: Arc<dyn VisibilityBackend>,
    runner: Arc<CheckRunner>,
    clock: Arc<dyn Clock>,
    locks: IdLocks,
    /// Deleted id → when it was deleted.
    tombstones: Mutex<HashMap<String, DateTime<Utc>>>,
    max_concurrent: usize,
}

/// Holds one id's mutex. On drop the registry entry is removed once nobody
/// else holds or waits on it, so ids that are never seen again cost nothing.
struct IdGuard<'a> {
    locks: &'a IdLocks,
    id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for IdGuard<'_> {
    fn drop(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        let mutex = Arc::clone(OwnedMutexGuard::mutex(&guard));
        drop(guard);
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let idle = locks
            .get(&self.id)
            .is_some_and(|entry| Arc::ptr_eq(entry, &mutex) && Arc::strong_count(&mutex) == 2);
        if idle {
            locks.remove(&self.id);
        }
    }
}

impl ScheduleManager {
    #[must_use]
    pub fn new(
        backend: Arc<dyn VisibilityBackend>,
        runner: Arc<CheckRunner>,
        clock: Arc<dyn Clock>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            backend,
            runner,
            clock,
            locks: Mutex::new(HashMap::new()),
            tombstones: Mutex::new(HashMap::new()),
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Lists a project's schedules, hiding any this process has deleted.
    ///
    /// # Errors
    ///
    /// Propagates the collaborator failure.
    pub async fn list(&self, project_id: &str) -> Result<Vec<ScheduledQuery>, EngineError> {
        let schedules = self.backend.list_schedules(project_id).await?;
        Ok(schedules
            .into_iter()
            .filter(|s| !self.is_deleted(&s.id))
            .collect())
    }

    /// Creates an active schedule whose first run is one interval from now.
    ///
    /// # Errors
    ///
    /// [`EngineError::Validation`] for a blank query or empty provider set;
    /// otherwise the collaborator failure.
    pub async fn create(
        &self,
        project_id: &str,
        query: &str,
        providers: Vec<Provider>,
        frequency: Frequency,
    ) -> Result<ScheduledQuery, EngineError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(EngineError::Validation(
                "schedule query must not be empty".to_string(),
            ));
        }
        let mut unique: Vec<Provider> = Vec::with_capacity(providers.len());
        for p in providers {
            if !unique.contains(&p) {
                unique.push(p);
            }
        }
        if unique.is_empty() {
            return Err(EngineError::Validation(
                "schedule needs at least one provider".to_string(),
            ));
        }

        let now = self.clock.now();
        let new = NewSchedule {
            project_id: project_id.to_string(),
            query: query.to_string(),
            providers: unique,
            frequency,
            enabled: true,
            next_run_at: frequency.next_run_after(now),
            created_at: now,
        };
        let created = self.backend.create_schedule(&new).await?;
        tracing::info!(
            schedule_id = %created.id,
            project_id,
            frequency = %frequency,
            next_run_at = %created.next_run_at,
            "schedules: created"
        );
        Ok(created)
    }

    /// Flips `enabled`. `next_run_at` is left as is, so resuming continues the
    /// original cadence.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if the schedule was deleted; otherwise the
    /// collaborator failure.
    pub async fn toggle(&self, id: &str) -> Result<ScheduledQuery, EngineError> {
        let _guard = self.lock_id(id).await;
        self.ensure_live(id)?;

        let current = self.backend.get_schedule(id).await?;
        let updated = self
            .backend
            .update_schedule(id, &ScheduleUpdate::enabled(!current.enabled))
            .await?;
        tracing::info!(schedule_id = id, enabled = updated.enabled, "schedules: toggled");
        Ok(updated)
    }

    /// Sets `enabled` explicitly. A no-op write is skipped.
    ///
    /// # Errors
    ///
    /// Same as [`ScheduleManager::toggle`].
    pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<ScheduledQuery, EngineError> {
        let _guard = self.lock_id(id).await;
        self.ensure_live(id)?;

        let current = self.backend.get_schedule(id).await?;
        if current.enabled == enabled {
            return Ok(current);
        }
        let updated = self
            .backend
            .update_schedule(id, &ScheduleUpdate::enabled(enabled))
            .await?;
        tracing::info!(schedule_id = id, enabled, "schedules: enabled flag set");
        Ok(updated)
    }

    /// Hard-deletes a schedule.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if it was already deleted; otherwise the
    /// collaborator failure, in which case the schedule is kept.
    pub async fn delete(&self, id: &str) -> Result<(), EngineError> {
        let _guard = self.lock_id(id).await;
        self.ensure_live(id)?;

        match self.backend.delete_schedule(id).await {
            Ok(()) => {}
            Err(crate::PortError::NotFound(what)) => {
                self.tombstone(id);
                return Err(EngineError::NotFound(what));
            }
            Err(e) => return Err(e.into()),
        }
        self.tombstone(id);
        tracing::info!(schedule_id = id, "schedules: deleted");
        Ok(())
    }

    /// Runs one schedule if it is enabled and due, then advances its cadence
    /// from the actual run time.
    ///
    /// The slot is claimed first by moving `next_run_at` conditionally. A lost
    /// claim means another trigger owns this slot and is reported as
    /// `NotDue`. A failed run hands the slot back so the next trigger retries.
    /// Once the batch has run, failing to record `last_run_at` is only logged:
    /// the cadence has already moved on, so the checks are not repeated.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] for a deleted schedule; any runner error.
    pub async fn run_due(&self, id: &str) -> Result<RunDueOutcome, EngineError> {
        let _guard = self.lock_id(id).await;
        self.ensure_live(id)?;

        let schedule = self.backend.get_schedule(id).await?;
        if !schedule.enabled {
            return Ok(RunDueOutcome::Paused);
        }
        let now = self.clock.now();
        if !schedule.is_due(now) {
            return Ok(RunDueOutcome::NotDue {
                next_run_at: schedule.next_run_at,
            });
        }

        let next_run_at = schedule.frequency.next_run_after(now);
        let claim = ScheduleUpdate::reschedule(schedule.next_run_at, next_run_at);
        match self.backend.update_schedule(id, &claim).await {
            Ok(_) => {}
            Err(PortError::Conflict(_)) => {
                let current = self.backend.get_schedule(id).await?;
                tracing::info!(
                    schedule_id = id,
                    next_run_at = %current.next_run_at,
                    "scheduler: slot already claimed"
                );
                return Ok(RunDueOutcome::NotDue {
                    next_run_at: current.next_run_at,
                });
            }
            Err(e) => return Err(e.into()),
        }

        let checks = match self.runner.run_schedule(&schedule).await {
            Ok(checks) => checks,
            Err(e) => {
                self.release_claim(id, next_run_at, schedule.next_run_at)
                    .await;
                return Err(e);
            }
        };

        if let Err(e) = self
            .backend
            .update_schedule(id, &ScheduleUpdate::ran(now))
            .await
        {
            tracing::warn!(
                schedule_id = id,
                error = %e,
                "scheduler: run completed but last_run_at was not recorded"
            );
        }

        tracing::info!(
            schedule_id = id,
            project_id = %schedule.project_id,
            checks = checks.len(),
            next_run_at = %next_run_at,
            "scheduler: schedule ran"
        );
        Ok(RunDueOutcome::Ran {
            checks: checks.len(),
            last_run_at: now,
            next_run_at,
        })
    }

    async fn release_claim(&self, id: &str, claimed: DateTime<Utc>, original: DateTime<Utc>) {
        let release = ScheduleUpdate::reschedule(claimed, original);
        if let Err(e) = self.backend.update_schedule(id, &release).await {
            tracing::warn!(
                schedule_id = id,
                error = %e,
                "scheduler: could not release claimed slot; schedule waits for its next run"
            );
        }
    }

    /// Runs every due schedule, up to `max_concurrent` at a time.
    ///
    /// Per-schedule failures are logged and counted, never propagated.
    ///
    /// # Errors
    ///
    /// Only if the due list itself cannot be read.
    pub async fn run_all_due(&self) -> Result<DueRunReport, EngineError> {
        let now = self.clock.now();
        let due = self.backend.list_due_schedules(now).await?;
        if due.is_empty() {
            tracing::debug!("scheduler: nothing due");
            return Ok(DueRunReport::default());
        }
        tracing::info!(count = due.len(), "scheduler: running due schedules");

        let results: Vec<(String, Result<RunDueOutcome, EngineError>)> = stream::iter(due)
            .map(|schedule| async move {
                let result = self.run_due(&schedule.id).await;
                (schedule.id, result)
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let mut report = DueRunReport::default();
        for (id, result) in results {
            match result {
                Ok(RunDueOutcome::Ran { .. }) => report.ran += 1,
                Ok(_) | Err(EngineError::NotFound(_)) => report.skipped += 1,
                Err(e) => {
                    tracing::error!(schedule_id = %id, error = %e, "scheduler: schedule run failed");
                    report.failed += 1;
                }
            }
        }
        tracing::info!(
            ran = report.ran,
            skipped = report.skipped,
            failed = report.failed,
            "scheduler: due pass complete"
        );
        Ok(report)
    }

    async fn lock_id(&self, id: &str) -> IdGuard<'_> {
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(id.to_string()).or_default())
        };
        IdGuard {
            locks: &self.locks,
            id: id.to_string(),
            guard: Some(mutex.lock_owned().await),
        }
    }

    fn tombstone(&self, id: &str) {
        let now = self.clock.now();
        let cutoff = now - TimeDelta::minutes(TOMBSTONE_TTL_MINUTES);
        let mut tombstones = self.tombstones.lock().unwrap_or_else(PoisonError::into_inner);
        tombstones.retain(|_, deleted_at| *deleted_at > cutoff);
        tombstones.insert(id.to_string(), now);
    }

    fn is_deleted(&self, id: &str) -> bool {
        let cutoff = self.clock.now() - TimeDelta::minutes(TOMBSTONE_TTL_MINUTES);
        self.tombstones
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .is_some_and(|deleted_at| *deleted_at > cutoff)
    }

    fn ensure_live(&self, id: &str) -> Result<(), EngineError> {
        if self.is_deleted(id) {
            return Err(EngineError::NotFound(format!("schedule {id}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::clock::ManualClock;
    use crate::memory::InMemoryBackend;

    fn manager() -> (Arc<ManualClock>, ScheduleManager) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 4, 6, 9, 30, 0).unwrap(),
        ));
        let backend: Arc<dyn VisibilityBackend> =
            Arc::new(InMemoryBackend::with_clock(clock.clone()));
        let runner = Arc::new(CheckRunner::new(Arc::clone(&backend)));
        let manager = ScheduleManager::new(backend, runner, clock.clone(), 2);
        (clock, manager)
    }

    fn tracked_locks(manager: &ScheduleManager) -> usize {
        manager.locks.lock().unwrap().len()
    }

    fn tombstone_count(manager: &ScheduleManager) -> usize {
        manager.tombstones.lock().unwrap().len()
    }

    #[tokio::test]
    async fn unknown_ids_leave_no_lock_entries() {
        let (_, manager) = manager();
        for i in 0..100 {
            let id = format!("missing-{i}");
            assert!(matches!(
                manager.toggle(&id).await,
                Err(EngineError::NotFound(_))
            ));
            assert!(matches!(
                manager.run_due(&id).await,
                Err(EngineError::NotFound(_))
            ));
        }
        assert_eq!(tracked_locks(&manager), 0);
    }

    #[tokio::test]
    async fn lock_entries_are_released_after_each_operation() {
        let (_, manager) = manager();
        let created = manager
            .create("p1", "best crm", vec![Provider::Claude], Frequency::Daily)
            .await
            .unwrap();

        manager.toggle(&created.id).await.unwrap();
        manager.run_due(&created.id).await.unwrap();
        manager.delete(&created.id).await.unwrap();

        assert_eq!(tracked_locks(&manager), 0);
    }

    #[tokio::test]
    async fn tombstones_expire() {
        let (clock, manager) = manager();
        for _ in 0..50 {
            let created = manager
                .create("p1", "best crm", vec![Provider::Claude], Frequency::Daily)
                .await
                .unwrap();
            manager.delete(&created.id).await.unwrap();
        }
        assert_eq!(tombstone_count(&manager), 50);

        clock.advance(TimeDelta::minutes(TOMBSTONE_TTL_MINUTES + 1));
        let last = manager
            .create("p1", "best crm", vec![Provider::Claude], Frequency::Daily)
            .await
            .unwrap();
        manager.delete(&last.id).await.unwrap();

        assert_eq!(tombstone_count(&manager), 1);
    }

    #[tokio::test]
    async fn expired_tombstone_still_reports_not_found() {
        let (clock, manager) = manager();
        let created = manager
            .create("p1", "best crm", vec![Provider::Claude], Frequency::Daily)
            .await
            .unwrap();
        manager.delete(&created.id).await.unwrap();
        clock.advance(TimeDelta::minutes(TOMBSTONE_TTL_MINUTES + 1));

        assert!(matches!(
            manager.toggle(&created.id).await,
            Err(EngineError::NotFound(_))
        ));
    }
}
