//! The collaborator contract.
//!
//! Persistence, LLM execution, and keyword storage live behind
//! [`VisibilityBackend`]. The engine only sequences calls against it.

use aivis_core::{
    Competitor, Frequency, Keyword, Provider, RegionFilter, ScheduledQuery, VisibilityCheck,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PortResult;

/// Payload for creating a schedule. The engine computes `next_run_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSchedule {
    pub project_id: String,
    pub query: String,
    pub providers: Vec<Provider>,
    pub frequency: Frequency,
    pub enabled: bool,
    pub next_run_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Partial update; `None` fields are left as stored.
///
/// When `expected_next_run_at` is set the write is conditional: the backend
/// must apply it only if the stored `next_run_at` still equals that value,
/// and answer [`PortError::Conflict`](crate::PortError::Conflict) otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_next_run_at: Option<DateTime<Utc>>,
}

impl ScheduleUpdate {
    #[must_use]
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Self::default()
        }
    }

    /// Moves `next_run_at` from `expected` to `next`, failing with a conflict
    /// if another writer moved it first.
    #[must_use]
    pub fn reschedule(expected: DateTime<Utc>, next: DateTime<Utc>) -> Self {
        Self {
            next_run_at: Some(next),
            expected_next_run_at: Some(expected),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn ran(at: DateTime<Utc>) -> Self {
        Self {
            last_run_at: Some(at),
            ..Self::default()
        }
    }
}

/// One batch submitted to the execution capability: the full cross product
/// of `query_ids` and `providers`, optionally scoped to one region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckBatch {
    pub project_id: String,
    pub query_ids: Vec<String>,
    pub providers: Vec<Provider>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<RegionFilter>,
}

#[async_trait]
pub trait VisibilityBackend: Send + Sync {
    // --- Schedules ---
    async fn list_schedules(&self, project_id: &str) -> PortResult<Vec<ScheduledQuery>>;

    /// Enabled schedules across all projects whose `next_run_at <= now`.
    async fn list_due_schedules(&self, now: DateTime<Utc>) -> PortResult<Vec<ScheduledQuery>>;

    async fn get_schedule(&self, id: &str) -> PortResult<ScheduledQuery>;

    async fn create_schedule(&self, schedule: &NewSchedule) -> PortResult<ScheduledQuery>;

    async fn update_schedule(&self, id: &str, update: &ScheduleUpdate)
        -> PortResult<ScheduledQuery>;

    async fn delete_schedule(&self, id: &str) -> PortResult<()>;

    // --- Checks ---
    async fn run_check(&self, batch: &CheckBatch) -> PortResult<Vec<VisibilityCheck>>;

    async fn list_history(
        &self,
        project_id: &str,
        region: Option<&RegionFilter>,
    ) -> PortResult<Vec<VisibilityCheck>>;

    // --- Keywords & competitors ---
    /// Returns one keyword per text, in order.
    ///
    /// Must be idempotent per `(project_id, text)`: a text that already exists
    /// returns the stored keyword instead of a new one. Scheduled runs call
    /// this on every tick with the same query text.
    async fn create_keywords_batch(
        &self,
        project_id: &str,
        texts: &[String],
    ) -> PortResult<Vec<Keyword>>;

    async fn list_competitors(&self, project_id: &str) -> PortResult<Vec<Competitor>>;

    // --- Preferences ---
    async fn suggestion_dismissed(&self, project_id: &str) -> PortResult<bool>;

    async fn dismiss_suggestion(&self, project_id: &str) -> PortResult<()>;
}
