//! First-schedule suggestion.
//!
//! After a project's first manual run, offer to repeat that run weekly. The
//! offer disappears once the project has any schedule or once it has been
//! dismissed; the dismissal is stored by the collaborator per project.

use std::collections::HashSet;
use std::sync::Arc;

use aivis_core::{Frequency, Provider, ScheduledQuery, VisibilityCheck};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::ports::VisibilityBackend;
use crate::schedules::ScheduleManager;

/// Checks this close to the newest one are treated as the same manual run.
const AD_HOC_RUN_WINDOW_MINUTES: i64 = 10;

/// The query and providers of one manual run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdHocRun {
    pub query: String,
    pub providers: Vec<Provider>,
    pub ran_at: DateTime<Utc>,
}

impl AdHocRun {
    /// Reconstructs the most recent run from history: the newest check's
    /// query, with every known provider that checked that query inside the
    /// run window.
    #[must_use]
    pub fn latest_from_history(checks: &[VisibilityCheck]) -> Option<Self> {
        let newest = checks.iter().max_by_key(|c| c.checked_at)?;
        let window_start = newest.checked_at - TimeDelta::minutes(AD_HOC_RUN_WINDOW_MINUTES);

        let mut seen = HashSet::new();
        let mut providers: Vec<Provider> = checks
            .iter()
            .filter(|c| c.query == newest.query && c.checked_at >= window_start)
            .filter_map(VisibilityCheck::provider)
            .filter(|p| seen.insert(*p))
            .collect();
        providers.sort();
        if providers.is_empty() {
            return None;
        }

        Some(Self {
            query: newest.query.clone(),
            providers,
            ran_at: newest.checked_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSuggestion {
    pub project_id: String,
    pub query: String,
    pub providers: Vec<Provider>,
    pub frequency: Frequency,
}

pub struct SuggestionService {
    backend: Arc<dyn VisibilityBackend>,
    schedules: Arc<ScheduleManager>,
}

impl SuggestionService {
    #[must_use]
    pub fn new(backend: Arc<dyn VisibilityBackend>, schedules: Arc<ScheduleManager>) -> Self {
        Self { backend, schedules }
    }

    /// Returns a weekly suggestion built from `last_run`, if one should be shown.
    ///
    /// # Errors
    ///
    /// Propagates collaborator failures.
    pub async fn suggest(
        &self,
        project_id: &str,
        last_run: Option<&AdHocRun>,
    ) -> Result<Option<ScheduleSuggestion>, EngineError> {
        let Some(run) = last_run else {
            return Ok(None);
        };
        if run.providers.is_empty() || run.query.trim().is_empty() {
            return Ok(None);
        }
        if self.backend.suggestion_dismissed(project_id).await? {
            return Ok(None);
        }
        if !self.schedules.list(project_id).await?.is_empty() {
            return Ok(None);
        }

        Ok(Some(ScheduleSuggestion {
            project_id: project_id.to_string(),
            query: run.query.clone(),
            providers: run.providers.clone(),
            frequency: Frequency::Weekly,
        }))
    }

    /// Suggestion derived from the project's own history.
    ///
    /// # Errors
    ///
    /// Propagates collaborator failures.
    pub async fn suggest_from_history(
        &self,
        project_id: &str,
    ) -> Result<Option<ScheduleSuggestion>, EngineError> {
        let checks = self.backend.list_history(project_id, None).await?;
        let last_run = AdHocRun::latest_from_history(&checks);
        self.suggest(project_id, last_run.as_ref()).await
    }

    /// Records that the project does not want the suggestion again.
    ///
    /// # Errors
    ///
    /// Propagates the collaborator failure.
    pub async fn dismiss(&self, project_id: &str) -> Result<(), EngineError> {
        self.backend.dismiss_suggestion(project_id).await?;
        tracing::info!(project_id, "suggestions: dismissed");
        Ok(())
    }

    /// Creates the suggested schedule.
    ///
    /// # Errors
    ///
    /// See [`ScheduleManager::create`].
    pub async fn accept(
        &self,
        suggestion: &ScheduleSuggestion,
    ) -> Result<ScheduledQuery, EngineError> {
        self.schedules
            .create(
                &suggestion.project_id,
                &suggestion.query,
                suggestion.providers.clone(),
                suggestion.frequency,
            )
            .await
    }
}
