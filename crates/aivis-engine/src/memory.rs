//! In-process [`VisibilityBackend`].
//!
//! Keeps schedules, keywords, history, competitors and preferences in memory.
//! Check outcomes are deterministic: a check reports the brand as mentioned
//! for the providers registered with [`InMemoryBackend::set_mentioning`].
//! Failure and latency hooks let tests exercise the engine's error paths.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use aivis_core::{
    Competitor, Keyword, Provider, RegionFilter, ScheduledQuery, VisibilityCheck,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::error::{PortError, PortResult};
use crate::ports::{CheckBatch, NewSchedule, ScheduleUpdate, VisibilityBackend};

#[derive(Default)]
struct State {
    schedules: BTreeMap<String, ScheduledQuery>,
    keywords: HashMap<String, Vec<Keyword>>,
    history: Vec<(Option<RegionFilter>, VisibilityCheck)>,
    competitors: HashMap<String, Vec<Competitor>>,
    dismissed: HashSet<String>,
    mentioning: HashSet<Provider>,
    fail_run_check: Option<PortError>,
    fail_keywords: Option<PortError>,
    fail_run_record: Option<PortError>,
    drop_last_result: bool,
    run_delay: Option<Duration>,
}

pub struct InMemoryBackend {
    state: Mutex<State>,
    clock: Arc<dyn Clock>,
    run_check_calls: AtomicUsize,
    keyword_batch_calls: AtomicUsize,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            clock,
            run_check_calls: AtomicUsize::new(0),
            keyword_batch_calls: AtomicUsize::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Providers whose checks report the brand as mentioned and cited.
    pub fn set_mentioning(&self, providers: impl IntoIterator<Item = Provider>) {
        self.state().mentioning = providers.into_iter().collect();
    }

    pub fn add_competitor(&self, project_id: &str, competitor: Competitor) {
        self.state()
            .competitors
            .entry(project_id.to_string())
            .or_default()
            .push(competitor);
    }

    /// Inserts a keyword directly, as if it had been created elsewhere.
    pub fn seed_keyword(&self, project_id: &str, id: &str, text: &str) {
        self.state()
            .keywords
            .entry(project_id.to_string())
            .or_default()
            .push(Keyword {
                id: id.to_string(),
                text: text.to_string(),
            });
    }

    /// Inserts a stored schedule as-is.
    pub fn seed_schedule(&self, schedule: ScheduledQuery) {
        self.state()
            .schedules
            .insert(schedule.id.clone(), schedule);
    }

    /// The next `run_check` fails with `err`.
    pub fn fail_next_run_check(&self, err: PortError) {
        self.state().fail_run_check = Some(err);
    }

    /// The next `create_keywords_batch` fails with `err`.
    pub fn fail_next_keyword_batch(&self, err: PortError) {
        self.state().fail_keywords = Some(err);
    }

    /// The next schedule update that records a `last_run_at` fails with `err`.
    pub fn fail_next_run_record(&self, err: PortError) {
        self.state().fail_run_record = Some(err);
    }

    /// The next `run_check` silently drops its final result.
    pub fn drop_last_result_once(&self) {
        self.state().drop_last_result = true;
    }

    /// Every `run_check` sleeps this long before answering.
    pub fn set_run_delay(&self, delay: Duration) {
        self.state().run_delay = Some(delay);
    }

    #[must_use]
    pub fn run_check_calls(&self) -> usize {
        self.run_check_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn keyword_batch_calls(&self) -> usize {
        self.keyword_batch_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn keywords(&self, project_id: &str) -> Vec<Keyword> {
        self.state()
            .keywords
            .get(project_id)
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn history(&self) -> Vec<VisibilityCheck> {
        self.state().history.iter().map(|(_, c)| c.clone()).collect()
    }

    #[must_use]
    pub fn stored_schedule(&self, id: &str) -> Option<ScheduledQuery> {
        self.state().schedules.get(id).cloned()
    }
}

#[async_trait]
impl VisibilityBackend for InMemoryBackend {
    async fn list_schedules(&self, project_id: &str) -> PortResult<Vec<ScheduledQuery>> {
        Ok(self
            .state()
            .schedules
            .values()
            .filter(|s| s.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn list_due_schedules(&self, now: DateTime<Utc>) -> PortResult<Vec<ScheduledQuery>> {
        Ok(self
            .state()
            .schedules
            .values()
            .filter(|s| s.is_due(now))
            .cloned()
            .collect())
    }

    async fn get_schedule(&self, id: &str) -> PortResult<ScheduledQuery> {
        self.state()
            .schedules
            .get(id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("schedule {id}")))
    }

    async fn create_schedule(&self, schedule: &NewSchedule) -> PortResult<ScheduledQuery> {
        let created = ScheduledQuery {
            id: Uuid::new_v4().to_string(),
            project_id: schedule.project_id.clone(),
            query: schedule.query.clone(),
            providers: schedule.providers.clone(),
            frequency: schedule.frequency,
            enabled: schedule.enabled,
            last_run_at: None,
            next_run_at: schedule.next_run_at,
            created_at: schedule.created_at,
        };
        self.state()
            .schedules
            .insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn update_schedule(
        &self,
        id: &str,
        update: &ScheduleUpdate,
    ) -> PortResult<ScheduledQuery> {
        let mut state = self.state();
        if update.last_run_at.is_some() {
            if let Some(err) = state.fail_run_record.take() {
                return Err(err);
            }
        }
        let schedule = state
            .schedules
            .get_mut(id)
            .ok_or_else(|| PortError::NotFound(format!("schedule {id}")))?;
        if let Some(expected) = update.expected_next_run_at {
            if schedule.next_run_at != expected {
                return Err(PortError::Conflict(format!(
                    "schedule {id} next run moved to {}",
                    schedule.next_run_at
                )));
            }
        }
        if let Some(enabled) = update.enabled {
            schedule.enabled = enabled;
        }
        if let Some(at) = update.last_run_at {
            schedule.last_run_at = Some(at);
        }
        if let Some(at) = update.next_run_at {
            schedule.next_run_at = at;
        }
        Ok(schedule.clone())
    }

    async fn delete_schedule(&self, id: &str) -> PortResult<()> {
        self.state()
            .schedules
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("schedule {id}")))
    }

    async fn run_check(&self, batch: &CheckBatch) -> PortResult<Vec<VisibilityCheck>> {
        self.run_check_calls.fetch_add(1, Ordering::SeqCst);

        let delay = {
            let mut state = self.state();
            if let Some(err) = state.fail_run_check.take() {
                return Err(err);
            }
            state.run_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        let keywords = state
            .keywords
            .get(&batch.project_id)
            .cloned()
            .unwrap_or_default();
        let mut texts = Vec::with_capacity(batch.query_ids.len());
        for id in &batch.query_ids {
            let keyword = keywords
                .iter()
                .find(|k| &k.id == id)
                .ok_or_else(|| PortError::NotFound(format!("keyword {id}")))?;
            texts.push(keyword.text.clone());
        }

        let checked_at = self.clock.now();
        let mut results = Vec::with_capacity(texts.len() * batch.providers.len());
        for text in &texts {
            for provider in &batch.providers {
                let mentioned = state.mentioning.contains(provider);
                results.push(VisibilityCheck {
                    id: Uuid::new_v4().to_string(),
                    project_id: batch.project_id.clone(),
                    query: text.clone(),
                    llm_provider: provider.id().to_string(),
                    checked_at,
                    brand_mentioned: mentioned,
                    url_cited: mentioned,
                    citation_position: mentioned.then_some(1),
                    response_text: None,
                    competitor_mentions: Vec::new(),
                });
            }
        }
        for check in &results {
            state.history.push((batch.region.clone(), check.clone()));
        }

        if std::mem::take(&mut state.drop_last_result) {
            results.pop();
        }
        Ok(results)
    }

    async fn list_history(
        &self,
        project_id: &str,
        region: Option<&RegionFilter>,
    ) -> PortResult<Vec<VisibilityCheck>> {
        Ok(self
            .state()
            .history
            .iter()
            .filter(|(r, c)| c.project_id == project_id && (region.is_none() || r.as_ref() == region))
            .map(|(_, c)| c.clone())
            .collect())
    }

    async fn create_keywords_batch(
        &self,
        project_id: &str,
        texts: &[String],
    ) -> PortResult<Vec<Keyword>> {
        self.keyword_batch_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        if let Some(err) = state.fail_keywords.take() {
            return Err(err);
        }

        let stored = state.keywords.entry(project_id.to_string()).or_default();
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            if let Some(existing) = stored.iter().find(|k| &k.text == text) {
                out.push(existing.clone());
                continue;
            }
            let keyword = Keyword {
                id: format!("kw-{}", Uuid::new_v4().simple()),
                text: text.clone(),
            };
            stored.push(keyword.clone());
            out.push(keyword);
        }
        Ok(out)
    }

    async fn list_competitors(&self, project_id: &str) -> PortResult<Vec<Competitor>> {
        Ok(self
            .state()
            .competitors
            .get(project_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn suggestion_dismissed(&self, project_id: &str) -> PortResult<bool> {
        Ok(self.state().dismissed.contains(project_id))
    }

    async fn dismiss_suggestion(&self, project_id: &str) -> PortResult<()> {
        self.state().dismissed.insert(project_id.to_string());
        Ok(())
    }
}
