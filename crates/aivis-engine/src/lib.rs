//! Visibility-check orchestration.
//!
//! Sequences calls against the collaborator port: materialising virtual
//! queries, running check batches, re-deriving history summaries, and managing
//! recurring schedules with per-id serialisation.

pub mod clock;
pub mod error;
pub mod history;
pub mod materializer;
pub mod memory;
pub mod ports;
pub mod runner;
pub mod schedules;
pub mod suggestions;

use std::sync::Arc;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{EngineError, PortError, PortResult};
pub use history::{
    competitor_gaps, summarize, CompetitorGap, HistoryAggregator, HistorySummary,
    ProviderBreakdown,
};
pub use materializer::{partition_tokens, QueryMaterializer, SelectionToken, PERSONA_PREFIX};
pub use memory::InMemoryBackend;
pub use ports::{CheckBatch, NewSchedule, ScheduleUpdate, VisibilityBackend};
pub use runner::{CheckRunner, RunOutcome, RunRequest};
pub use schedules::{DueRunReport, RunDueOutcome, ScheduleManager};
pub use suggestions::{AdHocRun, ScheduleSuggestion, SuggestionService};

/// All engine services wired to one backend and clock.
#[derive(Clone)]
pub struct Engine {
    pub runner: Arc<CheckRunner>,
    pub schedules: Arc<ScheduleManager>,
    pub suggestions: Arc<SuggestionService>,
}

impl Engine {
    #[must_use]
    pub fn new(
        backend: Arc<dyn VisibilityBackend>,
        clock: Arc<dyn Clock>,
        max_concurrent_schedules: usize,
    ) -> Self {
        let runner = Arc::new(CheckRunner::new(Arc::clone(&backend)));
        let schedules = Arc::new(ScheduleManager::new(
            Arc::clone(&backend),
            Arc::clone(&runner),
            clock,
            max_concurrent_schedules,
        ));
        let suggestions = Arc::new(SuggestionService::new(backend, Arc::clone(&schedules)));
        Self {
            runner,
            schedules,
            suggestions,
        }
    }
}
