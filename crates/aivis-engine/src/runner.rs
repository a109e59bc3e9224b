//! Check Runner: fans a query set out across providers as one batch.
//!
//! The unit of work is the full `queries × providers` cross product. The
//! collaborator may parallelise internally, but the caller sees one outcome:
//! a result for every pair, or a failure.

use std::collections::HashMap;
use std::sync::Arc;

use aivis_core::{Provider, RegionFilter, ScheduledQuery, Tier, VisibilityCheck};
use serde::Serialize;

use crate::error::EngineError;
use crate::history::{HistoryAggregator, HistorySummary};
use crate::materializer::QueryMaterializer;
use crate::ports::{CheckBatch, VisibilityBackend};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub project_id: String,
    pub query_ids: Vec<String>,
    pub providers: Vec<Provider>,
    pub region: Option<RegionFilter>,
    pub tier: Tier,
}

impl RunRequest {
    /// Rejects a request before any collaborator call is made.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Validation`] for empty or blank inputs.
    /// - [`EngineError::Quota`] when a region filter is requested below pro.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.project_id.trim().is_empty() {
            return Err(EngineError::Validation("project id is required".to_string()));
        }
        if self.query_ids.is_empty() {
            return Err(EngineError::Validation(
                "select at least one query".to_string(),
            ));
        }
        if self.query_ids.iter().any(|q| q.trim().is_empty()) {
            return Err(EngineError::Validation(
                "query ids must not be blank".to_string(),
            ));
        }
        if self.providers.is_empty() {
            return Err(EngineError::Validation(
                "select at least one provider".to_string(),
            ));
        }
        validate_region(self.region.as_ref(), self.tier)
    }

    fn into_batch(self) -> CheckBatch {
        let mut query_ids: Vec<String> = Vec::with_capacity(self.query_ids.len());
        for id in self.query_ids {
            if !query_ids.contains(&id) {
                query_ids.push(id);
            }
        }
        let mut providers: Vec<Provider> = Vec::with_capacity(self.providers.len());
        for p in self.providers {
            if !providers.contains(&p) {
                providers.push(p);
            }
        }
        CheckBatch {
            project_id: self.project_id,
            query_ids,
            providers,
            region: self.region,
        }
    }
}

fn validate_region(region: Option<&RegionFilter>, tier: Tier) -> Result<(), EngineError> {
    let Some(region) = region else {
        return Ok(());
    };
    if !tier.is_pro_or_above() {
        return Err(EngineError::Quota {
            feature: "regional filtering".to_string(),
        });
    }
    if region.region.trim().is_empty() || region.language.trim().is_empty() {
        return Err(EngineError::Validation(
            "region filter needs both a region and a language".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub checks: Vec<VisibilityCheck>,
    pub history: HistorySummary,
}

pub struct CheckRunner {
    backend: Arc<dyn VisibilityBackend>,
    materializer: QueryMaterializer,
    history: HistoryAggregator,
}

impl CheckRunner {
    #[must_use]
    pub fn new(backend: Arc<dyn VisibilityBackend>) -> Self {
        Self {
            materializer: QueryMaterializer::new(Arc::clone(&backend)),
            history: HistoryAggregator::new(Arc::clone(&backend)),
            backend,
        }
    }

    #[must_use]
    pub fn materializer(&self) -> &QueryMaterializer {
        &self.materializer
    }

    #[must_use]
    pub fn history(&self) -> &HistoryAggregator {
        &self.history
    }

    /// Submits one batch and checks it came back complete.
    ///
    /// # Errors
    ///
    /// Validation and quota errors from [`RunRequest::validate`]; the
    /// collaborator's failure; or [`EngineError::IncompleteBatch`].
    pub async fn run(&self, request: RunRequest) -> Result<Vec<VisibilityCheck>, EngineError> {
        request.validate()?;
        let batch = request.into_batch();

        tracing::info!(
            project_id = %batch.project_id,
            queries = batch.query_ids.len(),
            providers = batch.providers.len(),
            region = ?batch.region.as_ref().map(|r| r.region.as_str()),
            "runner: submitting check batch"
        );

        let checks = self.backend.run_check(&batch).await.map_err(|e| {
            tracing::warn!(project_id = %batch.project_id, error = %e, "runner: check batch failed");
            EngineError::from(e)
        })?;

        ensure_complete(&batch, &checks)?;

        tracing::info!(
            project_id = %batch.project_id,
            checks = checks.len(),
            mentioned = checks.iter().filter(|c| c.brand_mentioned).count(),
            "runner: check batch complete"
        );
        Ok(checks)
    }

    /// Materialises a raw selection, then runs it.
    ///
    /// Provider and region checks happen before the keyword batch call, so a
    /// request that would be refused never creates keywords.
    ///
    /// # Errors
    ///
    /// See [`CheckRunner::run`] and [`QueryMaterializer::materialize`].
    pub async fn run_selection<S: AsRef<str>>(
        &self,
        project_id: &str,
        tokens: &[S],
        providers: Vec<Provider>,
        region: Option<RegionFilter>,
        tier: Tier,
    ) -> Result<Vec<VisibilityCheck>, EngineError> {
        if tokens.is_empty() {
            return Err(EngineError::Validation(
                "select at least one query".to_string(),
            ));
        }
        if providers.is_empty() {
            return Err(EngineError::Validation(
                "select at least one provider".to_string(),
            ));
        }
        validate_region(region.as_ref(), tier)?;

        let query_ids = self.materializer.materialize(project_id, tokens).await?;
        self.run(RunRequest {
            project_id: project_id.to_string(),
            query_ids,
            providers,
            region,
            tier,
        })
        .await
    }

    /// Runs a selection and re-reads history so the returned summary includes
    /// any runs that landed concurrently.
    ///
    /// # Errors
    ///
    /// See [`CheckRunner::run_selection`] and [`HistoryAggregator::refresh`].
    pub async fn run_and_refresh<S: AsRef<str>>(
        &self,
        project_id: &str,
        tokens: &[S],
        providers: Vec<Provider>,
        region: Option<RegionFilter>,
        tier: Tier,
    ) -> Result<RunOutcome, EngineError> {
        let checks = self
            .run_selection(project_id, tokens, providers, region.clone(), tier)
            .await?;
        let history = self.history.refresh(project_id, region.as_ref()).await?;
        Ok(RunOutcome { checks, history })
    }

    /// Executes a schedule's query text against its providers.
    ///
    /// The text is materialized on every call; an idempotent
    /// `create_keywords_batch` keeps that to one stored keyword per schedule.
    ///
    /// # Errors
    ///
    /// See [`CheckRunner::run`] and [`QueryMaterializer::materialize_texts`].
    pub async fn run_schedule(
        &self,
        schedule: &ScheduledQuery,
    ) -> Result<Vec<VisibilityCheck>, EngineError> {
        if schedule.providers.is_empty() {
            return Err(EngineError::Validation(format!(
                "schedule {} has no known providers",
                schedule.id
            )));
        }
        let query_ids = self
            .materializer
            .materialize_texts(&schedule.project_id, std::slice::from_ref(&schedule.query))
            .await?;
        self.run(RunRequest {
            project_id: schedule.project_id.clone(),
            query_ids,
            providers: schedule.providers.clone(),
            region: None,
            tier: Tier::Free,
        })
        .await
    }
}

/// A batch is complete when every requested provider returned one result
/// per query and nothing else came back.
fn ensure_complete(batch: &CheckBatch, checks: &[VisibilityCheck]) -> Result<(), EngineError> {
    let per_provider = batch.query_ids.len();
    let expected = per_provider * batch.providers.len();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for check in checks {
        *counts.entry(check.llm_provider.as_str()).or_default() += 1;
    }
    let every_provider_complete = batch
        .providers
        .iter()
        .all(|p| counts.get(p.id()).copied() == Some(per_provider));

    if checks.len() != expected || !every_provider_complete {
        tracing::warn!(
            project_id = %batch.project_id,
            expected,
            received = checks.len(),
            "runner: discarding incomplete check batch"
        );
        return Err(EngineError::IncompleteBatch {
            expected,
            received: checks.len(),
        });
    }
    Ok(())
}
