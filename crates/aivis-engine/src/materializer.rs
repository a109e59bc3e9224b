//! Resolves a mixed selection of keyword ids and persona-derived virtual
//! queries into persisted keyword ids.
//!
//! Virtual queries have the form `persona:<personaId>:<queryText>`. They only
//! exist in the selection step; before any check runs, their text is written
//! through the collaborator's batch keyword call and replaced by the returned
//! ids. If that call fails, nothing is run.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::EngineError;
use crate::ports::VisibilityBackend;

pub const PERSONA_PREFIX: &str = "persona:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionToken {
    Keyword(String),
    Persona { persona_id: String, text: String },
}

impl SelectionToken {
    /// Parses one selection token.
    ///
    /// Only the first two colons of a persona token are structural; the query
    /// text keeps any colons of its own.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] for a blank token, or a persona token
    /// missing its persona id or query text.
    pub fn parse(raw: &str) -> Result<Self, EngineError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(EngineError::Validation(
                "selection contains an empty query".to_string(),
            ));
        }

        let Some(rest) = raw.strip_prefix(PERSONA_PREFIX) else {
            return Ok(SelectionToken::Keyword(raw.to_string()));
        };

        let (persona_id, text) = rest.split_once(':').ok_or_else(|| {
            EngineError::Validation(format!("malformed persona query token '{raw}'"))
        })?;
        let persona_id = persona_id.trim();
        let text = text.trim();
        if persona_id.is_empty() || text.is_empty() {
            return Err(EngineError::Validation(format!(
                "persona query token '{raw}' needs a persona id and query text"
            )));
        }

        Ok(SelectionToken::Persona {
            persona_id: persona_id.to_string(),
            text: text.to_string(),
        })
    }
}

/// Splits raw tokens into pass-through keyword ids and persona query texts.
///
/// # Errors
///
/// Returns the first token parse failure.
pub fn partition_tokens<S: AsRef<str>>(
    tokens: &[S],
) -> Result<(Vec<String>, Vec<String>), EngineError> {
    let mut real_ids = Vec::new();
    let mut persona_texts = Vec::new();
    for token in tokens {
        match SelectionToken::parse(token.as_ref())? {
            SelectionToken::Keyword(id) => push_unique(&mut real_ids, id),
            SelectionToken::Persona { text, .. } => push_unique(&mut persona_texts, text),
        }
    }
    Ok((real_ids, persona_texts))
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

pub struct QueryMaterializer {
    backend: Arc<dyn VisibilityBackend>,
}

impl QueryMaterializer {
    #[must_use]
    pub fn new(backend: Arc<dyn VisibilityBackend>) -> Self {
        Self { backend }
    }

    /// Turns a selection into de-duplicated keyword ids.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Validation`] for an empty selection or bad token.
    /// - Any collaborator error from the batch keyword call, unchanged in kind.
    pub async fn materialize<S: AsRef<str>>(
        &self,
        project_id: &str,
        tokens: &[S],
    ) -> Result<Vec<String>, EngineError> {
        if tokens.is_empty() {
            return Err(EngineError::Validation(
                "select at least one query".to_string(),
            ));
        }
        let (mut ids, persona_texts) = partition_tokens(tokens)?;

        if !persona_texts.is_empty() {
            let created = self.materialize_texts(project_id, &persona_texts).await?;
            let mut seen: HashSet<String> = ids.iter().cloned().collect();
            for id in created {
                if seen.insert(id.clone()) {
                    ids.push(id);
                }
            }
        }

        Ok(ids)
    }

    /// Persists free-text queries as keywords in one batch and returns their ids.
    ///
    /// # Errors
    ///
    /// Propagates the collaborator failure, or [`EngineError::Rejected`] if the
    /// collaborator returned fewer keywords than it was given.
    pub async fn materialize_texts(
        &self,
        project_id: &str,
        texts: &[String],
    ) -> Result<Vec<String>, EngineError> {
        let keywords = self
            .backend
            .create_keywords_batch(project_id, texts)
            .await
            .map_err(|e| {
                tracing::warn!(project_id, count = texts.len(), error = %e, "materializer: keyword batch failed");
                EngineError::from(e)
            })?;

        if keywords.len() < texts.len() {
            return Err(EngineError::Rejected(format!(
                "keyword batch returned {} of {} keywords",
                keywords.len(),
                texts.len()
            )));
        }

        tracing::debug!(
            project_id,
            created = keywords.len(),
            "materializer: persisted virtual queries"
        );
        Ok(keywords.into_iter().map(|k| k.id).collect())
    }
}
