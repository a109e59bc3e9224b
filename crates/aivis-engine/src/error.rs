use aivis_core::CoreError;
use thiserror::Error;

/// Failure reported by a collaborator behind [`crate::VisibilityBackend`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PortError {
    /// Network failure, timeout, or 5xx from the collaborator.
    #[error("collaborator unavailable: {0}")]
    Transient(String),

    /// The session or token was rejected.
    #[error("unauthorized")]
    Unauthorized,

    #[error("not found: {0}")]
    NotFound(String),

    /// Plan-tier gate enforced by the collaborator.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The collaborator refused the request as invalid.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The response could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// A conditional write lost to a concurrent writer.
    #[error("conflict: {0}")]
    Conflict(String),
}

pub type PortResult<T> = Result<T, PortError>;

/// Errors returned by engine operations.
///
/// The engine never retries. `Transient` failures are left to the caller,
/// whose next manual run or the next scheduler tick is the retry.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Rejected before any collaborator call was made.
    #[error("validation error: {0}")]
    Validation(String),

    /// The caller's plan tier does not include the feature.
    #[error("{feature} requires an upgraded plan")]
    Quota { feature: String },

    #[error("transient failure: {0}")]
    Transient(String),

    /// Propagated unchanged so the host can send the user to re-authenticate.
    #[error("authentication required")]
    Auth,

    #[error("not found: {0}")]
    NotFound(String),

    /// The batch came back without a result for every (query, provider) pair.
    #[error("incomplete check batch: expected {expected} results, received {received}")]
    IncompleteBatch { expected: usize, received: usize },

    #[error("backend rejected request: {0}")]
    Rejected(String),

    #[error("conflicting update: {0}")]
    Conflict(String),
}

impl EngineError {
    /// True for failures a caller may reasonably retry later.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::Transient(_) | EngineError::IncompleteBatch { .. }
        )
    }
}

impl From<PortError> for EngineError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::Transient(msg) => EngineError::Transient(msg),
            PortError::Unauthorized => EngineError::Auth,
            PortError::NotFound(what) => EngineError::NotFound(what),
            PortError::QuotaExceeded(feature) => EngineError::Quota { feature },
            PortError::Rejected(msg) => EngineError::Rejected(msg),
            PortError::Malformed(msg) => {
                EngineError::Transient(format!("malformed collaborator response: {msg}"))
            }
            PortError::Conflict(msg) => EngineError::Conflict(msg),
        }
    }
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::TierTooLow { feature } => EngineError::Quota {
                feature: feature.to_string(),
            },
            other => EngineError::Validation(other.to_string()),
        }
    }
}
