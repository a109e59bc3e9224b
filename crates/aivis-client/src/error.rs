use aivis_engine::PortError;
use thiserror::Error;

/// Errors returned by the backend REST client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status.
    #[error("backend returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid backend URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl From<ClientError> for PortError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Http(e) => PortError::Transient(e.to_string()),
            ClientError::Api { status, message } => match status {
                401 => PortError::Unauthorized,
                402 | 403 => PortError::QuotaExceeded(message),
                404 => PortError::NotFound(message),
                409 | 412 => PortError::Conflict(message),
                408 | 429 | 500..=599 => PortError::Transient(format!("{status}: {message}")),
                _ => PortError::Rejected(message),
            },
            ClientError::Deserialize { context, source } => {
                PortError::Malformed(format!("{context}: {source}"))
            }
            ClientError::InvalidBaseUrl { url, reason } => {
                PortError::Rejected(format!("invalid backend URL '{url}': {reason}"))
            }
        }
    }
}
