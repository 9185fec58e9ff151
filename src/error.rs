use thiserror::Error;

use crate::db::DatabaseError;

/// Failure taxonomy for a single relayed event.
///
/// `Network` and `Persistence` are transient and eligible for the fixed
/// retry budget; everything else is terminal for the event but never fatal
/// to the process.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("network error: {0}")]
    Network(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] DatabaseError),

    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("no link resolves for event: {0}")]
    LinkNotFound(String),

    #[error("unsupported content: {0}")]
    Unsupported(String),
}

impl RelayError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, RelayError::Network(_) | RelayError::Persistence(_))
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        RelayError::Network(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
