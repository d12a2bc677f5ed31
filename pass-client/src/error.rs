//! Error types for the repository and index clients.

use pass_model::ModelError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the CRUD, crawler, search and facade clients.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Invalid caller arguments. Always raised before any request is sent.
    #[error("invalid argument: {0}")]
    Validation(String),

    /// The concurrency token no longer matches the repository (HTTP 412).
    /// Re-read the entity and retry.
    #[error("update conflict on {id}: {message}")]
    Conflict { id: String, message: String },

    /// A non-success response from either backend, or a transport failure
    /// (no status).
    #[error("request failed{}: {message}", status_suffix(.status))]
    Request { status: Option<u16>, message: String },

    /// The resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A single-result search matched more than one document.
    #[error("{count} {entity_type} records matched {attribute}, expected at most one")]
    MultipleMatches {
        entity_type: String,
        attribute: String,
        count: usize,
    },

    /// Entity encoding, decoding or type lookup failed.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" with status {s}")).unwrap_or_default()
}

impl ClientError {
    pub(crate) fn transport(context: &str, err: reqwest::Error) -> Self {
        ClientError::Request {
            status: err.status().map(|s| s.as_u16()),
            message: format!("{context}: {err}"),
        }
    }

    pub(crate) fn status(status: u16, message: impl Into<String>) -> Self {
        ClientError::Request {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Returns true if this error is an update conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ClientError::Conflict { .. })
    }

    /// Returns true if this error is a caller argument error.
    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation(_))
    }

    /// Returns the HTTP status carried by a request error.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ClientError::Request { status, .. } => *status,
            _ => None,
        }
    }
}
