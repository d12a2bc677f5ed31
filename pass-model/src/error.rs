//! Error types for the entity model.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while encoding, decoding or registering entities.
#[derive(Debug, Error)]
pub enum ModelError {
    /// An entity could not be written as a wire document.
    #[error("encode error: {0}")]
    Encode(String),

    /// A wire document could not be read as an entity.
    #[error("decode error: {0}")]
    Decode(String),

    /// No binding is registered for the type tag.
    #[error("unknown entity type: {0}")]
    UnknownType(String),

    /// The type tag cannot be used (empty, or the abstract base type).
    #[error("invalid entity type: {0}")]
    InvalidType(String),
}
