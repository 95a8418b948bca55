//! LLM-related error types.

use thiserror::Error;

/// Errors that can occur with LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The provider request failed.
    #[error("provider request failed: {0}")]
    RequestFailed(String),

    /// The provider returned a response we could not interpret.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// The stream broke mid-completion.
    #[error("streaming error: {0}")]
    StreamingError(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Result type for LLM operations.
pub type LlmResult<T> = Result<T, LlmError>;
