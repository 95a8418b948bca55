//! Runtime error types.

use thiserror::Error;

/// Errors that can occur while driving a conversation turn.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The model provider failed.
    #[error("LLM error: {0}")]
    Llm(#[from] greenlight_llm::LlmError),

    /// The approval manager failed on a non-registry error (registry
    /// errors are resolved inside the loop and fed back to the model).
    #[error("approval error: {0}")]
    Approval(#[from] greenlight_approval::ApprovalError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
