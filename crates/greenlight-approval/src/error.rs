//! Approval manager error types.

use thiserror::Error;

/// Errors that can occur while managing approvals.
#[derive(Debug, Error)]
pub enum ApprovalError {
    /// Registry error: unknown tool or malformed arguments.
    #[error(transparent)]
    Tool(#[from] greenlight_tools::ToolError),

    /// Lifecycle error: illegal transition, missing row, or duplicate
    /// idempotency key.
    #[error(transparent)]
    Proposal(#[from] greenlight_proposals::ProposalError),

    /// The named tool is read-only; read tools execute inline and are
    /// never proposed.
    #[error("not a write tool: {name}")]
    NotAWriteTool {
        /// The read-only tool name.
        name: String,
    },
}

/// Result type for approval operations.
pub type ApprovalResult<T> = Result<T, ApprovalError>;
