//! Proposal lifecycle error types.

use crate::proposal::ProposalState;
use greenlight_core::ProposalId;
use thiserror::Error;

/// Errors that can occur in the proposal lifecycle.
#[derive(Debug, Error)]
pub enum ProposalError {
    /// No proposal with the given ID.
    #[error("proposal not found: {id}")]
    NotFound {
        /// The missing proposal ID.
        id: ProposalId,
    },

    /// An attempted state change from an illegal source state.
    ///
    /// Names the attempted edge; the row is left unchanged.
    #[error("invalid transition: cannot {attempted} from {from}")]
    InvalidTransition {
        /// The state the row was in.
        from: ProposalState,
        /// The operation that was attempted.
        attempted: &'static str,
    },

    /// A proposal with the same idempotency key already exists.
    #[error("duplicate idempotency key: {key}")]
    DuplicateIdempotencyKey {
        /// The colliding key.
        key: String,
    },

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Result type for proposal operations.
pub type ProposalResult<T> = Result<T, ProposalError>;
