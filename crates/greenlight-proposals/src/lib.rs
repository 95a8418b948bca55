//! Greenlight Proposals - the durable action proposal lifecycle.
//!
//! This crate provides:
//! - The persisted [`ActionProposal`] record and its [`ProposalState`]
//! - The [`ActionStateMachine`] enforcing the legal transition table
//! - The [`ProposalStore`] boundary with a transactional per-row
//!   compare-and-swap, plus the in-memory reference implementation
//!
//! # State machine
//!
//! ```text
//! proposed -> approved -> executing -> succeeded (terminal)
//!                                   -> failed -> executing (retry)
//! proposed -> declined (terminal)
//! ```
//!
//! No other edges are legal. `mark_executing` is idempotent: a row
//! already `executing` or `succeeded` is returned unchanged, which is
//! what makes duplicate "approve" clicks safe. Rows are never deleted;
//! terminal states are the audit trail.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod idempotency;
mod machine;
mod proposal;
mod store;

pub use error::{ProposalError, ProposalResult};
pub use idempotency::derive_idempotency_key;
pub use machine::{ActionStateMachine, ExecutionGate, NewProposal};
pub use proposal::{ActionProposal, ProposalState};
pub use store::{MemoryProposalStore, ProposalPatch, ProposalStore, TransitionAttempt};
