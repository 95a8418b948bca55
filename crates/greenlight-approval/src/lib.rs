//! Greenlight Approval - orchestrates the proposal lifecycle.
//!
//! The [`ApprovalManager`] sits between the conversation loop (which
//! creates proposals for intercepted write tools) and the decision
//! endpoints (which approve, decline, execute, and retry them). It owns
//! the description and summary templates, invokes tool handlers at most
//! once per execution, and publishes `action_update` events for every
//! state change.
//!
//! # Decision flow
//!
//! 1. The loop calls [`ApprovalManager::create_proposal`] for a write
//!    tool the model requested; the turn completes without waiting.
//! 2. A decision arrives later as an independent request:
//!    [`approve`](ApprovalManager::approve) /
//!    [`decline`](ApprovalManager::decline) /
//!    [`execute`](ApprovalManager::execute) /
//!    [`retry`](ApprovalManager::retry).
//! 3. Execution gates through the state machine's idempotent
//!    `mark_executing`, so duplicate requests never double-invoke a
//!    handler.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod manager;
mod summary;

pub use error::{ApprovalError, ApprovalResult};
pub use manager::{ApprovalManager, ProposalRequest};
pub use summary::{describe_action, summarize_partial, summarize_success};
