//! Greenlight Core - Foundation types for the approval-gated action core.
//!
//! This crate provides:
//! - Identifier newtypes shared across the workspace
//! - The `Timestamp` wrapper used on every persisted record
//! - The tool classification vocabulary (`ToolCategory`, `PreviewField`)

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;
pub mod types;

pub use types::{
    ConversationId, MessageId, PreviewField, ProposalId, Timestamp, ToolCategory,
};
