//! Prelude module - commonly used types for convenient import.
//!
//! Use `use greenlight_core::prelude::*;` to import all essential types.

pub use crate::types::{
    ConversationId, MessageId, PreviewField, ProposalId, Timestamp, ToolCategory,
};
