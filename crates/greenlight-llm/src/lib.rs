//! Greenlight LLM - the language-model provider boundary.
//!
//! The model is treated as a black-box streaming completion service:
//! this crate defines the [`LlmProvider`] trait, the message and tool
//! types fed to it, and the [`StreamEvent`] fragments it yields back.
//! Concrete HTTP providers live outside the workspace and implement
//! [`LlmProvider`].

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod provider;
mod types;

pub use error::{LlmError, LlmResult};
pub use provider::{LlmProvider, StreamBox};
pub use types::{
    LlmToolDefinition, Message, MessageContent, MessageRole, StreamEvent, ToolCall,
    ToolCallResult,
};
