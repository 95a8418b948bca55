//! Greenlight Runtime - the streaming conversation loop.
//!
//! Drives a multi-turn exchange with the model provider: streams
//! partial output to the caller as it arrives, executes read tools
//! inline, and intercepts write tools by handing them to the approval
//! manager instead of executing them. The human decision is never
//! awaited inside the loop: a proposal is created, a synthetic
//! "awaiting approval" result is fed back to the model, and the turn
//! completes naturally. The decision arrives later as an independent
//! request against the approval manager.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod config;
mod conversation;
mod error;
mod session;

pub use config::LoopConfig;
pub use conversation::ConversationLoop;
pub use error::{RuntimeError, RuntimeResult};
pub use session::{Session, TurnRecord};
