//! Greenlight Events - the push-transport event contract and bus.
//!
//! This crate provides:
//! - [`ConversationEvent`], the wire events a turn emits to its client
//!   (one JSON object per line when serialized)
//! - [`EventBus`], a broadcast bus carrying decision-path state changes
//!   (`action_update`) to still-open streams
//!
//! The streaming turn path and the decision-endpoint path are
//! independent requests; the bus is how an approval resolved out of
//! band reaches a client that still has the original stream open. A
//! client that reconnected instead re-fetches proposals by conversation
//! ID and does not need the bus.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod bus;
mod event;

pub use bus::{EventBus, EventEnvelope, EventReceiver, DEFAULT_CHANNEL_CAPACITY};
pub use event::{ConversationEvent, ToolCallOutcome, ToolCallRef};
