//! Test support for the greenlight workspace.
//!
//! Provides a scripted model provider that plays back fixed stream
//! events per turn, and a recording issue-tracker double for asserting
//! on handler invocation counts and injecting failures.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod provider;
mod trackers;

pub use provider::ScriptedProvider;
pub use trackers::RecordingTracker;
