//! Greenlight Tools - the callable-operation catalog.
//!
//! Provides the [`Tool`] trait, the [`ToolRegistry`] that classifies
//! operations as read-only or approval-required and generates approval
//! previews, and the demo tool set over the pluggable external-system
//! clients ([`IssueTracker`], [`CodeHost`]).
//!
//! Read tools execute synchronously inside the conversation loop; write
//! tools are never invoked by the loop, only by the approval manager
//! after a human decision.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod issues;
mod memory;
mod outcome;
mod registry;
mod repository;
mod system_prompt;
mod tracker;

pub use issues::{
    AddCommentTool, BulkUpdateIssuesTool, CreateIssueTool, DeleteIssueTool, GetIssueTool,
    SearchIssuesTool, UpdateIssueTool,
};
pub use memory::{InMemoryCodeHost, InMemoryIssueTracker};
pub use outcome::HandlerOutcome;
pub use registry::ToolRegistry;
pub use repository::CreateBranchTool;
pub use system_prompt::build_system_prompt;
pub use tracker::{
    Branch, CodeHost, Comment, Issue, IssueDraft, IssuePatch, IssueStatus, IssueTracker,
    TrackerError, TrackerResult,
};

use greenlight_core::{PreviewField, ToolCategory};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Tool-layer errors: unknown names and malformed arguments.
///
/// Surfaced immediately to the caller, never silently dropped. Inside
/// the conversation loop they become error tool results fed back to the
/// model; at proposal creation they abort the proposal.
#[derive(Debug, Error)]
pub enum ToolError {
    /// No tool registered under this name.
    #[error("unknown tool: {name}")]
    UnknownTool {
        /// The requested name.
        name: String,
    },

    /// Arguments do not match the tool's schema.
    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments {
        /// The tool whose schema was violated.
        tool: String,
        /// What was wrong.
        reason: String,
    },
}

/// Result type for tool-layer operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Shared context available to all tool handlers.
///
/// Carries the pluggable clients for the external systems the tools
/// mutate. Handlers perform their own I/O through these; the
/// idempotency gate is the core's responsibility, not theirs.
#[derive(Clone)]
pub struct ToolContext {
    /// Issue tracker client.
    pub tracker: Arc<dyn IssueTracker>,
    /// Code-hosting platform client.
    pub code_host: Arc<dyn CodeHost>,
}

impl ToolContext {
    /// Create a new tool context.
    #[must_use]
    pub fn new(tracker: Arc<dyn IssueTracker>, code_host: Arc<dyn CodeHost>) -> Self {
        Self { tracker, code_host }
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext").finish_non_exhaustive()
    }
}

/// A callable operation in the catalog.
///
/// Each tool owns its own argument validation: `preview` and `execute`
/// both parse the opaque argument payload against the tool's schema and
/// reject what does not fit.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Tool name, as exposed to the model.
    fn name(&self) -> &'static str;

    /// Human-readable description for the model.
    fn description(&self) -> &'static str;

    /// JSON schema for tool input parameters.
    fn input_schema(&self) -> Value;

    /// Which external system family this tool touches.
    fn category(&self) -> ToolCategory;

    /// Whether this tool mutates external state and therefore requires
    /// human approval before execution.
    fn requires_approval(&self) -> bool;

    /// Whether the mutation is destructive (deletes data).
    fn destructive(&self) -> bool {
        false
    }

    /// Structured before/after diff for the approval card.
    ///
    /// Pure formatting over the argument payload; read tools have no
    /// diff and return an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArguments`] when the payload does not
    /// match the schema.
    fn preview(&self, args: &Value) -> ToolResult<Vec<PreviewField>> {
        let _ = args;
        Ok(Vec::new())
    }

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> HandlerOutcome;
}
