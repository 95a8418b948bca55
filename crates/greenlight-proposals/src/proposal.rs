//! The persisted action proposal record.

use greenlight_core::{ConversationId, MessageId, PreviewField, ProposalId, Timestamp, ToolCategory};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Lifecycle state of an [`ActionProposal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalState {
    /// Awaiting a human decision.
    Proposed,
    /// Approved, not yet executing.
    Approved,
    /// Handler invocation in flight.
    Executing,
    /// Terminal: the action ran and produced an outcome.
    Succeeded,
    /// The handler failed; retryable.
    Failed,
    /// Terminal: the human declined the action.
    Declined,
}

impl ProposalState {
    /// Whether no further transitions are legal from this state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Declined)
    }
}

impl fmt::Display for ProposalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Proposed => "proposed",
            Self::Approved => "approved",
            Self::Executing => "executing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Declined => "declined",
        };
        write!(f, "{s}")
    }
}

/// A persisted record of a single write-tool invocation awaiting or
/// having received a human decision.
///
/// Created the instant the model requests a write tool; mutated only by
/// the [`ActionStateMachine`](crate::ActionStateMachine); never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionProposal {
    /// Globally unique identifier.
    pub id: ProposalId,
    /// Collision barrier for duplicate submission: derived from the
    /// conversation, tool name, argument payload, and creation instant.
    /// Unique across all proposals.
    pub idempotency_key: String,
    /// The conversation this proposal belongs to.
    pub conversation_id: ConversationId,
    /// The in-flight assistant turn that produced this proposal. Lets a
    /// client re-associate the proposal with the correct place in the
    /// transcript after reconnect.
    pub message_id: MessageId,
    /// Name of the write tool the model requested.
    pub tool_name: String,
    /// Opaque structured arguments as proposed by the model.
    pub tool_arguments: Value,
    /// External system family this action touches.
    pub category: ToolCategory,
    /// One-line human-readable summary of intent.
    pub description: String,
    /// Ordered before/after diff shown on the approval card.
    pub preview: Vec<PreviewField>,
    /// Current lifecycle state.
    pub state: ProposalState,
    /// Human-readable outcome summary, set on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Link to the created/updated resource, set on success when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    /// Human-readable failure message, set on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the proposal was created.
    pub created_at: Timestamp,
    /// When the proposal last changed state.
    pub updated_at: Timestamp,
}

impl ActionProposal {
    /// Whether this proposal can still receive a decision.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state == ProposalState::Proposed
    }
}

impl fmt::Display for ActionProposal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.id, self.state, self.description)
    }
}
