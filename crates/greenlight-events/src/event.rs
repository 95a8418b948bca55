//! Wire event types for the conversation push transport.

use greenlight_core::{MessageId, ProposalId};
use greenlight_proposals::{ActionProposal, ProposalState};
use serde::{Deserialize, Serialize};

/// Identity of a tool call as surfaced to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRef {
    /// Call ID assigned by the model.
    pub id: String,
    /// Tool name.
    pub name: String,
}

/// A completed read-tool call with its result text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallOutcome {
    /// Call ID assigned by the model.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Result content fed back to the model.
    pub result: String,
}

/// One event on the conversation push transport.
///
/// Serialized as a JSON object with a `type` tag; a transport writes
/// one object per line, in creation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ConversationEvent {
    /// Incremental assistant text.
    Delta {
        /// The text fragment.
        content: String,
    },
    /// A read tool started executing.
    ToolCallStart {
        /// The call being executed.
        tool_call: ToolCallRef,
    },
    /// A read tool finished executing.
    ToolCallResult {
        /// The call and its result.
        tool_call: ToolCallOutcome,
    },
    /// A write tool was intercepted and proposed for approval.
    ActionProposed {
        /// The full proposal, for rendering an approval card.
        proposal: ActionProposal,
    },
    /// A previously proposed action changed state.
    ActionUpdate {
        /// The proposal that changed.
        proposal_id: ProposalId,
        /// Its new state.
        state: ProposalState,
        /// Outcome summary, when succeeded.
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<String>,
        /// Resource link, when known.
        #[serde(skip_serializing_if = "Option::is_none")]
        result_url: Option<String>,
        /// Failure message, when failed.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Terminal: the turn completed.
    Done {
        /// The assistant message this turn produced.
        message_id: MessageId,
    },
    /// Terminal: the turn failed.
    Error {
        /// Human-readable failure description.
        error: String,
    },
}

impl ConversationEvent {
    /// Build an `action_update` from the latest persisted row.
    #[must_use]
    pub fn action_update(proposal: &ActionProposal) -> Self {
        Self::ActionUpdate {
            proposal_id: proposal.id.clone(),
            state: proposal.state,
            result: proposal.result.clone(),
            result_url: proposal.result_url.clone(),
            error: proposal.error.clone(),
        }
    }

    /// The wire tag of this event.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Delta { .. } => "delta",
            Self::ToolCallStart { .. } => "tool_call_start",
            Self::ToolCallResult { .. } => "tool_call_result",
            Self::ActionProposed { .. } => "action_proposed",
            Self::ActionUpdate { .. } => "action_update",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }

    /// Whether this event terminates the stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }

    /// Serialize to one line of the push transport.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json` error if serialization fails.
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_wire_shape() {
        let event = ConversationEvent::Delta {
            content: "Hello".to_string(),
        };
        let json: serde_json::Value =
            serde_json::from_str(&event.to_json_line().unwrap()).unwrap();
        assert_eq!(json["type"], "delta");
        assert_eq!(json["content"], "Hello");
    }

    #[test]
    fn test_tool_call_events_use_camel_case_keys() {
        let event = ConversationEvent::ToolCallStart {
            tool_call: ToolCallRef {
                id: "c1".to_string(),
                name: "search_issues".to_string(),
            },
        };
        let json: serde_json::Value =
            serde_json::from_str(&event.to_json_line().unwrap()).unwrap();
        assert_eq!(json["type"], "tool_call_start");
        assert_eq!(json["toolCall"]["id"], "c1");
        assert_eq!(json["toolCall"]["name"], "search_issues");
    }

    #[test]
    fn test_done_wire_shape() {
        let id = MessageId::new();
        let event = ConversationEvent::Done {
            message_id: id.clone(),
        };
        let json: serde_json::Value =
            serde_json::from_str(&event.to_json_line().unwrap()).unwrap();
        assert_eq!(json["type"], "done");
        assert_eq!(json["messageId"], serde_json::to_value(&id).unwrap());
    }

    #[test]
    fn test_action_update_omits_empty_outcome_fields() {
        let event = ConversationEvent::ActionUpdate {
            proposal_id: ProposalId::new(),
            state: ProposalState::Approved,
            result: None,
            result_url: None,
            error: None,
        };
        let json: serde_json::Value =
            serde_json::from_str(&event.to_json_line().unwrap()).unwrap();
        assert_eq!(json["type"], "action_update");
        assert_eq!(json["state"], "approved");
        assert!(json.get("result").is_none());
        assert!(json.get("resultUrl").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_event_type_tags() {
        let event = ConversationEvent::Error {
            error: "boom".to_string(),
        };
        assert_eq!(event.event_type(), "error");
        assert!(event.is_terminal());
        assert!(!ConversationEvent::Delta {
            content: String::new()
        }
        .is_terminal());
    }
}
