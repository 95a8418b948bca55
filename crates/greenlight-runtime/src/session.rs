//! Conversation session state.

use greenlight_core::{ConversationId, MessageId};
use greenlight_llm::{Message, ToolCall};

/// A persisted assistant turn: final content plus every tool invocation
/// the turn made, keyed by the message ID minted before streaming
/// started.
#[derive(Debug, Clone)]
pub struct TurnRecord {
    /// The turn's message ID.
    pub message_id: MessageId,
    /// Final assistant text.
    pub content: String,
    /// All tool invocations observed during the turn.
    pub tool_calls: Vec<ToolCall>,
}

/// The in-memory conversation context the loop reads and appends to.
#[derive(Debug)]
pub struct Session {
    /// Unique conversation identifier.
    pub conversation_id: ConversationId,
    /// System prompt for this conversation.
    pub system_prompt: String,
    /// Conversation messages, in model wire order.
    pub messages: Vec<Message>,
    /// Completed assistant turns.
    pub turns: Vec<TurnRecord>,
}

impl Session {
    /// Create a new session.
    #[must_use]
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self::with_id(ConversationId::new(), system_prompt)
    }

    /// Create a session with a specific conversation ID.
    #[must_use]
    pub fn with_id(conversation_id: ConversationId, system_prompt: impl Into<String>) -> Self {
        Self {
            conversation_id,
            system_prompt: system_prompt.into(),
            messages: Vec::new(),
            turns: Vec::new(),
        }
    }

    /// Append a message to the conversation context.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Record a completed turn.
    pub fn record_turn(&mut self, turn: TurnRecord) {
        self.turns.push(turn);
    }

    /// The most recent completed turn, if any.
    #[must_use]
    pub fn last_turn(&self) -> Option<&TurnRecord> {
        self.turns.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_accumulates_messages() {
        let mut session = Session::new("be helpful");
        session.push(Message::user("hi"));
        session.push(Message::assistant("hello"));
        assert_eq!(session.messages.len(), 2);
        assert!(session.last_turn().is_none());
    }

    #[test]
    fn test_record_turn() {
        let mut session = Session::new("be helpful");
        let id = MessageId::new();
        session.record_turn(TurnRecord {
            message_id: id.clone(),
            content: "done".to_string(),
            tool_calls: Vec::new(),
        });
        assert_eq!(session.last_turn().map(|t| t.message_id.clone()), Some(id));
    }
}
