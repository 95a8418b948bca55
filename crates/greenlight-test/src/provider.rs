//! Scripted model provider.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use greenlight_llm::{
    LlmProvider, LlmResult, LlmToolDefinition, Message, StreamBox, StreamEvent,
};

/// A provider that plays back a fixed sequence of stream events for
/// each `stream` call, in the order the turns were queued.
///
/// Once the script runs out, further calls yield an immediate `Done`
/// (the model "says nothing"), which terminates the loop.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    turns: Mutex<VecDeque<Vec<StreamEvent>>>,
}

impl ScriptedProvider {
    /// Create a provider with no scripted turns.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider from a list of turn scripts.
    #[must_use]
    pub fn with_turns(turns: Vec<Vec<StreamEvent>>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
        }
    }

    /// Queue one more turn script.
    pub fn push_turn(&self, events: Vec<StreamEvent>) {
        self.turns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(events);
    }

    /// Number of scripted turns not yet consumed.
    #[must_use]
    pub fn remaining_turns(&self) -> usize {
        self.turns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// A turn that streams `text` in two deltas and finishes.
    #[must_use]
    pub fn text_turn(text: &str) -> Vec<StreamEvent> {
        let mid = text.len() / 2;
        let (head, tail) = text.split_at(mid);
        vec![
            StreamEvent::TextDelta(head.to_string()),
            StreamEvent::TextDelta(tail.to_string()),
            StreamEvent::Done,
        ]
    }

    /// A turn that invokes one tool, streaming its arguments in two
    /// fragments the loop must reassemble.
    #[must_use]
    pub fn tool_call_turn(call_id: &str, tool_name: &str, args: &Value) -> Vec<StreamEvent> {
        let rendered = args.to_string();
        let mid = rendered.len() / 2;
        let (head, tail) = rendered.split_at(mid);
        vec![
            StreamEvent::ToolCallStart {
                id: call_id.to_string(),
                name: tool_name.to_string(),
            },
            StreamEvent::ToolCallDelta {
                id: call_id.to_string(),
                args_delta: head.to_string(),
            },
            StreamEvent::ToolCallDelta {
                id: call_id.to_string(),
                args_delta: tail.to_string(),
            },
            StreamEvent::ToolCallEnd {
                id: call_id.to_string(),
            },
            StreamEvent::Done,
        ]
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }

    async fn stream(
        &self,
        _messages: &[Message],
        _tools: &[LlmToolDefinition],
        _system: &str,
    ) -> LlmResult<StreamBox> {
        let events = self
            .turns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| vec![StreamEvent::Done]);
        Ok(Box::pin(futures::stream::iter(
            events.into_iter().map(Ok),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    #[tokio::test]
    async fn test_turns_play_back_in_order() {
        let provider = ScriptedProvider::with_turns(vec![
            ScriptedProvider::text_turn("first"),
            ScriptedProvider::text_turn("second"),
        ]);

        let mut stream = provider.stream(&[], &[], "").await.unwrap();
        let mut text = String::new();
        while let Some(Ok(event)) = stream.next().await {
            if let StreamEvent::TextDelta(delta) = event {
                text.push_str(&delta);
            }
        }
        assert_eq!(text, "first");
        assert_eq!(provider.remaining_turns(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_script_yields_done() {
        let provider = ScriptedProvider::new();
        let mut stream = provider.stream(&[], &[], "").await.unwrap();
        let event = stream.next().await.unwrap().unwrap();
        assert!(matches!(event, StreamEvent::Done));
    }

    #[test]
    fn test_tool_call_turn_splits_arguments() {
        let events =
            ScriptedProvider::tool_call_turn("c1", "create_issue", &json!({"title": "x"}));
        let deltas: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::ToolCallDelta { args_delta, .. } => Some(args_delta.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas.concat(), "{\"title\":\"x\"}");
    }
}
