//! The conversation loop: stream, intercept, resume.

use futures::StreamExt;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use greenlight_approval::{ApprovalError, ApprovalManager, ProposalRequest};
use greenlight_core::MessageId;
use greenlight_events::{ConversationEvent, ToolCallOutcome, ToolCallRef};
use greenlight_llm::{
    LlmError, LlmProvider, Message, StreamEvent, ToolCall, ToolCallResult,
};
use greenlight_proposals::ActionProposal;
use greenlight_tools::{HandlerOutcome, ToolContext, ToolError, ToolRegistry};

use crate::config::LoopConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::session::{Session, TurnRecord};

/// The in-progress turn: accumulated assistant text and the tool
/// invocations observed so far. Discarded once the turn's terminal
/// message is recorded.
#[derive(Debug, Default)]
struct TurnAccumulator {
    text: String,
    tool_calls: Vec<ToolCall>,
}

/// Drives one conversation turn at a time against the model provider.
///
/// Both the registry and the approval manager are injected by
/// reference; the loop never executes a write tool itself.
pub struct ConversationLoop<P: LlmProvider> {
    llm: Arc<P>,
    registry: Arc<ToolRegistry>,
    approvals: Arc<ApprovalManager>,
    tool_ctx: ToolContext,
    config: LoopConfig,
}

impl<P: LlmProvider> ConversationLoop<P> {
    /// Create a loop over the given provider, registry, and manager.
    #[must_use]
    pub fn new(
        llm: Arc<P>,
        registry: Arc<ToolRegistry>,
        approvals: Arc<ApprovalManager>,
        tool_ctx: ToolContext,
        config: LoopConfig,
    ) -> Self {
        Self {
            llm,
            registry,
            approvals,
            tool_ctx,
            config,
        }
    }

    /// Run a single turn, forwarding events to `events` as they happen.
    ///
    /// The message ID is minted before streaming starts so proposals
    /// created mid-stream are already tagged with it. A closed `events`
    /// receiver (disconnected client) does not cancel the turn: pending
    /// proposals stay pending and the transcript still completes.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails or a proposal cannot be
    /// persisted; a terminal `error` event is emitted first.
    pub async fn run_turn(
        &self,
        session: &mut Session,
        input: &str,
        events: &mpsc::Sender<ConversationEvent>,
    ) -> RuntimeResult<MessageId> {
        let message_id = MessageId::new();
        session.push(Message::user(input));

        let tools = self.registry.definitions();
        let mut turn = TurnAccumulator::default();
        let mut iterations = 0;

        loop {
            iterations += 1;

            let mut stream = match self
                .llm
                .stream(&session.messages, &tools, &session.system_prompt)
                .await
            {
                Ok(stream) => stream,
                Err(e) => {
                    self.emit(events, ConversationEvent::Error {
                        error: e.to_string(),
                    })
                    .await;
                    return Err(e.into());
                },
            };

            let mut text = String::new();
            let mut calls: Vec<ToolCall> = Vec::new();
            // Tool call arguments arrive as fragments; reassemble them
            // per call ID before parsing.
            let mut arg_buffers: HashMap<String, String> = HashMap::new();

            while let Some(event) = stream.next().await {
                match event {
                    Ok(StreamEvent::TextDelta(delta)) => {
                        // Forward immediately; no buffer-then-flush.
                        self.emit(events, ConversationEvent::Delta {
                            content: delta.clone(),
                        })
                        .await;
                        text.push_str(&delta);
                    },
                    Ok(StreamEvent::ToolCallStart { id, name }) => {
                        arg_buffers.insert(id.clone(), String::new());
                        calls.push(ToolCall::new(id, name));
                    },
                    Ok(StreamEvent::ToolCallDelta { id, args_delta }) => {
                        arg_buffers.entry(id).or_default().push_str(&args_delta);
                    },
                    Ok(StreamEvent::ToolCallEnd { id }) => {
                        let Some(buffer) = arg_buffers.remove(&id) else {
                            continue;
                        };
                        if buffer.trim().is_empty() {
                            continue;
                        }
                        match serde_json::from_str(&buffer) {
                            Ok(args) => {
                                if let Some(call) = calls.iter_mut().find(|c| c.id == id) {
                                    call.arguments = args;
                                }
                            },
                            Err(e) => {
                                // Leave the default empty arguments; the
                                // tool's own validation rejects them and
                                // the model hears about it.
                                warn!(call = %id, error = %e, "unparseable tool arguments");
                            },
                        }
                    },
                    Ok(StreamEvent::Done) => break,
                    Ok(StreamEvent::Error(message)) => {
                        self.emit(events, ConversationEvent::Error {
                            error: message.clone(),
                        })
                        .await;
                        return Err(RuntimeError::Llm(LlmError::StreamingError(message)));
                    },
                    Err(e) => {
                        self.emit(events, ConversationEvent::Error {
                            error: e.to_string(),
                        })
                        .await;
                        return Err(e.into());
                    },
                }
            }

            if !text.is_empty() {
                if !turn.text.is_empty() {
                    turn.text.push_str("\n\n");
                }
                turn.text.push_str(&text);
            }

            // No tool invoked this iteration: the turn is complete.
            if calls.is_empty() {
                break;
            }

            session.push(Message::assistant_with_tools(calls.clone()));
            turn.tool_calls.extend(calls.iter().cloned());

            for call in &calls {
                let result = self
                    .handle_tool_call(session, &message_id, call, events)
                    .await?;
                session.push(Message::tool_result(result));
            }

            if iterations >= self.config.max_iterations {
                warn!(
                    cap = self.config.max_iterations,
                    "iteration cap reached; ending turn"
                );
                break;
            }
        }

        if !turn.text.is_empty() {
            session.push(Message::assistant(&turn.text));
        }
        session.record_turn(TurnRecord {
            message_id: message_id.clone(),
            content: turn.text,
            tool_calls: turn.tool_calls,
        });

        self.emit(events, ConversationEvent::Done {
            message_id: message_id.clone(),
        })
        .await;
        Ok(message_id)
    }

    /// Dispatch one tool call: read tools execute inline, write tools
    /// become proposals, registry errors are fed back to the model.
    async fn handle_tool_call(
        &self,
        session: &Session,
        message_id: &MessageId,
        call: &ToolCall,
        events: &mpsc::Sender<ConversationEvent>,
    ) -> RuntimeResult<ToolCallResult> {
        let Some(tool) = self.registry.get(&call.name) else {
            // Unknown tool: resolved locally as an error tool result so
            // the model can recover in conversation; never crashes the
            // turn and never silently ignored.
            let error = ToolError::UnknownTool {
                name: call.name.clone(),
            };
            debug!(call = %call.id, %error, "unknown tool requested");
            return Ok(ToolCallResult::error(&call.id, error.to_string()));
        };

        if tool.requires_approval() {
            return self.propose_action(session, message_id, call, events).await;
        }

        self.emit(events, ConversationEvent::ToolCallStart {
            tool_call: ToolCallRef {
                id: call.id.clone(),
                name: call.name.clone(),
            },
        })
        .await;

        let outcome = tool.execute(call.arguments.clone(), &self.tool_ctx).await;
        let result = match outcome {
            HandlerOutcome::Success { result, .. } => {
                ToolCallResult::success(&call.id, result.to_string())
            },
            HandlerOutcome::Partial { detail, .. } => {
                ToolCallResult::success(&call.id, detail.to_string())
            },
            HandlerOutcome::Failure { message } => ToolCallResult::error(&call.id, message),
        };

        self.emit(events, ConversationEvent::ToolCallResult {
            tool_call: ToolCallOutcome {
                id: call.id.clone(),
                name: call.name.clone(),
                result: result.content.clone(),
            },
        })
        .await;
        Ok(result)
    }

    /// Intercept a write tool: create a proposal and feed the model a
    /// synthetic result so its turn completes without blocking on the
    /// human decision.
    async fn propose_action(
        &self,
        session: &Session,
        message_id: &MessageId,
        call: &ToolCall,
        events: &mpsc::Sender<ConversationEvent>,
    ) -> RuntimeResult<ToolCallResult> {
        let request = ProposalRequest {
            conversation_id: session.conversation_id.clone(),
            message_id: message_id.clone(),
            tool_name: call.name.clone(),
            tool_arguments: call.arguments.clone(),
        };

        match self.approvals.create_proposal(request).await {
            Ok(proposal) => {
                self.emit(events, ConversationEvent::ActionProposed {
                    proposal: proposal.clone(),
                })
                .await;
                Ok(ToolCallResult::success(
                    &call.id,
                    synthetic_approval_result(&proposal),
                ))
            },
            // Malformed arguments are the model's to fix; feed the
            // error back instead of failing the turn.
            Err(e @ (ApprovalError::Tool(_) | ApprovalError::NotAWriteTool { .. })) => {
                Ok(ToolCallResult::error(&call.id, e.to_string()))
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn emit(&self, events: &mpsc::Sender<ConversationEvent>, event: ConversationEvent) {
        // A dropped receiver means the client disconnected; the turn
        // and its proposals carry on regardless.
        let _ = events.send(event).await;
    }
}

impl<P: LlmProvider> std::fmt::Debug for ConversationLoop<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationLoop")
            .field("provider", &self.llm.name())
            .field("model", &self.llm.model())
            .finish_non_exhaustive()
    }
}

/// The payload fed back to the model in place of real execution.
fn synthetic_approval_result(proposal: &ActionProposal) -> String {
    json!({
        "status": "proposed_for_approval",
        "proposalId": proposal.id,
        "description": proposal.description,
        "note": "This action was proposed to the user and is awaiting their \
                 decision. It has not executed. Finish your reply without \
                 assuming an outcome.",
    })
    .to_string()
}
