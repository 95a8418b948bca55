//! The approval manager.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use greenlight_core::{ConversationId, MessageId, ProposalId};
use greenlight_events::{ConversationEvent, EventBus};
use greenlight_proposals::{
    ActionProposal, ActionStateMachine, ExecutionGate, NewProposal, ProposalError, ProposalState,
    ProposalStore,
};
use greenlight_tools::{HandlerOutcome, ToolContext, ToolRegistry};

use crate::error::{ApprovalError, ApprovalResult};
use crate::summary::{describe_action, summarize_partial, summarize_success};

/// Context for proposing a write-tool invocation.
#[derive(Debug, Clone)]
pub struct ProposalRequest {
    /// The conversation the request came from.
    pub conversation_id: ConversationId,
    /// The in-flight assistant turn.
    pub message_id: MessageId,
    /// The write tool the model requested.
    pub tool_name: String,
    /// Arguments as proposed by the model.
    pub tool_arguments: Value,
}

/// Orchestrates proposal creation, decisions, and gated execution.
///
/// Holds the immutable tool registry by reference, drives all row
/// mutation through the [`ActionStateMachine`], and publishes an
/// `action_update` on the bus for every state change so a still-open
/// stream sees decisions resolve.
pub struct ApprovalManager {
    registry: Arc<ToolRegistry>,
    machine: ActionStateMachine,
    tool_ctx: ToolContext,
    bus: EventBus,
}

impl ApprovalManager {
    /// Create a manager over the given registry, store, and clients.
    #[must_use]
    pub fn new(
        registry: Arc<ToolRegistry>,
        store: Arc<dyn ProposalStore>,
        tool_ctx: ToolContext,
        bus: EventBus,
    ) -> Self {
        Self {
            registry,
            machine: ActionStateMachine::new(store),
            tool_ctx,
            bus,
        }
    }

    /// Propose a write-tool invocation for human review.
    ///
    /// Builds the description and preview from the registry and
    /// persists a row in state `proposed`. Does not execute anything.
    ///
    /// # Errors
    ///
    /// Returns a registry error for an unknown tool or malformed
    /// arguments, [`ApprovalError::NotAWriteTool`] for a read tool, or
    /// a lifecycle error if the same action was already proposed at the
    /// same instant.
    pub async fn create_proposal(
        &self,
        request: ProposalRequest,
    ) -> ApprovalResult<ActionProposal> {
        let tool = self.registry.lookup(&request.tool_name)?;
        if !tool.requires_approval() {
            return Err(ApprovalError::NotAWriteTool {
                name: request.tool_name,
            });
        }

        let preview = tool.preview(&request.tool_arguments)?;
        let description = describe_action(&request.tool_name, &request.tool_arguments);

        let proposal = self
            .machine
            .create_proposal(NewProposal {
                conversation_id: request.conversation_id,
                message_id: request.message_id,
                tool_name: request.tool_name,
                tool_arguments: request.tool_arguments,
                category: tool.category(),
                description,
                preview,
            })
            .await?;

        debug!(proposal = %proposal.id, "proposal created");
        Ok(proposal)
    }

    /// Approve a pending proposal. Transitions only; does not execute.
    ///
    /// Keeping approval separate from execution lets a client show
    /// "approved, starting..." before the handler runs; the two are
    /// composed by [`approve_and_execute`](Self::approve_and_execute)
    /// for single-click UX.
    ///
    /// # Errors
    ///
    /// Returns an invalid-transition error unless the proposal is
    /// `proposed`.
    pub async fn approve(&self, id: &ProposalId) -> ApprovalResult<ActionProposal> {
        let row = self.machine.approve(id).await?;
        self.publish_update(&row);
        Ok(row)
    }

    /// Decline a pending proposal. Terminal; not retryable.
    ///
    /// # Errors
    ///
    /// Returns an invalid-transition error unless the proposal is
    /// `proposed`.
    pub async fn decline(&self, id: &ProposalId) -> ApprovalResult<ActionProposal> {
        let row = self.machine.decline(id).await?;
        self.publish_update(&row);
        Ok(row)
    }

    /// Execute an approved (or failed, when retrying) proposal.
    ///
    /// Gates through the idempotent `mark_executing`: if the proposal
    /// is already executing or succeeded, the current row is returned
    /// without invoking the handler, which is what makes double-clicking
    /// "Approve" safe. Otherwise the tool handler runs exactly once and
    /// its tagged outcome decides the terminal state:
    ///
    /// - failure: `failed` with the message preserved for retry
    /// - partial: `succeeded` with a summary disclosing the split
    /// - success: `succeeded` with a tool-specific summary and URL
    ///
    /// # Errors
    ///
    /// Returns an invalid-transition error when the proposal is
    /// `proposed` or `declined`.
    pub async fn execute(&self, id: &ProposalId) -> ApprovalResult<ActionProposal> {
        let proposal = match self.machine.mark_executing(id).await? {
            ExecutionGate::Settled(row) => {
                debug!(proposal = %row.id, state = %row.state, "duplicate execute ignored");
                return Ok(row);
            },
            ExecutionGate::Entered(row) => {
                self.publish_update(&row);
                row
            },
        };

        let row = self.run_handler(&proposal).await?;
        self.publish_update(&row);
        Ok(row)
    }

    /// Retry a failed proposal.
    ///
    /// # Errors
    ///
    /// Returns an invalid-transition error naming the `retry` edge
    /// unless the proposal is currently `failed`.
    pub async fn retry(&self, id: &ProposalId) -> ApprovalResult<ActionProposal> {
        let row = self.machine.proposal(id).await?;
        if row.state != ProposalState::Failed {
            return Err(ApprovalError::Proposal(ProposalError::InvalidTransition {
                from: row.state,
                attempted: "retry",
            }));
        }
        self.execute(id).await
    }

    /// Approve and immediately execute, as two state-machine-checked
    /// steps. The `approved` intermediate state is never skipped.
    ///
    /// # Errors
    ///
    /// Returns the first error of either step.
    pub async fn approve_and_execute(&self, id: &ProposalId) -> ApprovalResult<ActionProposal> {
        self.approve(id).await?;
        self.execute(id).await
    }

    /// Fetch a proposal by ID.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for an unknown ID.
    pub async fn proposal(&self, id: &ProposalId) -> ApprovalResult<ActionProposal> {
        Ok(self.machine.proposal(id).await?)
    }

    /// All proposals for a conversation, in creation order.
    ///
    /// This is the reconstruction path: a client reload re-renders its
    /// pending and resolved approval cards from these rows without
    /// replaying the stream.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend fails.
    pub async fn proposals_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> ApprovalResult<Vec<ActionProposal>> {
        Ok(self
            .machine
            .proposals_for_conversation(conversation_id)
            .await?)
    }

    async fn run_handler(&self, proposal: &ActionProposal) -> ApprovalResult<ActionProposal> {
        let Some(tool) = self.registry.get(&proposal.tool_name) else {
            warn!(tool = %proposal.tool_name, "no handler registered for proposed tool");
            let row = self
                .machine
                .mark_failed(
                    &proposal.id,
                    format!("handler not found: {}", proposal.tool_name),
                )
                .await?;
            return Ok(row);
        };

        let outcome = tool
            .execute(proposal.tool_arguments.clone(), &self.tool_ctx)
            .await;

        let row = match outcome {
            HandlerOutcome::Failure { message } => {
                warn!(proposal = %proposal.id, error = %message, "handler failed");
                self.machine.mark_failed(&proposal.id, message).await?
            },
            HandlerOutcome::Partial {
                succeeded,
                failed,
                url,
                ..
            } => {
                let summary = summarize_partial(&proposal.tool_name, succeeded, failed);
                self.machine
                    .mark_succeeded(&proposal.id, summary, url)
                    .await?
            },
            HandlerOutcome::Success { result, url } => {
                let summary = summarize_success(&proposal.tool_name, &result);
                self.machine
                    .mark_succeeded(&proposal.id, summary, url)
                    .await?
            },
        };
        Ok(row)
    }

    fn publish_update(&self, row: &ActionProposal) {
        self.bus.publish(
            row.conversation_id.clone(),
            ConversationEvent::action_update(row),
        );
    }
}

impl std::fmt::Debug for ApprovalManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalManager")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use greenlight_proposals::MemoryProposalStore;
    use greenlight_tools::{
        Comment, InMemoryCodeHost, InMemoryIssueTracker, Issue, IssueDraft, IssuePatch,
        IssueStatus, IssueTracker, TrackerError, TrackerResult,
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Wraps the in-memory tracker, counting mutating calls and
    /// optionally failing the next one.
    struct CountingTracker {
        inner: InMemoryIssueTracker,
        mutations: AtomicUsize,
        fail_message: Mutex<Option<String>>,
    }

    impl CountingTracker {
        fn new() -> Self {
            Self {
                inner: InMemoryIssueTracker::new(),
                mutations: AtomicUsize::new(0),
                fail_message: Mutex::new(None),
            }
        }

        fn mutation_count(&self) -> usize {
            self.mutations.load(Ordering::SeqCst)
        }

        fn fail_next(&self, message: &str) {
            *self.fail_message.lock().unwrap() = Some(message.to_string());
        }

        fn check_injected_failure(&self) -> TrackerResult<()> {
            self.mutations.fetch_add(1, Ordering::SeqCst);
            match self.fail_message.lock().unwrap().take() {
                Some(message) => Err(TrackerError::Backend(message)),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl IssueTracker for CountingTracker {
        async fn search_issues(&self, query: &str, limit: usize) -> TrackerResult<Vec<Issue>> {
            self.inner.search_issues(query, limit).await
        }

        async fn get_issue(&self, id: u64) -> TrackerResult<Issue> {
            self.inner.get_issue(id).await
        }

        async fn create_issue(&self, draft: IssueDraft) -> TrackerResult<Issue> {
            self.check_injected_failure()?;
            self.inner.create_issue(draft).await
        }

        async fn update_issue(&self, id: u64, patch: IssuePatch) -> TrackerResult<Issue> {
            self.check_injected_failure()?;
            self.inner.update_issue(id, patch).await
        }

        async fn delete_issue(&self, id: u64) -> TrackerResult<()> {
            self.check_injected_failure()?;
            self.inner.delete_issue(id).await
        }

        async fn add_comment(&self, id: u64, body: &str) -> TrackerResult<Comment> {
            self.check_injected_failure()?;
            self.inner.add_comment(id, body).await
        }
    }

    struct Harness {
        manager: ApprovalManager,
        tracker: Arc<CountingTracker>,
        bus: EventBus,
        conversation_id: ConversationId,
    }

    fn make_harness() -> Harness {
        let tracker = Arc::new(CountingTracker::new());
        let tool_ctx = ToolContext::new(
            Arc::clone(&tracker) as Arc<dyn IssueTracker>,
            Arc::new(InMemoryCodeHost::new()),
        );
        let bus = EventBus::new();
        let manager = ApprovalManager::new(
            Arc::new(ToolRegistry::with_default_tools()),
            Arc::new(MemoryProposalStore::new()),
            tool_ctx,
            bus.clone(),
        );
        Harness {
            manager,
            tracker,
            bus,
            conversation_id: ConversationId::new(),
        }
    }

    fn create_issue_request(harness: &Harness) -> ProposalRequest {
        ProposalRequest {
            conversation_id: harness.conversation_id.clone(),
            message_id: MessageId::new(),
            tool_name: "create_issue".to_string(),
            tool_arguments: json!({"title": "Fix login bug", "priority": 2}),
        }
    }

    // -----------------------------------------------------------------------
    // Proposal creation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_create_proposal_builds_description_and_preview() {
        let harness = make_harness();
        let proposal = harness
            .manager
            .create_proposal(create_issue_request(&harness))
            .await
            .unwrap();

        assert_eq!(proposal.state, ProposalState::Proposed);
        assert_eq!(proposal.description, "Create issue: Fix login bug (Priority: 2)");
        assert!(!proposal.preview.is_empty());
        assert_eq!(proposal.tool_name, "create_issue");
        // Nothing executed yet.
        assert_eq!(harness.tracker.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_create_proposal_unknown_tool() {
        let harness = make_harness();
        let err = harness
            .manager
            .create_proposal(ProposalRequest {
                conversation_id: harness.conversation_id.clone(),
                message_id: MessageId::new(),
                tool_name: "frobnicate".to_string(),
                tool_arguments: json!({}),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApprovalError::Tool(_)));
    }

    #[tokio::test]
    async fn test_create_proposal_rejects_read_tool() {
        let harness = make_harness();
        let err = harness
            .manager
            .create_proposal(ProposalRequest {
                conversation_id: harness.conversation_id.clone(),
                message_id: MessageId::new(),
                tool_name: "search_issues".to_string(),
                tool_arguments: json!({"query": "login"}),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApprovalError::NotAWriteTool { .. }));
    }

    #[tokio::test]
    async fn test_create_proposal_rejects_malformed_arguments() {
        let harness = make_harness();
        let err = harness
            .manager
            .create_proposal(ProposalRequest {
                conversation_id: harness.conversation_id.clone(),
                message_id: MessageId::new(),
                tool_name: "create_issue".to_string(),
                tool_arguments: json!({"priority": 99}),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApprovalError::Tool(_)));
    }

    // -----------------------------------------------------------------------
    // Happy path
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_propose_approve_execute_succeeds() {
        let harness = make_harness();
        let proposal = harness
            .manager
            .create_proposal(create_issue_request(&harness))
            .await
            .unwrap();

        let approved = harness.manager.approve(&proposal.id).await.unwrap();
        assert_eq!(approved.state, ProposalState::Approved);

        let done = harness.manager.execute(&proposal.id).await.unwrap();
        assert_eq!(done.state, ProposalState::Succeeded);
        let result = done.result.unwrap();
        assert!(result.contains("#1"), "result should name the created id: {result}");
        assert!(done.result_url.unwrap().ends_with("/1"));
        assert_eq!(harness.tracker.mutation_count(), 1);
    }

    #[tokio::test]
    async fn test_approve_and_execute_passes_through_approved() {
        let harness = make_harness();
        let proposal = harness
            .manager
            .create_proposal(create_issue_request(&harness))
            .await
            .unwrap();

        let mut receiver = harness.bus.subscribe_conversation(harness.conversation_id.clone());
        let done = harness
            .manager
            .approve_and_execute(&proposal.id)
            .await
            .unwrap();
        assert_eq!(done.state, ProposalState::Succeeded);

        // The bus saw approved -> executing -> succeeded in order.
        let mut states = Vec::new();
        for _ in 0..3 {
            let envelope = receiver.recv().await.unwrap();
            if let ConversationEvent::ActionUpdate { state, .. } = &envelope.event {
                states.push(*state);
            }
        }
        assert_eq!(
            states,
            vec![
                ProposalState::Approved,
                ProposalState::Executing,
                ProposalState::Succeeded
            ]
        );
    }

    // -----------------------------------------------------------------------
    // Decline
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_decline_is_terminal_and_not_executable() {
        let harness = make_harness();
        let proposal = harness
            .manager
            .create_proposal(create_issue_request(&harness))
            .await
            .unwrap();

        let declined = harness.manager.decline(&proposal.id).await.unwrap();
        assert_eq!(declined.state, ProposalState::Declined);

        let err = harness.manager.approve(&proposal.id).await.unwrap_err();
        assert!(matches!(
            err,
            ApprovalError::Proposal(ProposalError::InvalidTransition { .. })
        ));

        let err = harness.manager.execute(&proposal.id).await.unwrap_err();
        assert!(matches!(
            err,
            ApprovalError::Proposal(ProposalError::InvalidTransition { .. })
        ));
        assert_eq!(harness.tracker.mutation_count(), 0);
    }

    // -----------------------------------------------------------------------
    // Idempotent execution
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_double_execute_invokes_handler_once() {
        let harness = make_harness();
        let proposal = harness
            .manager
            .create_proposal(create_issue_request(&harness))
            .await
            .unwrap();
        harness.manager.approve(&proposal.id).await.unwrap();

        let first = harness.manager.execute(&proposal.id).await.unwrap();
        let second = harness.manager.execute(&proposal.id).await.unwrap();

        assert_eq!(first.state, ProposalState::Succeeded);
        assert_eq!(second.state, ProposalState::Succeeded);
        assert_eq!(second.result, first.result);
        assert_eq!(harness.tracker.mutation_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_execute_invokes_handler_once() {
        let harness = make_harness();
        let proposal = harness
            .manager
            .create_proposal(create_issue_request(&harness))
            .await
            .unwrap();
        harness.manager.approve(&proposal.id).await.unwrap();

        let (a, b) = tokio::join!(
            harness.manager.execute(&proposal.id),
            harness.manager.execute(&proposal.id)
        );
        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(harness.tracker.mutation_count(), 1);
    }

    // -----------------------------------------------------------------------
    // Failure and retry
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_handler_failure_then_retry_succeeds() {
        let harness = make_harness();
        let proposal = harness
            .manager
            .create_proposal(create_issue_request(&harness))
            .await
            .unwrap();
        harness.manager.approve(&proposal.id).await.unwrap();

        harness.tracker.fail_next("upstream 500");
        let failed = harness.manager.execute(&proposal.id).await.unwrap();
        assert_eq!(failed.state, ProposalState::Failed);
        assert_eq!(failed.error.as_deref(), Some("backend error: upstream 500"));

        let retried = harness.manager.retry(&proposal.id).await.unwrap();
        assert_eq!(retried.state, ProposalState::Succeeded);
        assert!(retried.error.is_none());
        assert_eq!(harness.tracker.mutation_count(), 2);
    }

    #[tokio::test]
    async fn test_retry_only_legal_from_failed() {
        let harness = make_harness();
        let proposal = harness
            .manager
            .create_proposal(create_issue_request(&harness))
            .await
            .unwrap();

        // proposed
        let err = harness.manager.retry(&proposal.id).await.unwrap_err();
        assert!(matches!(
            err,
            ApprovalError::Proposal(ProposalError::InvalidTransition {
                from: ProposalState::Proposed,
                attempted: "retry",
            })
        ));

        // succeeded
        harness
            .manager
            .approve_and_execute(&proposal.id)
            .await
            .unwrap();
        let err = harness.manager.retry(&proposal.id).await.unwrap_err();
        assert!(matches!(
            err,
            ApprovalError::Proposal(ProposalError::InvalidTransition {
                from: ProposalState::Succeeded,
                attempted: "retry",
            })
        ));
        assert_eq!(harness.tracker.mutation_count(), 1);
    }

    #[tokio::test]
    async fn test_retry_illegal_from_declined() {
        let harness = make_harness();
        let proposal = harness
            .manager
            .create_proposal(create_issue_request(&harness))
            .await
            .unwrap();
        harness.manager.decline(&proposal.id).await.unwrap();

        let err = harness.manager.retry(&proposal.id).await.unwrap_err();
        assert!(matches!(
            err,
            ApprovalError::Proposal(ProposalError::InvalidTransition {
                from: ProposalState::Declined,
                attempted: "retry",
            })
        ));
        assert_eq!(harness.tracker.mutation_count(), 0);
    }

    // -----------------------------------------------------------------------
    // Partial batch
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_partial_batch_succeeds_with_split_summary() {
        let harness = make_harness();
        let a = harness.tracker.inner.seed_issue("one", IssueStatus::Open).await;
        let b = harness.tracker.inner.seed_issue("two", IssueStatus::Open).await;
        let c = harness.tracker.inner.seed_issue("three", IssueStatus::Open).await;

        let proposal = harness
            .manager
            .create_proposal(ProposalRequest {
                conversation_id: harness.conversation_id.clone(),
                message_id: MessageId::new(),
                tool_name: "bulk_update_issues".to_string(),
                tool_arguments: json!({"issue_ids": [a, b, c, 98, 99], "status": "done"}),
            })
            .await
            .unwrap();

        let done = harness
            .manager
            .approve_and_execute(&proposal.id)
            .await
            .unwrap();
        assert_eq!(done.state, ProposalState::Succeeded);
        let summary = done.result.unwrap();
        assert!(summary.contains('3'), "summary must disclose successes: {summary}");
        assert!(summary.contains('2'), "summary must disclose failures: {summary}");
    }

    // -----------------------------------------------------------------------
    // Reconstruction
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_proposals_for_conversation_reconstruction() {
        let harness = make_harness();
        let first = harness
            .manager
            .create_proposal(create_issue_request(&harness))
            .await
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = harness
            .manager
            .create_proposal(ProposalRequest {
                conversation_id: harness.conversation_id.clone(),
                message_id: MessageId::new(),
                tool_name: "create_branch".to_string(),
                tool_arguments: json!({"name": "fix/login"}),
            })
            .await
            .unwrap();
        harness.manager.decline(&second.id).await.unwrap();

        let rows = harness
            .manager
            .proposals_for_conversation(&harness.conversation_id)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, first.id);
        assert_eq!(rows[0].state, ProposalState::Proposed);
        assert_eq!(rows[1].state, ProposalState::Declined);
    }
}
