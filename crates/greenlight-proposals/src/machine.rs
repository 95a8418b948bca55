//! The action state machine.
//!
//! Pure transition logic over the persisted row: each operation names
//! its legal source states and delegates the atomic compare-and-update
//! to the store. Illegal edges raise
//! [`ProposalError::InvalidTransition`] and leave the row untouched;
//! the only sanctioned exception is the idempotent re-entry of
//! [`mark_executing`](ActionStateMachine::mark_executing).

use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use greenlight_core::{
    ConversationId, MessageId, PreviewField, ProposalId, Timestamp, ToolCategory,
};

use crate::error::{ProposalError, ProposalResult};
use crate::idempotency::derive_idempotency_key;
use crate::proposal::{ActionProposal, ProposalState};
use crate::store::{ProposalPatch, ProposalStore, TransitionAttempt};

/// Context for creating a proposal row.
#[derive(Debug, Clone)]
pub struct NewProposal {
    /// The conversation the proposal belongs to.
    pub conversation_id: ConversationId,
    /// The assistant turn that produced it.
    pub message_id: MessageId,
    /// Name of the requested write tool.
    pub tool_name: String,
    /// Arguments as proposed by the model.
    pub tool_arguments: Value,
    /// External system family.
    pub category: ToolCategory,
    /// One-line summary of intent.
    pub description: String,
    /// Structured before/after diff.
    pub preview: Vec<PreviewField>,
}

/// Outcome of the idempotent execution gate.
#[derive(Debug, Clone)]
pub enum ExecutionGate {
    /// This caller moved the row into `executing` and owns the handler
    /// invocation.
    Entered(ActionProposal),
    /// The row was already `executing` or `succeeded`; returned
    /// unchanged. The caller must not invoke the handler.
    Settled(ActionProposal),
}

impl ExecutionGate {
    /// The row regardless of which side of the gate we are on.
    #[must_use]
    pub fn into_proposal(self) -> ActionProposal {
        match self {
            Self::Entered(p) | Self::Settled(p) => p,
        }
    }
}

/// Enforces the legal transition table over the persisted row.
#[derive(Clone)]
pub struct ActionStateMachine {
    store: Arc<dyn ProposalStore>,
}

impl ActionStateMachine {
    /// Create a state machine over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn ProposalStore>) -> Self {
        Self { store }
    }

    /// Create a proposal row in state `proposed`.
    ///
    /// Assigns the ID and idempotency key.
    ///
    /// # Errors
    ///
    /// Returns [`ProposalError::DuplicateIdempotencyKey`] when the same
    /// logical action is re-submitted at the same instant.
    pub async fn create_proposal(&self, new: NewProposal) -> ProposalResult<ActionProposal> {
        let created_at = Timestamp::now();
        let idempotency_key = derive_idempotency_key(
            &new.conversation_id,
            &new.tool_name,
            &new.tool_arguments,
            created_at,
        );

        let proposal = ActionProposal {
            id: ProposalId::new(),
            idempotency_key,
            conversation_id: new.conversation_id,
            message_id: new.message_id,
            tool_name: new.tool_name,
            tool_arguments: new.tool_arguments,
            category: new.category,
            description: new.description,
            preview: new.preview,
            state: ProposalState::Proposed,
            result: None,
            result_url: None,
            error: None,
            created_at,
            updated_at: created_at,
        };

        debug!(proposal = %proposal.id, tool = %proposal.tool_name, "creating proposal");
        self.store.insert(proposal).await
    }

    /// `proposed -> approved`.
    ///
    /// # Errors
    ///
    /// Returns [`ProposalError::InvalidTransition`] from any other state.
    pub async fn approve(&self, id: &ProposalId) -> ProposalResult<ActionProposal> {
        self.transition(
            id,
            &[ProposalState::Proposed],
            ProposalPatch::State(ProposalState::Approved),
            "approve",
        )
        .await
    }

    /// `proposed -> declined`.
    ///
    /// # Errors
    ///
    /// Returns [`ProposalError::InvalidTransition`] from any other state.
    pub async fn decline(&self, id: &ProposalId) -> ProposalResult<ActionProposal> {
        self.transition(
            id,
            &[ProposalState::Proposed],
            ProposalPatch::State(ProposalState::Declined),
            "decline",
        )
        .await
    }

    /// `approved -> executing` or `failed -> executing` (retry edge).
    ///
    /// Idempotent: a row already `executing` or `succeeded` is returned
    /// unchanged as [`ExecutionGate::Settled`] rather than raising,
    /// which is the mechanism that makes duplicate "approve" clicks
    /// safe.
    ///
    /// # Errors
    ///
    /// Returns [`ProposalError::InvalidTransition`] from `proposed` or
    /// `declined`.
    pub async fn mark_executing(&self, id: &ProposalId) -> ProposalResult<ExecutionGate> {
        let attempt = self
            .store
            .try_transition(
                id,
                &[ProposalState::Approved, ProposalState::Failed],
                ProposalPatch::State(ProposalState::Executing),
            )
            .await?;

        match attempt {
            TransitionAttempt::Applied(row) => Ok(ExecutionGate::Entered(row)),
            TransitionAttempt::Rejected(row)
                if matches!(
                    row.state,
                    ProposalState::Executing | ProposalState::Succeeded
                ) =>
            {
                debug!(proposal = %row.id, state = %row.state, "execution gate already settled");
                Ok(ExecutionGate::Settled(row))
            },
            TransitionAttempt::Rejected(row) => Err(ProposalError::InvalidTransition {
                from: row.state,
                attempted: "mark_executing",
            }),
        }
    }

    /// `executing -> succeeded`.
    ///
    /// # Errors
    ///
    /// Returns [`ProposalError::InvalidTransition`] from any other state.
    pub async fn mark_succeeded(
        &self,
        id: &ProposalId,
        result: impl Into<String> + Send,
        result_url: Option<String>,
    ) -> ProposalResult<ActionProposal> {
        self.transition(
            id,
            &[ProposalState::Executing],
            ProposalPatch::Succeeded {
                result: result.into(),
                result_url,
            },
            "mark_succeeded",
        )
        .await
    }

    /// `executing -> failed`.
    ///
    /// # Errors
    ///
    /// Returns [`ProposalError::InvalidTransition`] from any other state.
    pub async fn mark_failed(
        &self,
        id: &ProposalId,
        error: impl Into<String> + Send,
    ) -> ProposalResult<ActionProposal> {
        self.transition(
            id,
            &[ProposalState::Executing],
            ProposalPatch::Failed {
                error: error.into(),
            },
            "mark_failed",
        )
        .await
    }

    /// Fetch a proposal by ID.
    ///
    /// # Errors
    ///
    /// Returns [`ProposalError::NotFound`] for an unknown ID.
    pub async fn proposal(&self, id: &ProposalId) -> ProposalResult<ActionProposal> {
        self.store.get(id).await
    }

    /// All proposals for a conversation, in creation order.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend fails.
    pub async fn proposals_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> ProposalResult<Vec<ActionProposal>> {
        self.store.list_by_conversation(conversation_id).await
    }

    async fn transition(
        &self,
        id: &ProposalId,
        expected: &[ProposalState],
        patch: ProposalPatch,
        attempted: &'static str,
    ) -> ProposalResult<ActionProposal> {
        match self.store.try_transition(id, expected, patch).await? {
            TransitionAttempt::Applied(row) => {
                debug!(proposal = %row.id, state = %row.state, "transition applied");
                Ok(row)
            },
            TransitionAttempt::Rejected(row) => Err(ProposalError::InvalidTransition {
                from: row.state,
                attempted,
            }),
        }
    }
}

impl std::fmt::Debug for ActionStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionStateMachine").finish_non_exhaustive()
    }
}
