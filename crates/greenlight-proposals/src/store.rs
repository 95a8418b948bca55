//! The proposal store boundary.
//!
//! The storage engine is an external collaborator: the core only
//! requires a durable row store with transactional single-writer
//! updates, captured here as [`ProposalStore`]. The state machine never
//! touches rows directly; every mutation goes through
//! [`ProposalStore::try_transition`], whose single source-state
//! comparison against the latest persisted row is what makes racing
//! decision requests safe.
//!
//! [`MemoryProposalStore`] is the single-process reference
//! implementation used by tests and embedded deployments.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use greenlight_core::{ConversationId, ProposalId, Timestamp};

use crate::error::{ProposalError, ProposalResult};
use crate::proposal::{ActionProposal, ProposalState};

/// The row mutation applied by a transition.
///
/// A tagged patch rather than free-form field updates keeps the
/// outcome fields consistent with the state they belong to.
#[derive(Debug, Clone)]
pub enum ProposalPatch {
    /// Move to a new state without touching outcome fields.
    State(ProposalState),
    /// Move to `succeeded` with an outcome summary; clears any prior error.
    Succeeded {
        /// Human-readable outcome summary.
        result: String,
        /// Link to the affected resource, when known.
        result_url: Option<String>,
    },
    /// Move to `failed` with a failure message; clears any prior result.
    Failed {
        /// Human-readable failure message.
        error: String,
    },
}

impl ProposalPatch {
    /// The state this patch moves the row into.
    #[must_use]
    pub fn target_state(&self) -> ProposalState {
        match self {
            Self::State(state) => *state,
            Self::Succeeded { .. } => ProposalState::Succeeded,
            Self::Failed { .. } => ProposalState::Failed,
        }
    }

    fn apply(self, row: &mut ActionProposal) {
        match self {
            Self::State(state) => row.state = state,
            Self::Succeeded { result, result_url } => {
                row.state = ProposalState::Succeeded;
                row.result = Some(result);
                row.result_url = result_url;
                row.error = None;
            },
            Self::Failed { error } => {
                row.state = ProposalState::Failed;
                row.error = Some(error);
                row.result = None;
                row.result_url = None;
            },
        }
        row.updated_at = Timestamp::now();
    }
}

/// Result of a conditional transition attempt.
#[derive(Debug, Clone)]
pub enum TransitionAttempt {
    /// The row was in an expected state; the patch was applied.
    Applied(ActionProposal),
    /// The row was in some other state; nothing changed. Carries the
    /// latest row so the caller can decide what the rejection means.
    Rejected(ActionProposal),
}

/// Durable row store for action proposals.
///
/// Implementations must provide per-row single-writer semantics:
/// `try_transition` performs its state comparison and update as one
/// atomic step, so the same source state can never satisfy two racing
/// transitions.
#[async_trait]
pub trait ProposalStore: Send + Sync {
    /// Insert a new proposal row.
    ///
    /// # Errors
    ///
    /// Returns [`ProposalError::DuplicateIdempotencyKey`] if a row with
    /// the same idempotency key already exists.
    async fn insert(&self, proposal: ActionProposal) -> ProposalResult<ActionProposal>;

    /// Fetch a proposal by ID.
    ///
    /// # Errors
    ///
    /// Returns [`ProposalError::NotFound`] for an unknown ID.
    async fn get(&self, id: &ProposalId) -> ProposalResult<ActionProposal>;

    /// All proposals for a conversation, in creation order.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend fails.
    async fn list_by_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> ProposalResult<Vec<ActionProposal>>;

    /// Atomically apply `patch` iff the row's current state is one of
    /// `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`ProposalError::NotFound`] for an unknown ID.
    async fn try_transition(
        &self,
        id: &ProposalId,
        expected: &[ProposalState],
        patch: ProposalPatch,
    ) -> ProposalResult<TransitionAttempt>;
}

/// In-memory proposal store.
///
/// Rows live in a concurrent map whose per-entry locking provides the
/// single-writer row update the trait requires. An insertion sequence
/// preserves creation order for conversation listings even when two
/// rows share a creation instant.
#[derive(Debug, Default)]
pub struct MemoryProposalStore {
    rows: DashMap<ProposalId, (u64, ActionProposal)>,
    key_index: DashMap<String, ProposalId>,
    seq: AtomicU64,
}

impl MemoryProposalStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently stored.
    #[must_use]
    pub fn count(&self) -> usize {
        self.rows.len()
    }
}

#[async_trait]
impl ProposalStore for MemoryProposalStore {
    async fn insert(&self, proposal: ActionProposal) -> ProposalResult<ActionProposal> {
        match self.key_index.entry(proposal.idempotency_key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(ProposalError::DuplicateIdempotencyKey {
                    key: proposal.idempotency_key,
                });
            },
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(proposal.id.clone());
            },
        }

        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        self.rows
            .insert(proposal.id.clone(), (seq, proposal.clone()));
        Ok(proposal)
    }

    async fn get(&self, id: &ProposalId) -> ProposalResult<ActionProposal> {
        self.rows
            .get(id)
            .map(|entry| entry.value().1.clone())
            .ok_or_else(|| ProposalError::NotFound { id: id.clone() })
    }

    async fn list_by_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> ProposalResult<Vec<ActionProposal>> {
        let mut rows: Vec<(u64, ActionProposal)> = self
            .rows
            .iter()
            .filter(|entry| entry.value().1.conversation_id == *conversation_id)
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by_key(|(seq, _)| *seq);
        Ok(rows.into_iter().map(|(_, row)| row).collect())
    }

    async fn try_transition(
        &self,
        id: &ProposalId,
        expected: &[ProposalState],
        patch: ProposalPatch,
    ) -> ProposalResult<TransitionAttempt> {
        // The map entry guard is held for the whole compare-and-update,
        // which is the single-writer guarantee.
        let mut entry = self
            .rows
            .get_mut(id)
            .ok_or_else(|| ProposalError::NotFound { id: id.clone() })?;
        let (_, row) = entry.value_mut();

        if expected.contains(&row.state) {
            patch.apply(row);
            Ok(TransitionAttempt::Applied(row.clone()))
        } else {
            Ok(TransitionAttempt::Rejected(row.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenlight_core::{MessageId, ToolCategory};
    use serde_json::json;

    fn make_row(conversation_id: &ConversationId, key: &str) -> ActionProposal {
        let now = Timestamp::now();
        ActionProposal {
            id: ProposalId::new(),
            idempotency_key: key.to_string(),
            conversation_id: conversation_id.clone(),
            message_id: MessageId::new(),
            tool_name: "create_issue".to_string(),
            tool_arguments: json!({"title": "Fix login bug"}),
            category: ToolCategory::Issues,
            description: "Create issue: Fix login bug".to_string(),
            preview: Vec::new(),
            state: ProposalState::Proposed,
            result: None,
            result_url: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = MemoryProposalStore::new();
        let conv = ConversationId::new();
        let row = store.insert(make_row(&conv, "k1")).await.unwrap();

        let fetched = store.get(&row.id).await.unwrap();
        assert_eq!(fetched.idempotency_key, "k1");
        assert_eq!(fetched.state, ProposalState::Proposed);
    }

    #[tokio::test]
    async fn test_duplicate_idempotency_key_rejected() {
        let store = MemoryProposalStore::new();
        let conv = ConversationId::new();
        store.insert(make_row(&conv, "same")).await.unwrap();

        let err = store.insert(make_row(&conv, "same")).await.unwrap_err();
        assert!(matches!(
            err,
            ProposalError::DuplicateIdempotencyKey { ref key } if key == "same"
        ));
        assert_eq!(store.count(), 1);
    }

    #[tokio::test]
    async fn test_get_unknown_id() {
        let store = MemoryProposalStore::new();
        let err = store.get(&ProposalId::new()).await.unwrap_err();
        assert!(matches!(err, ProposalError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_preserves_creation_order() {
        let store = MemoryProposalStore::new();
        let conv = ConversationId::new();
        for i in 0..5 {
            store.insert(make_row(&conv, &format!("k{i}"))).await.unwrap();
        }
        // A row in another conversation must not appear.
        store
            .insert(make_row(&ConversationId::new(), "other"))
            .await
            .unwrap();

        let rows = store.list_by_conversation(&conv).await.unwrap();
        assert_eq!(rows.len(), 5);
        let keys: Vec<_> = rows.iter().map(|r| r.idempotency_key.clone()).collect();
        assert_eq!(keys, vec!["k0", "k1", "k2", "k3", "k4"]);
    }

    #[tokio::test]
    async fn test_try_transition_applied() {
        let store = MemoryProposalStore::new();
        let conv = ConversationId::new();
        let row = store.insert(make_row(&conv, "k1")).await.unwrap();

        let attempt = store
            .try_transition(
                &row.id,
                &[ProposalState::Proposed],
                ProposalPatch::State(ProposalState::Approved),
            )
            .await
            .unwrap();
        let TransitionAttempt::Applied(updated) = attempt else {
            panic!("expected applied");
        };
        assert_eq!(updated.state, ProposalState::Approved);
        assert!(updated.updated_at >= updated.created_at);
    }

    #[tokio::test]
    async fn test_try_transition_rejected_leaves_row_unchanged() {
        let store = MemoryProposalStore::new();
        let conv = ConversationId::new();
        let row = store.insert(make_row(&conv, "k1")).await.unwrap();

        let attempt = store
            .try_transition(
                &row.id,
                &[ProposalState::Approved],
                ProposalPatch::State(ProposalState::Executing),
            )
            .await
            .unwrap();
        assert!(matches!(attempt, TransitionAttempt::Rejected(_)));

        let fetched = store.get(&row.id).await.unwrap();
        assert_eq!(fetched.state, ProposalState::Proposed);
    }

    #[tokio::test]
    async fn test_succeeded_patch_clears_error() {
        let store = MemoryProposalStore::new();
        let conv = ConversationId::new();
        let mut row = make_row(&conv, "k1");
        row.state = ProposalState::Executing;
        row.error = Some("previous failure".to_string());
        let row = store.insert(row).await.unwrap();

        let attempt = store
            .try_transition(
                &row.id,
                &[ProposalState::Executing],
                ProposalPatch::Succeeded {
                    result: "Created issue #1".to_string(),
                    result_url: Some("https://tracker.example/issues/1".to_string()),
                },
            )
            .await
            .unwrap();
        let TransitionAttempt::Applied(updated) = attempt else {
            panic!("expected applied");
        };
        assert_eq!(updated.state, ProposalState::Succeeded);
        assert_eq!(updated.result.as_deref(), Some("Created issue #1"));
        assert!(updated.error.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_transitions_single_winner() {
        let store = std::sync::Arc::new(MemoryProposalStore::new());
        let conv = ConversationId::new();
        let row = store.insert(make_row(&conv, "k1")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = std::sync::Arc::clone(&store);
            let id = row.id.clone();
            handles.push(tokio::spawn(async move {
                store
                    .try_transition(
                        &id,
                        &[ProposalState::Proposed],
                        ProposalPatch::State(ProposalState::Approved),
                    )
                    .await
            }));
        }

        let mut applied = 0;
        for handle in handles {
            if matches!(
                handle.await.unwrap().unwrap(),
                TransitionAttempt::Applied(_)
            ) {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);
    }
}
