//! Recording issue-tracker double.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use greenlight_tools::{
    Comment, InMemoryIssueTracker, Issue, IssueDraft, IssuePatch, IssueStatus, IssueTracker,
    TrackerError, TrackerResult,
};

/// Wraps [`InMemoryIssueTracker`], counting mutating calls and
/// optionally injecting failures for the next mutations.
#[derive(Debug, Default)]
pub struct RecordingTracker {
    inner: InMemoryIssueTracker,
    mutations: AtomicUsize,
    injected_failures: Mutex<VecDeque<String>>,
}

impl RecordingTracker {
    /// Create an empty recording tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mutating calls observed so far.
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    /// Make the next mutating call fail with `message`.
    pub fn fail_next(&self, message: &str) {
        self.injected_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(message.to_string());
    }

    /// Seed an issue directly, returning its number.
    pub async fn seed_issue(&self, title: &str, status: IssueStatus) -> u64 {
        self.inner.seed_issue(title, status).await
    }

    /// Number of issues currently stored.
    pub async fn issue_count(&self) -> usize {
        self.inner.issue_count().await
    }

    fn on_mutation(&self) -> TrackerResult<()> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        match self
            .injected_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
        {
            Some(message) => Err(TrackerError::Backend(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl IssueTracker for RecordingTracker {
    async fn search_issues(&self, query: &str, limit: usize) -> TrackerResult<Vec<Issue>> {
        self.inner.search_issues(query, limit).await
    }

    async fn get_issue(&self, id: u64) -> TrackerResult<Issue> {
        self.inner.get_issue(id).await
    }

    async fn create_issue(&self, draft: IssueDraft) -> TrackerResult<Issue> {
        self.on_mutation()?;
        self.inner.create_issue(draft).await
    }

    async fn update_issue(&self, id: u64, patch: IssuePatch) -> TrackerResult<Issue> {
        self.on_mutation()?;
        self.inner.update_issue(id, patch).await
    }

    async fn delete_issue(&self, id: u64) -> TrackerResult<()> {
        self.on_mutation()?;
        self.inner.delete_issue(id).await
    }

    async fn add_comment(&self, id: u64, body: &str) -> TrackerResult<Comment> {
        self.on_mutation()?;
        self.inner.add_comment(id, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_mutations_not_reads() {
        let tracker = RecordingTracker::new();
        tracker
            .create_issue(IssueDraft {
                title: "x".to_string(),
                body: String::new(),
                priority: 3,
            })
            .await
            .unwrap();
        tracker.search_issues("x", 10).await.unwrap();
        assert_eq!(tracker.mutation_count(), 1);
    }

    #[tokio::test]
    async fn test_injected_failure_applies_once() {
        let tracker = RecordingTracker::new();
        tracker.fail_next("upstream 500");

        let draft = IssueDraft {
            title: "x".to_string(),
            body: String::new(),
            priority: 3,
        };
        let err = tracker.create_issue(draft.clone()).await.unwrap_err();
        assert!(matches!(err, TrackerError::Backend(_)));

        assert!(tracker.create_issue(draft).await.is_ok());
        assert_eq!(tracker.mutation_count(), 2);
    }
}
