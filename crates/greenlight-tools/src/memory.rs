//! In-memory client implementations for tests and embedded use.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use crate::tracker::{
    Branch, CodeHost, Comment, Issue, IssueDraft, IssuePatch, IssueStatus, IssueTracker,
    TrackerError, TrackerResult,
};

const TRACKER_BASE_URL: &str = "https://tracker.example/issues";
const REPO_BASE_URL: &str = "https://code.example/repo/tree";

/// In-memory issue tracker.
#[derive(Debug)]
pub struct InMemoryIssueTracker {
    issues: RwLock<HashMap<u64, Issue>>,
    comments: RwLock<Vec<Comment>>,
    next_issue_id: AtomicU64,
    next_comment_id: AtomicU64,
}

impl InMemoryIssueTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            issues: RwLock::new(HashMap::new()),
            comments: RwLock::new(Vec::new()),
            next_issue_id: AtomicU64::new(1),
            next_comment_id: AtomicU64::new(1),
        }
    }

    /// Seed an issue directly, returning its number.
    pub async fn seed_issue(&self, title: &str, status: IssueStatus) -> u64 {
        let id = self.next_issue_id.fetch_add(1, Ordering::SeqCst);
        let issue = Issue {
            id,
            title: title.to_string(),
            body: String::new(),
            status,
            priority: 3,
            assignee: None,
            url: format!("{TRACKER_BASE_URL}/{id}"),
        };
        self.issues.write().await.insert(id, issue);
        id
    }

    /// Number of issues currently stored.
    pub async fn issue_count(&self) -> usize {
        self.issues.read().await.len()
    }
}

impl Default for InMemoryIssueTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IssueTracker for InMemoryIssueTracker {
    async fn search_issues(&self, query: &str, limit: usize) -> TrackerResult<Vec<Issue>> {
        let needle = query.to_lowercase();
        let issues = self.issues.read().await;
        let mut hits: Vec<Issue> = issues
            .values()
            .filter(|issue| {
                issue.title.to_lowercase().contains(&needle)
                    || issue.body.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        hits.sort_by_key(|issue| issue.id);
        hits.truncate(limit);
        Ok(hits)
    }

    async fn get_issue(&self, id: u64) -> TrackerResult<Issue> {
        self.issues
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(TrackerError::IssueNotFound { id })
    }

    async fn create_issue(&self, draft: IssueDraft) -> TrackerResult<Issue> {
        let id = self.next_issue_id.fetch_add(1, Ordering::SeqCst);
        let issue = Issue {
            id,
            title: draft.title,
            body: draft.body,
            status: IssueStatus::Open,
            priority: draft.priority,
            assignee: None,
            url: format!("{TRACKER_BASE_URL}/{id}"),
        };
        self.issues.write().await.insert(id, issue.clone());
        Ok(issue)
    }

    async fn update_issue(&self, id: u64, patch: IssuePatch) -> TrackerResult<Issue> {
        let mut issues = self.issues.write().await;
        let issue = issues
            .get_mut(&id)
            .ok_or(TrackerError::IssueNotFound { id })?;
        if let Some(title) = patch.title {
            issue.title = title;
        }
        if let Some(status) = patch.status {
            issue.status = status;
        }
        if let Some(priority) = patch.priority {
            issue.priority = priority;
        }
        if let Some(assignee) = patch.assignee {
            issue.assignee = Some(assignee);
        }
        Ok(issue.clone())
    }

    async fn delete_issue(&self, id: u64) -> TrackerResult<()> {
        self.issues
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(TrackerError::IssueNotFound { id })
    }

    async fn add_comment(&self, id: u64, body: &str) -> TrackerResult<Comment> {
        if !self.issues.read().await.contains_key(&id) {
            return Err(TrackerError::IssueNotFound { id });
        }
        let comment_id = self.next_comment_id.fetch_add(1, Ordering::SeqCst);
        let comment = Comment {
            id: comment_id,
            issue_id: id,
            body: body.to_string(),
            url: format!("{TRACKER_BASE_URL}/{id}#comment-{comment_id}"),
        };
        self.comments.write().await.push(comment.clone());
        Ok(comment)
    }
}

/// In-memory code host. Starts with a `main` branch.
#[derive(Debug)]
pub struct InMemoryCodeHost {
    branches: RwLock<Vec<String>>,
}

impl InMemoryCodeHost {
    /// Create a host with only `main`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            branches: RwLock::new(vec!["main".to_string()]),
        }
    }
}

impl Default for InMemoryCodeHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CodeHost for InMemoryCodeHost {
    async fn create_branch(&self, name: &str, from: &str) -> TrackerResult<Branch> {
        let mut branches = self.branches.write().await;
        if !branches.iter().any(|b| b == from) {
            return Err(TrackerError::UnknownRef {
                name: from.to_string(),
            });
        }
        if branches.iter().any(|b| b == name) {
            return Err(TrackerError::AlreadyExists {
                name: name.to_string(),
            });
        }
        branches.push(name.to_string());
        Ok(Branch {
            name: name.to_string(),
            from: from.to_string(),
            url: format!("{REPO_BASE_URL}/{name}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get() {
        let tracker = InMemoryIssueTracker::new();
        let issue = tracker
            .create_issue(IssueDraft {
                title: "Fix login bug".to_string(),
                body: String::new(),
                priority: 2,
            })
            .await
            .unwrap();
        assert_eq!(issue.id, 1);
        assert!(issue.url.ends_with("/1"));

        let fetched = tracker.get_issue(1).await.unwrap();
        assert_eq!(fetched.title, "Fix login bug");
        assert_eq!(fetched.status, IssueStatus::Open);
    }

    #[tokio::test]
    async fn test_search_matches_title_and_body() {
        let tracker = InMemoryIssueTracker::new();
        tracker.seed_issue("Login page broken", IssueStatus::Open).await;
        tracker.seed_issue("Dark mode", IssueStatus::Open).await;

        let hits = tracker.search_issues("login", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Login page broken");
    }

    #[tokio::test]
    async fn test_update_unknown_issue() {
        let tracker = InMemoryIssueTracker::new();
        let err = tracker
            .update_issue(42, IssuePatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::IssueNotFound { id: 42 }));
    }

    #[tokio::test]
    async fn test_comment_requires_issue() {
        let tracker = InMemoryIssueTracker::new();
        assert!(tracker.add_comment(1, "hi").await.is_err());

        let id = tracker.seed_issue("A bug", IssueStatus::Open).await;
        let comment = tracker.add_comment(id, "on it").await.unwrap();
        assert_eq!(comment.issue_id, id);
    }

    #[tokio::test]
    async fn test_branch_rules() {
        let host = InMemoryCodeHost::new();
        let branch = host.create_branch("fix/login", "main").await.unwrap();
        assert_eq!(branch.from, "main");

        let err = host.create_branch("fix/login", "main").await.unwrap_err();
        assert!(matches!(err, TrackerError::AlreadyExists { .. }));

        let err = host.create_branch("x", "nope").await.unwrap_err();
        assert!(matches!(err, TrackerError::UnknownRef { .. }));
    }
}
