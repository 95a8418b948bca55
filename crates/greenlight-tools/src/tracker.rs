//! Pluggable external-system client boundaries.
//!
//! The concrete mutation clients for issue trackers and code hosts live
//! outside this workspace; these traits are the seam they implement.
//! In-memory implementations ship in [`crate::memory`] for tests and
//! embedded use.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from an external-system client.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The referenced resource does not exist.
    #[error("issue not found: #{id}")]
    IssueNotFound {
        /// The missing issue number.
        id: u64,
    },

    /// A resource with the same identity already exists.
    #[error("already exists: {name}")]
    AlreadyExists {
        /// The conflicting identity.
        name: String,
    },

    /// The referenced base ref does not exist.
    #[error("unknown ref: {name}")]
    UnknownRef {
        /// The missing ref.
        name: String,
    },

    /// The backend rejected or failed the request.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result type for client operations.
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Workflow state of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    /// Open, not yet started.
    Open,
    /// Being worked on.
    InProgress,
    /// Completed.
    Done,
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        };
        write!(f, "{s}")
    }
}

impl FromStr for IssueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            other => Err(format!(
                "unknown status {other:?} (expected open, in_progress, or done)"
            )),
        }
    }
}

/// An issue as seen through the tracker client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Issue number.
    pub id: u64,
    /// Title.
    pub title: String,
    /// Body text.
    pub body: String,
    /// Workflow state.
    pub status: IssueStatus,
    /// Priority, 1 (urgent) through 4 (low).
    pub priority: u8,
    /// Assignee login, if any.
    pub assignee: Option<String>,
    /// Web link to the issue.
    pub url: String,
}

/// Fields for creating an issue.
#[derive(Debug, Clone)]
pub struct IssueDraft {
    /// Title (required).
    pub title: String,
    /// Body text.
    pub body: String,
    /// Priority, 1 through 4.
    pub priority: u8,
}

/// Fields to change on an existing issue. `None` leaves a field as-is.
#[derive(Debug, Clone, Default)]
pub struct IssuePatch {
    /// New title.
    pub title: Option<String>,
    /// New workflow state.
    pub status: Option<IssueStatus>,
    /// New priority.
    pub priority: Option<u8>,
    /// New assignee login.
    pub assignee: Option<String>,
}

impl IssuePatch {
    /// Whether the patch changes anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.assignee.is_none()
    }
}

/// A comment on an issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    /// Comment identifier.
    pub id: u64,
    /// The issue commented on.
    pub issue_id: u64,
    /// Comment body.
    pub body: String,
    /// Web link to the comment.
    pub url: String,
}

/// A branch on the code host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    /// Branch name.
    pub name: String,
    /// The ref it was created from.
    pub from: String,
    /// Web link to the branch.
    pub url: String,
}

/// Client boundary for the issue tracker.
///
/// Implementations perform their own I/O and must be safe to invoke at
/// most once per `execute` call; the at-most-once gate itself is the
/// core's responsibility.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Full-text search over issues.
    async fn search_issues(&self, query: &str, limit: usize) -> TrackerResult<Vec<Issue>>;

    /// Fetch a single issue.
    async fn get_issue(&self, id: u64) -> TrackerResult<Issue>;

    /// Create an issue.
    async fn create_issue(&self, draft: IssueDraft) -> TrackerResult<Issue>;

    /// Update fields on an issue.
    async fn update_issue(&self, id: u64, patch: IssuePatch) -> TrackerResult<Issue>;

    /// Delete an issue.
    async fn delete_issue(&self, id: u64) -> TrackerResult<()>;

    /// Add a comment to an issue.
    async fn add_comment(&self, id: u64, body: &str) -> TrackerResult<Comment>;
}

/// Client boundary for the code-hosting platform.
#[async_trait]
pub trait CodeHost: Send + Sync {
    /// Create a branch from an existing ref.
    async fn create_branch(&self, name: &str, from: &str) -> TrackerResult<Branch>;
}
