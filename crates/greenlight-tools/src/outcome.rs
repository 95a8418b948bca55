//! The tool handler outcome contract.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a tool handler reports back after running.
///
/// A tagged three-way outcome so the approval manager's classification
/// (failure / partial / success) is exhaustive instead of inspecting ad
/// hoc payload fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HandlerOutcome {
    /// The action ran to completion.
    Success {
        /// Tool-specific result payload, consumed by summary templates.
        result: Value,
        /// Link to the created/updated resource, when known.
        #[serde(skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    /// A batch action where a strict subset of items completed.
    ///
    /// Still a terminal success: the action did run and produced a
    /// real, inspectable outcome. It is not retryable as a whole.
    Partial {
        /// Number of items that completed.
        succeeded: usize,
        /// Number of items that did not.
        failed: usize,
        /// Per-item detail payload.
        detail: Value,
        /// Link to the affected resources, when known.
        #[serde(skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    /// The action did not run to completion.
    Failure {
        /// Human-readable failure message, preserved for the retry path.
        message: String,
    },
}

impl HandlerOutcome {
    /// Success with no resource link.
    #[must_use]
    pub fn success(result: Value) -> Self {
        Self::Success { result, url: None }
    }

    /// Success with a resource link.
    #[must_use]
    pub fn success_with_url(result: Value, url: impl Into<String>) -> Self {
        Self::Success {
            result,
            url: Some(url.into()),
        }
    }

    /// Failure with a message.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    /// Whether the action produced a terminal success (full or partial).
    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failure { .. })
    }
}
