//! Issue tracker tools.
//!
//! `search_issues` and `get_issue` are read-only and execute inline in
//! the conversation loop. The rest mutate the tracker and require
//! approval.

use greenlight_core::{PreviewField, ToolCategory};
use serde_json::{json, Value};

use crate::outcome::HandlerOutcome;
use crate::tracker::{IssueDraft, IssuePatch, IssueStatus};
use crate::{Tool, ToolContext, ToolError, ToolResult};

const DEFAULT_SEARCH_LIMIT: usize = 10;
const DEFAULT_PRIORITY: u8 = 3;

fn require_str<'a>(args: &'a Value, key: &str, tool: &'static str) -> ToolResult<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason: format!("{key} is required"),
        })
}

fn require_u64(args: &Value, key: &str, tool: &'static str) -> ToolResult<u64> {
    args.get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason: format!("{key} is required and must be a positive integer"),
        })
}

fn optional_priority(args: &Value, tool: &'static str) -> ToolResult<Option<u8>> {
    match args.get("priority") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let p = value.as_u64().ok_or_else(|| ToolError::InvalidArguments {
                tool: tool.to_string(),
                reason: "priority must be an integer".to_string(),
            })?;
            match u8::try_from(p) {
                Ok(p) if (1..=4).contains(&p) => Ok(Some(p)),
                _ => Err(ToolError::InvalidArguments {
                    tool: tool.to_string(),
                    reason: format!("priority must be 1-4, got {p}"),
                }),
            }
        },
    }
}

fn optional_status(args: &Value, tool: &'static str) -> ToolResult<Option<IssueStatus>> {
    match args.get("status") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let s = value.as_str().ok_or_else(|| ToolError::InvalidArguments {
                tool: tool.to_string(),
                reason: "status must be a string".to_string(),
            })?;
            s.parse().map(Some).map_err(|reason| ToolError::InvalidArguments {
                tool: tool.to_string(),
                reason,
            })
        },
    }
}

fn parse_issue_patch(args: &Value, tool: &'static str) -> ToolResult<IssuePatch> {
    let patch = IssuePatch {
        title: args
            .get("title")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        status: optional_status(args, tool)?,
        priority: optional_priority(args, tool)?,
        assignee: args
            .get("assignee")
            .and_then(Value::as_str)
            .map(ToString::to_string),
    };
    if patch.is_empty() {
        return Err(ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason: "at least one of title, status, priority, assignee is required".to_string(),
        });
    }
    Ok(patch)
}

fn patch_preview(patch: &IssuePatch) -> Vec<PreviewField> {
    let mut fields = Vec::new();
    if let Some(title) = &patch.title {
        fields.push(PreviewField::new("title", json!(title)));
    }
    if let Some(status) = patch.status {
        fields.push(PreviewField::new("status", json!(status.to_string())));
    }
    if let Some(priority) = patch.priority {
        fields.push(PreviewField::new("priority", json!(priority)));
    }
    if let Some(assignee) = &patch.assignee {
        fields.push(PreviewField::new("assignee", json!(assignee)));
    }
    fields
}

/// Read-only full-text search over issues.
pub struct SearchIssuesTool;

#[async_trait::async_trait]
impl Tool for SearchIssuesTool {
    fn name(&self) -> &'static str {
        "search_issues"
    }

    fn description(&self) -> &'static str {
        "Searches issues by text in title or body. Returns matching issues with \
         their number, title, status, and priority."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Text to search for"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of results (default 10)"
                }
            },
            "required": ["query"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Issues
    }

    fn requires_approval(&self) -> bool {
        false
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> HandlerOutcome {
        let query = match require_str(&args, "query", "search_issues") {
            Ok(q) => q,
            Err(e) => return HandlerOutcome::failure(e.to_string()),
        };
        let limit = args
            .get("limit")
            .and_then(Value::as_u64)
            .map_or(DEFAULT_SEARCH_LIMIT, |n| usize::try_from(n).unwrap_or(DEFAULT_SEARCH_LIMIT));

        match ctx.tracker.search_issues(query, limit).await {
            Ok(issues) => HandlerOutcome::success(json!({ "issues": issues })),
            Err(e) => HandlerOutcome::failure(e.to_string()),
        }
    }
}

/// Read-only fetch of a single issue.
pub struct GetIssueTool;

#[async_trait::async_trait]
impl Tool for GetIssueTool {
    fn name(&self) -> &'static str {
        "get_issue"
    }

    fn description(&self) -> &'static str {
        "Fetches a single issue by number, including title, body, status, \
         priority, and assignee."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {
                    "type": "integer",
                    "description": "Issue number"
                }
            },
            "required": ["id"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Issues
    }

    fn requires_approval(&self) -> bool {
        false
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> HandlerOutcome {
        let id = match require_u64(&args, "id", "get_issue") {
            Ok(id) => id,
            Err(e) => return HandlerOutcome::failure(e.to_string()),
        };
        match ctx.tracker.get_issue(id).await {
            Ok(issue) => {
                let url = issue.url.clone();
                HandlerOutcome::success_with_url(json!(issue), url)
            },
            Err(e) => HandlerOutcome::failure(e.to_string()),
        }
    }
}

/// Creates a new issue. Requires approval.
pub struct CreateIssueTool;

impl CreateIssueTool {
    fn parse(args: &Value) -> ToolResult<IssueDraft> {
        let title = require_str(args, "title", "create_issue")?;
        let body = args.get("body").and_then(Value::as_str).unwrap_or_default();
        let priority = optional_priority(args, "create_issue")?.unwrap_or(DEFAULT_PRIORITY);
        Ok(IssueDraft {
            title: title.to_string(),
            body: body.to_string(),
            priority,
        })
    }
}

#[async_trait::async_trait]
impl Tool for CreateIssueTool {
    fn name(&self) -> &'static str {
        "create_issue"
    }

    fn description(&self) -> &'static str {
        "Creates a new issue in the tracker with a title, optional body, and \
         optional priority (1 urgent - 4 low)."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "Issue title"
                },
                "body": {
                    "type": "string",
                    "description": "Issue body"
                },
                "priority": {
                    "type": "integer",
                    "description": "Priority, 1 (urgent) through 4 (low); default 3"
                }
            },
            "required": ["title"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Issues
    }

    fn requires_approval(&self) -> bool {
        true
    }

    fn preview(&self, args: &Value) -> ToolResult<Vec<PreviewField>> {
        let draft = Self::parse(args)?;
        let mut fields = vec![PreviewField::new("title", json!(draft.title))];
        if !draft.body.is_empty() {
            fields.push(PreviewField::new("body", json!(draft.body)));
        }
        fields.push(PreviewField::new("priority", json!(draft.priority)));
        Ok(fields)
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> HandlerOutcome {
        let draft = match Self::parse(&args) {
            Ok(draft) => draft,
            Err(e) => return HandlerOutcome::failure(e.to_string()),
        };
        match ctx.tracker.create_issue(draft).await {
            Ok(issue) => {
                let url = issue.url.clone();
                HandlerOutcome::success_with_url(
                    json!({"id": issue.id, "title": issue.title}),
                    url,
                )
            },
            Err(e) => HandlerOutcome::failure(e.to_string()),
        }
    }
}

/// Updates fields on a single issue. Requires approval.
pub struct UpdateIssueTool;

#[async_trait::async_trait]
impl Tool for UpdateIssueTool {
    fn name(&self) -> &'static str {
        "update_issue"
    }

    fn description(&self) -> &'static str {
        "Updates an existing issue. Any of title, status (open, in_progress, \
         done), priority, or assignee may be changed."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {
                    "type": "integer",
                    "description": "Issue number"
                },
                "title": { "type": "string" },
                "status": {
                    "type": "string",
                    "enum": ["open", "in_progress", "done"]
                },
                "priority": { "type": "integer" },
                "assignee": { "type": "string" }
            },
            "required": ["id"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Issues
    }

    fn requires_approval(&self) -> bool {
        true
    }

    fn preview(&self, args: &Value) -> ToolResult<Vec<PreviewField>> {
        let id = require_u64(args, "id", "update_issue")?;
        let patch = parse_issue_patch(args, "update_issue")?;
        let mut fields = vec![PreviewField::new("issue", json!(format!("#{id}")))];
        fields.extend(patch_preview(&patch));
        Ok(fields)
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> HandlerOutcome {
        let parsed = require_u64(&args, "id", "update_issue")
            .and_then(|id| parse_issue_patch(&args, "update_issue").map(|patch| (id, patch)));
        let (id, patch) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => return HandlerOutcome::failure(e.to_string()),
        };
        match ctx.tracker.update_issue(id, patch).await {
            Ok(issue) => {
                let url = issue.url.clone();
                HandlerOutcome::success_with_url(
                    json!({"id": issue.id, "title": issue.title, "status": issue.status}),
                    url,
                )
            },
            Err(e) => HandlerOutcome::failure(e.to_string()),
        }
    }
}

/// Applies the same field changes to a batch of issues. Requires approval.
///
/// Reports a partial outcome when a strict subset of the batch succeeds.
pub struct BulkUpdateIssuesTool;

impl BulkUpdateIssuesTool {
    fn parse(args: &Value) -> ToolResult<(Vec<u64>, IssuePatch)> {
        let ids = args
            .get("issue_ids")
            .and_then(Value::as_array)
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: "bulk_update_issues".to_string(),
                reason: "issue_ids is required and must be an array".to_string(),
            })?;
        let ids: Vec<u64> = ids
            .iter()
            .map(|v| {
                v.as_u64().ok_or_else(|| ToolError::InvalidArguments {
                    tool: "bulk_update_issues".to_string(),
                    reason: "issue_ids must contain positive integers".to_string(),
                })
            })
            .collect::<ToolResult<_>>()?;
        if ids.is_empty() {
            return Err(ToolError::InvalidArguments {
                tool: "bulk_update_issues".to_string(),
                reason: "issue_ids must not be empty".to_string(),
            });
        }
        let patch = parse_issue_patch(args, "bulk_update_issues")?;
        Ok((ids, patch))
    }
}

#[async_trait::async_trait]
impl Tool for BulkUpdateIssuesTool {
    fn name(&self) -> &'static str {
        "bulk_update_issues"
    }

    fn description(&self) -> &'static str {
        "Applies the same update (status, priority, or assignee) to several \
         issues at once."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "issue_ids": {
                    "type": "array",
                    "items": { "type": "integer" },
                    "description": "Issue numbers to update"
                },
                "status": {
                    "type": "string",
                    "enum": ["open", "in_progress", "done"]
                },
                "priority": { "type": "integer" },
                "assignee": { "type": "string" }
            },
            "required": ["issue_ids"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Issues
    }

    fn requires_approval(&self) -> bool {
        true
    }

    fn preview(&self, args: &Value) -> ToolResult<Vec<PreviewField>> {
        let (ids, patch) = Self::parse(args)?;
        let mut fields = vec![PreviewField::new("issue_ids", json!(ids))];
        fields.extend(patch_preview(&patch));
        Ok(fields)
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> HandlerOutcome {
        let (ids, patch) = match Self::parse(&args) {
            Ok(parsed) => parsed,
            Err(e) => return HandlerOutcome::failure(e.to_string()),
        };

        let mut updated = Vec::new();
        let mut failures = Vec::new();
        for id in &ids {
            match ctx.tracker.update_issue(*id, patch.clone()).await {
                Ok(issue) => updated.push(issue.id),
                Err(e) => failures.push(json!({"id": id, "error": e.to_string()})),
            }
        }

        let detail = json!({"updated": updated, "failed": failures});
        if failures.is_empty() {
            HandlerOutcome::success(detail)
        } else if updated.is_empty() {
            HandlerOutcome::failure(format!(
                "all {} updates failed: {}",
                ids.len(),
                failures[0]["error"].as_str().unwrap_or("unknown error")
            ))
        } else {
            HandlerOutcome::Partial {
                succeeded: updated.len(),
                failed: failures.len(),
                detail,
                url: None,
            }
        }
    }
}

/// Adds a comment to an issue. Requires approval.
pub struct AddCommentTool;

#[async_trait::async_trait]
impl Tool for AddCommentTool {
    fn name(&self) -> &'static str {
        "add_comment"
    }

    fn description(&self) -> &'static str {
        "Adds a comment to an existing issue."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {
                    "type": "integer",
                    "description": "Issue number"
                },
                "body": {
                    "type": "string",
                    "description": "Comment text"
                }
            },
            "required": ["id", "body"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Issues
    }

    fn requires_approval(&self) -> bool {
        true
    }

    fn preview(&self, args: &Value) -> ToolResult<Vec<PreviewField>> {
        let id = require_u64(args, "id", "add_comment")?;
        let body = require_str(args, "body", "add_comment")?;
        Ok(vec![
            PreviewField::new("issue", json!(format!("#{id}"))),
            PreviewField::new("comment", json!(body)),
        ])
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> HandlerOutcome {
        let parsed = require_u64(&args, "id", "add_comment")
            .and_then(|id| require_str(&args, "body", "add_comment").map(|body| (id, body)));
        let (id, body) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => return HandlerOutcome::failure(e.to_string()),
        };
        match ctx.tracker.add_comment(id, body).await {
            Ok(comment) => {
                let url = comment.url.clone();
                HandlerOutcome::success_with_url(
                    json!({"id": comment.id, "issue_id": comment.issue_id}),
                    url,
                )
            },
            Err(e) => HandlerOutcome::failure(e.to_string()),
        }
    }
}

/// Deletes an issue. Requires approval; destructive.
pub struct DeleteIssueTool;

#[async_trait::async_trait]
impl Tool for DeleteIssueTool {
    fn name(&self) -> &'static str {
        "delete_issue"
    }

    fn description(&self) -> &'static str {
        "Permanently deletes an issue from the tracker."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {
                    "type": "integer",
                    "description": "Issue number"
                }
            },
            "required": ["id"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Issues
    }

    fn requires_approval(&self) -> bool {
        true
    }

    fn destructive(&self) -> bool {
        true
    }

    fn preview(&self, args: &Value) -> ToolResult<Vec<PreviewField>> {
        let id = require_u64(args, "id", "delete_issue")?;
        Ok(vec![PreviewField::changed(
            "issue",
            json!(format!("#{id}")),
            Value::Null,
        )])
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> HandlerOutcome {
        let id = match require_u64(&args, "id", "delete_issue") {
            Ok(id) => id,
            Err(e) => return HandlerOutcome::failure(e.to_string()),
        };
        match ctx.tracker.delete_issue(id).await {
            Ok(()) => HandlerOutcome::success(json!({"id": id})),
            Err(e) => HandlerOutcome::failure(e.to_string()),
        }
    }
}
