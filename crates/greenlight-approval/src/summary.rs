//! Description and summary templates.
//!
//! Tool-name-keyed lookup with a generic fallback, so adding a new
//! write tool without a bespoke template degrades gracefully instead of
//! breaking.

use serde_json::Value;

/// One-line human-readable summary of what a proposed action intends.
#[must_use]
pub fn describe_action(tool_name: &str, args: &Value) -> String {
    match tool_name {
        "create_issue" => {
            let title = args.get("title").and_then(Value::as_str).unwrap_or("untitled");
            match args.get("priority").and_then(Value::as_u64) {
                Some(priority) => format!("Create issue: {title} (Priority: {priority})"),
                None => format!("Create issue: {title}"),
            }
        },
        "update_issue" => {
            let id = args.get("id").and_then(Value::as_u64).unwrap_or_default();
            format!("Update issue #{id}: {}", field_summary(args))
        },
        "bulk_update_issues" => {
            let count = args
                .get("issue_ids")
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            format!("Update {count} issues: {}", field_summary(args))
        },
        "add_comment" => {
            let id = args.get("id").and_then(Value::as_u64).unwrap_or_default();
            format!("Comment on issue #{id}")
        },
        "delete_issue" => {
            let id = args.get("id").and_then(Value::as_u64).unwrap_or_default();
            format!("Delete issue #{id}")
        },
        "create_branch" => {
            let name = args.get("name").and_then(Value::as_str).unwrap_or("unnamed");
            let from = args.get("from").and_then(Value::as_str).unwrap_or("main");
            format!("Create branch {name} from {from}")
        },
        other => format!("Execute {other}"),
    }
}

/// Human-readable summary of a clean handler success.
#[must_use]
pub fn summarize_success(tool_name: &str, result: &Value) -> String {
    match tool_name {
        "create_issue" => {
            let id = result.get("id").and_then(Value::as_u64).unwrap_or_default();
            let title = result.get("title").and_then(Value::as_str).unwrap_or_default();
            format!("Created issue #{id}: {title}")
        },
        "update_issue" => {
            let id = result.get("id").and_then(Value::as_u64).unwrap_or_default();
            format!("Updated issue #{id}")
        },
        "bulk_update_issues" => {
            let count = result
                .get("updated")
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            format!("Updated {count} issues")
        },
        "add_comment" => {
            let id = result
                .get("issue_id")
                .and_then(Value::as_u64)
                .unwrap_or_default();
            format!("Added comment to issue #{id}")
        },
        "delete_issue" => {
            let id = result.get("id").and_then(Value::as_u64).unwrap_or_default();
            format!("Deleted issue #{id}")
        },
        "create_branch" => {
            let name = result.get("name").and_then(Value::as_str).unwrap_or_default();
            format!("Created branch {name}")
        },
        // Fallback: raw result serialization.
        _ => result.to_string(),
    }
}

/// Summary for a partial batch outcome that discloses the split.
#[must_use]
pub fn summarize_partial(tool_name: &str, succeeded: usize, failed: usize) -> String {
    let total = succeeded + failed;
    match tool_name {
        "bulk_update_issues" => {
            format!("Updated {succeeded}/{total} issues ({failed} failed)")
        },
        _ => format!("Completed {succeeded}/{total} operations ({failed} failed)"),
    }
}

/// Comma-joined rendering of the fields an update changes.
fn field_summary(args: &Value) -> String {
    let mut parts = Vec::new();
    for key in ["title", "status", "priority", "assignee"] {
        if let Some(value) = args.get(key) {
            match value {
                Value::String(s) => parts.push(format!("{key}: {s}")),
                Value::Number(n) => parts.push(format!("{key}: {n}")),
                _ => {},
            }
        }
    }
    if parts.is_empty() {
        "no changes".to_string()
    } else {
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_issue_description() {
        let desc = describe_action(
            "create_issue",
            &json!({"title": "Fix login bug", "priority": 2}),
        );
        assert_eq!(desc, "Create issue: Fix login bug (Priority: 2)");

        let desc = describe_action("create_issue", &json!({"title": "Fix login bug"}));
        assert_eq!(desc, "Create issue: Fix login bug");
    }

    #[test]
    fn test_bulk_update_description() {
        let desc = describe_action(
            "bulk_update_issues",
            &json!({"issue_ids": [1, 2, 3], "status": "done"}),
        );
        assert_eq!(desc, "Update 3 issues: status: done");
    }

    #[test]
    fn test_unknown_tool_falls_back() {
        let desc = describe_action("merge_pull_request", &json!({}));
        assert_eq!(desc, "Execute merge_pull_request");
    }

    #[test]
    fn test_success_summaries() {
        let summary =
            summarize_success("create_issue", &json!({"id": 7, "title": "Fix login bug"}));
        assert_eq!(summary, "Created issue #7: Fix login bug");

        let summary = summarize_success("create_branch", &json!({"name": "fix/login"}));
        assert_eq!(summary, "Created branch fix/login");
    }

    #[test]
    fn test_unknown_success_serializes_raw_result() {
        let summary = summarize_success("merge_pull_request", &json!({"merged": true}));
        assert_eq!(summary, "{\"merged\":true}");
    }

    #[test]
    fn test_partial_summary_discloses_split() {
        let summary = summarize_partial("bulk_update_issues", 3, 2);
        assert_eq!(summary, "Updated 3/5 issues (2 failed)");
    }
}
