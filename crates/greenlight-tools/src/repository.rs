//! Code-hosting platform tools.

use greenlight_core::{PreviewField, ToolCategory};
use serde_json::{json, Value};

use crate::outcome::HandlerOutcome;
use crate::{Tool, ToolContext, ToolError, ToolResult};

const DEFAULT_BASE_REF: &str = "main";

/// Creates a branch on the code host. Requires approval.
pub struct CreateBranchTool;

impl CreateBranchTool {
    fn parse(args: &Value) -> ToolResult<(String, String)> {
        let name = args
            .get("name")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: "create_branch".to_string(),
                reason: "name is required".to_string(),
            })?;
        let from = args
            .get("from")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_BASE_REF);
        Ok((name.to_string(), from.to_string()))
    }
}

#[async_trait::async_trait]
impl Tool for CreateBranchTool {
    fn name(&self) -> &'static str {
        "create_branch"
    }

    fn description(&self) -> &'static str {
        "Creates a new branch on the code host from an existing ref \
         (default: main)."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Name of the new branch"
                },
                "from": {
                    "type": "string",
                    "description": "Ref to branch from (default: main)"
                }
            },
            "required": ["name"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Repository
    }

    fn requires_approval(&self) -> bool {
        true
    }

    fn preview(&self, args: &Value) -> ToolResult<Vec<PreviewField>> {
        let (name, from) = Self::parse(args)?;
        Ok(vec![
            PreviewField::new("branch", json!(name)),
            PreviewField::new("from", json!(from)),
        ])
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> HandlerOutcome {
        let (name, from) = match Self::parse(&args) {
            Ok(parsed) => parsed,
            Err(e) => return HandlerOutcome::failure(e.to_string()),
        };
        match ctx.code_host.create_branch(&name, &from).await {
            Ok(branch) => {
                let url = branch.url.clone();
                HandlerOutcome::success_with_url(
                    json!({"name": branch.name, "from": branch.from}),
                    url,
                )
            },
            Err(e) => HandlerOutcome::failure(e.to_string()),
        }
    }
}
