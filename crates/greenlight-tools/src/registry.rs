//! Registry of tools for lookup, classification, and preview generation.

use greenlight_core::{PreviewField, ToolCategory};
use greenlight_llm::LlmToolDefinition;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::issues::{
    AddCommentTool, BulkUpdateIssuesTool, CreateIssueTool, DeleteIssueTool, GetIssueTool,
    SearchIssuesTool, UpdateIssueTool,
};
use crate::repository::CreateBranchTool;
use crate::{Tool, ToolError, ToolResult};

/// Immutable catalog of callable operations.
///
/// Built once at process start and injected by reference into both the
/// conversation loop and the approval manager, so the two can never
/// disagree about what exists or what needs approval.
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Create a registry with the default tool set registered.
    #[must_use]
    pub fn with_default_tools() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SearchIssuesTool));
        registry.register(Arc::new(GetIssueTool));
        registry.register(Arc::new(CreateIssueTool));
        registry.register(Arc::new(UpdateIssueTool));
        registry.register(Arc::new(BulkUpdateIssuesTool));
        registry.register(Arc::new(AddCommentTool));
        registry.register(Arc::new(DeleteIssueTool));
        registry.register(Arc::new(CreateBranchTool));
        registry
    }

    /// Register a tool.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        tracing::debug!(
            tool = tool.name(),
            write = tool.requires_approval(),
            "registering tool"
        );
        self.tools.insert(tool.name(), tool);
    }

    /// Get a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Look up a tool, reporting unknown names as an error.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] for an unregistered name.
    pub fn lookup(&self, name: &str) -> ToolResult<&Arc<dyn Tool>> {
        self.tools.get(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_string(),
        })
    }

    /// Whether the named tool mutates external state.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] for an unregistered name.
    pub fn is_write_tool(&self, name: &str) -> ToolResult<bool> {
        Ok(self.lookup(name)?.requires_approval())
    }

    /// Generate the approval preview for a write tool invocation.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] for an unregistered name, or
    /// [`ToolError::InvalidArguments`] when the payload does not match
    /// the tool's schema.
    pub fn generate_preview(&self, name: &str, args: &Value) -> ToolResult<Vec<PreviewField>> {
        self.lookup(name)?.preview(args)
    }

    /// Export all tool definitions for the model's catalog.
    #[must_use]
    pub fn definitions(&self) -> Vec<LlmToolDefinition> {
        self.tools
            .values()
            .map(|t| {
                LlmToolDefinition::new(t.name())
                    .with_description(t.description())
                    .with_schema(t.input_schema())
            })
            .collect()
    }

    /// Write tools grouped by category.
    ///
    /// Feeds the capability section of the system prompt so the model's
    /// self-description cannot drift from the registry.
    #[must_use]
    pub fn write_tools_by_category(&self) -> BTreeMap<ToolCategory, Vec<&Arc<dyn Tool>>> {
        let mut grouped: BTreeMap<ToolCategory, Vec<&Arc<dyn Tool>>> = BTreeMap::new();
        for tool in self.tools.values().filter(|t| t.requires_approval()) {
            grouped.entry(tool.category()).or_default().push(tool);
        }
        grouped
    }

    /// Read tools, in name order.
    #[must_use]
    pub fn read_tools(&self) -> Vec<&Arc<dyn Tool>> {
        self.tools
            .values()
            .filter(|t| !t.requires_approval())
            .collect()
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_tools_registered() {
        let registry = ToolRegistry::with_default_tools();
        assert_eq!(registry.len(), 8);
        assert!(registry.get("create_issue").is_some());
        assert!(registry.get("search_issues").is_some());
    }

    #[test]
    fn test_unknown_tool_is_an_error() {
        let registry = ToolRegistry::with_default_tools();
        let err = registry.is_write_tool("frobnicate").unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool { .. }));
        let err = registry.generate_preview("frobnicate", &json!({})).unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool { .. }));
    }

    #[test]
    fn test_classification() {
        let registry = ToolRegistry::with_default_tools();
        assert!(registry.is_write_tool("create_issue").unwrap());
        assert!(registry.is_write_tool("bulk_update_issues").unwrap());
        assert!(!registry.is_write_tool("search_issues").unwrap());
        assert!(!registry.is_write_tool("get_issue").unwrap());
    }

    #[test]
    fn test_preview_matches_schema_keys() {
        let registry = ToolRegistry::with_default_tools();
        let fields = registry
            .generate_preview(
                "create_issue",
                &json!({"title": "Fix login bug", "priority": 2}),
            )
            .unwrap();
        assert!(!fields.is_empty());
        let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
        assert!(names.contains(&"title"));
        assert!(names.contains(&"priority"));
    }

    #[test]
    fn test_definitions_cover_all_tools() {
        let registry = ToolRegistry::with_default_tools();
        let defs = registry.definitions();
        assert_eq!(defs.len(), registry.len());
        assert!(defs.iter().all(|d| d.description.is_some()));
    }

    #[test]
    fn test_write_tools_grouped_by_category() {
        let registry = ToolRegistry::with_default_tools();
        let grouped = registry.write_tools_by_category();

        let issues = grouped.get(&ToolCategory::Issues).expect("issues group");
        assert!(issues.iter().any(|t| t.name() == "create_issue"));
        // Read tools must not appear in the write grouping.
        assert!(!issues.iter().any(|t| t.name() == "search_issues"));

        let repo = grouped
            .get(&ToolCategory::Repository)
            .expect("repository group");
        assert_eq!(repo.len(), 1);
        assert_eq!(repo[0].name(), "create_branch");
    }
}
