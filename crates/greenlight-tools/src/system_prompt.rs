//! System prompt assembly.
//!
//! The capability section is derived from the registry itself. This is
//! a correctness property, not a style choice: a model that believes it
//! can do something not in the registry will either hallucinate an
//! invocation or make false promises in prose.

use crate::registry::ToolRegistry;
use std::fmt::Write;

/// Build the complete system prompt for a conversation.
#[must_use]
pub fn build_system_prompt(registry: &ToolRegistry) -> String {
    let mut prompt = String::from(OPENING);

    let read_tools = registry.read_tools();
    if !read_tools.is_empty() {
        prompt.push_str("\n\n# Lookup tools (run immediately)\n");
        for tool in read_tools {
            let _ = writeln!(prompt, "- `{}` — {}", tool.name(), tool.description());
        }
    }

    let grouped = registry.write_tools_by_category();
    if !grouped.is_empty() {
        prompt.push_str("\n# Actions (require the user's approval)\n");
        for (category, tools) in &grouped {
            let _ = writeln!(prompt, "\n## {category}");
            for tool in tools {
                let _ = writeln!(prompt, "- `{}` — {}", tool.name(), tool.description());
            }
        }
    }

    prompt.push_str(APPROVAL_GUIDELINES);
    prompt
}

const OPENING: &str = "\
You are an assistant that helps the user work with their issue tracker \
and code host. You can look information up directly, and you can propose \
changes — every change is shown to the user for approval before it runs.";

const APPROVAL_GUIDELINES: &str = "\n\
# Approval flow

- When you invoke an action tool, it does NOT execute. It is proposed to \
the user, who approves or declines it out of band.
- After proposing an action, tell the user what you proposed and that it \
awaits their decision. Never claim the action already happened.
- If a proposal is declined or fails, acknowledge it and ask how to \
proceed rather than silently retrying.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_lists_every_write_tool() {
        let registry = ToolRegistry::with_default_tools();
        let prompt = build_system_prompt(&registry);

        for (_, tools) in registry.write_tools_by_category() {
            for tool in tools {
                assert!(
                    prompt.contains(tool.name()),
                    "prompt missing write tool {}",
                    tool.name()
                );
            }
        }
    }

    #[test]
    fn test_prompt_groups_by_category() {
        let registry = ToolRegistry::with_default_tools();
        let prompt = build_system_prompt(&registry);
        assert!(prompt.contains("## Issues"));
        assert!(prompt.contains("## Repository"));
    }

    #[test]
    fn test_prompt_mentions_approval_contract() {
        let registry = ToolRegistry::with_default_tools();
        let prompt = build_system_prompt(&registry);
        assert!(prompt.contains("does NOT execute"));
    }
}
