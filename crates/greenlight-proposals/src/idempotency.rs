//! Idempotency key derivation.

use greenlight_core::{ConversationId, Timestamp};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Derive the idempotency key for one proposal creation event.
///
/// The key is a SHA-256 digest over the conversation ID, tool name,
/// canonical argument JSON, and creation instant, hex-encoded. Two
/// creations of the same logical action at the same instant collide
/// (that is the collision barrier); the same action re-proposed at a
/// distinct instant gets a distinct key and is a legitimate re-proposal.
#[must_use]
pub fn derive_idempotency_key(
    conversation_id: &ConversationId,
    tool_name: &str,
    tool_arguments: &Value,
    created_at: Timestamp,
) -> String {
    // serde_json renders object keys in sorted order, so the argument
    // payload serializes canonically.
    let args = tool_arguments.to_string();

    let mut hasher = Sha256::new();
    hasher.update(conversation_id.to_string().as_bytes());
    hasher.update([0]);
    hasher.update(tool_name.as_bytes());
    hasher.update([0]);
    hasher.update(args.as_bytes());
    hasher.update([0]);
    hasher.update(created_at.to_rfc3339().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_same_inputs_same_key() {
        let conv = ConversationId::new();
        let at = Timestamp::now();
        let args = json!({"title": "Fix login bug", "priority": 2});

        let a = derive_idempotency_key(&conv, "create_issue", &args, at);
        let b = derive_idempotency_key(&conv, "create_issue", &args, at);
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_order_insensitive_arguments() {
        let conv = ConversationId::new();
        let at = Timestamp::now();
        let a = json!({"priority": 2, "title": "Fix login bug"});
        let b = json!({"title": "Fix login bug", "priority": 2});
        assert_eq!(
            derive_idempotency_key(&conv, "create_issue", &a, at),
            derive_idempotency_key(&conv, "create_issue", &b, at),
        );
    }

    #[test]
    fn test_distinct_instants_distinct_keys() {
        let conv = ConversationId::new();
        let args = json!({"title": "Fix login bug"});
        let a = derive_idempotency_key(&conv, "create_issue", &args, Timestamp::now());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = derive_idempotency_key(&conv, "create_issue", &args, Timestamp::now());
        assert_ne!(a, b);
    }

    #[test]
    fn test_distinct_tools_distinct_keys() {
        let conv = ConversationId::new();
        let at = Timestamp::now();
        let args = json!({"id": 7});
        assert_ne!(
            derive_idempotency_key(&conv, "update_issue", &args, at),
            derive_idempotency_key(&conv, "add_comment", &args, at),
        );
    }
}
