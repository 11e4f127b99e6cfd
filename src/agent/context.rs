//! Context Window Management
//!
//! Converts a thread's stored history into the message array handed
//! to the model backend, and trims it to a recent window.

use crate::types::{ChatMessage, ChatRole, MessageKind, SessionMessage};

/// Build the model-facing message array from session history. The
/// system prompt is not included here; the model client prepends it.
pub fn build_context_messages(history: &[SessionMessage]) -> Vec<ChatMessage> {
    history
        .iter()
        .map(|msg| match msg.kind {
            MessageKind::User => ChatMessage::text(ChatRole::User, msg.content.clone()),
            MessageKind::Assistant => ChatMessage {
                role: ChatRole::Assistant,
                content: msg.content.clone(),
                tool_calls: (!msg.tool_calls.is_empty()).then(|| msg.tool_calls.clone()),
                tool_call_id: None,
            },
            MessageKind::ToolResult => ChatMessage {
                role: ChatRole::Tool,
                content: msg.content.clone(),
                tool_calls: None,
                tool_call_id: msg.tool_call_id.clone(),
            },
        })
        .collect()
}

/// Keep the most recent `max_messages` entries. Leading tool results
/// whose requesting assistant message fell outside the window are
/// dropped too; a tool result without its request is malformed input
/// for the model backend.
pub fn trim_context(history: &[SessionMessage], max_messages: usize) -> Vec<SessionMessage> {
    let start = history.len().saturating_sub(max_messages);
    let window = &history[start..];

    let first_sound = window
        .iter()
        .position(|m| m.kind != MessageKind::ToolResult)
        .unwrap_or(window.len());
    window[first_sound..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolInvocation;

    #[test]
    fn test_mapping_preserves_correlation() {
        let history = vec![
            SessionMessage::user("Where is my order #45821?"),
            SessionMessage::assistant(
                "",
                vec![ToolInvocation {
                    id: "call_a".to_string(),
                    name: "track_order".to_string(),
                    arguments: serde_json::json!({"order_id": 45821}),
                }],
            ),
            SessionMessage::tool_result("call_a", "Order #45821 | paid"),
        ];

        let messages = build_context_messages(&history);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, ChatRole::User);
        assert_eq!(
            messages[1].tool_calls.as_ref().unwrap()[0].id,
            "call_a"
        );
        assert_eq!(messages[2].role, ChatRole::Tool);
        assert_eq!(messages[2].tool_call_id.as_deref(), Some("call_a"));
    }

    #[test]
    fn test_trim_keeps_recent_window() {
        let history: Vec<SessionMessage> =
            (0..10).map(|i| SessionMessage::user(format!("m{i}"))).collect();
        let trimmed = trim_context(&history, 4);
        assert_eq!(trimmed.len(), 4);
        assert_eq!(trimmed[0].content, "m6");
    }

    #[test]
    fn test_trim_drops_orphaned_tool_results() {
        let history = vec![
            SessionMessage::assistant(
                "",
                vec![ToolInvocation {
                    id: "call_x".to_string(),
                    name: "track_order".to_string(),
                    arguments: serde_json::json!({}),
                }],
            ),
            SessionMessage::tool_result("call_x", "result"),
            SessionMessage::user("next question"),
        ];

        // Window of 2 would start at the orphaned tool result
        let trimmed = trim_context(&history, 2);
        assert_eq!(trimmed.len(), 1);
        assert_eq!(trimmed[0].content, "next question");
    }
}
