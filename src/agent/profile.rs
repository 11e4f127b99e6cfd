//! Agent Profiles
//!
//! A profile binds an agent kind to its capability set and wraps the
//! model call. The model is handed tool definitions built from the
//! bound set only: tools outside it are absent from the schema, not
//! merely flagged. This is a second barrier, independent of routing.

use tracing::debug;

use crate::tools::{CapabilitySet, ToolRegistry};
use crate::types::{
    AgentKind, AgentOutput, MessageKind, ModelClient, SessionMessage, StorebotConfig, TokenUsage,
};

use super::context::{build_context_messages, trim_context};
use super::system_prompt::build_system_prompt;

pub struct AgentProfile {
    pub kind: AgentKind,
    pub capability_set: CapabilitySet,
}

/// One agent invocation, classified. When the model returns both text
/// and tool calls, the output is `ToolRequests` and the text survives
/// here as non-final history content.
pub struct AgentReply {
    pub output: AgentOutput,
    pub deferred_text: String,
    pub usage: TokenUsage,
}

impl AgentProfile {
    pub fn for_kind(kind: AgentKind) -> Self {
        let capability_set = match kind {
            AgentKind::Customer => ToolRegistry::customer_capability_set(),
            AgentKind::Admin => ToolRegistry::admin_capability_set(),
        };
        Self {
            kind,
            capability_set,
        }
    }

    /// Invoke the agent on the given history. Stateless between
    /// invocations; the caller owns all history. Never writes to the
    /// session store.
    pub async fn invoke(
        &self,
        model: &dyn ModelClient,
        registry: &ToolRegistry,
        config: &StorebotConfig,
        history: &[SessionMessage],
    ) -> anyhow::Result<AgentReply> {
        let system_prompt = build_system_prompt(self.kind, config);
        let tools = registry.definitions_for(&self.capability_set);
        let window = trim_context(history, config.context_window_messages);
        let messages = build_context_messages(&window);

        debug!(
            agent = self.kind.as_str(),
            tools = tools.len(),
            messages = messages.len(),
            "invoking agent"
        );

        let response = model.complete(&system_prompt, &tools, &messages).await?;

        // Tool calls win: any accompanying text is non-final
        let (output, deferred_text) = if !response.tool_calls.is_empty() {
            (AgentOutput::ToolRequests(response.tool_calls), response.text)
        } else {
            (
                AgentOutput::FinalAnswer {
                    text: response.text,
                    cited_sources: cited_sources(history),
                },
                String::new(),
            )
        };
        Ok(AgentReply {
            output,
            deferred_text,
            usage: response.usage,
        })
    }
}

/// Names of the tools whose results fed this turn, in invocation
/// order: the assistant tool requests issued since the last user
/// message.
fn cited_sources(history: &[SessionMessage]) -> Vec<String> {
    let turn_start = history
        .iter()
        .rposition(|m| m.kind == MessageKind::User)
        .map(|i| i + 1)
        .unwrap_or(0);

    let mut sources: Vec<String> = Vec::new();
    for msg in &history[turn_start..] {
        for call in &msg.tool_calls {
            if !sources.contains(&call.name) {
                sources.push(call.name.clone());
            }
        }
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::MockModel;
    use crate::types::ToolInvocation;
    use crate::types::default_config;

    fn invocation(id: &str, name: &str) -> ToolInvocation {
        ToolInvocation {
            id: id.to_string(),
            name: name.to_string(),
            arguments: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn test_customer_schema_omits_admin_tools() {
        let model = MockModel::new().push_final("hello");
        let profile = AgentProfile::for_kind(AgentKind::Customer);
        let registry = ToolRegistry::with_builtin_tools();

        profile
            .invoke(&model, &registry, &default_config(), &[])
            .await
            .unwrap();

        let calls = model.calls.lock().unwrap();
        assert!(calls[0].tool_names.contains(&"track_order".to_string()));
        assert!(!calls[0].tool_names.contains(&"get_sales_report".to_string()));
    }

    #[tokio::test]
    async fn test_text_with_tool_calls_is_tool_requests() {
        let model = MockModel::new().push_response(
            "Let me check that for you.",
            vec![invocation("call_1", "track_order")],
        );
        let profile = AgentProfile::for_kind(AgentKind::Customer);
        let registry = ToolRegistry::with_builtin_tools();

        let reply = profile
            .invoke(&model, &registry, &default_config(), &[])
            .await
            .unwrap();

        match reply.output {
            AgentOutput::ToolRequests(requests) => {
                assert_eq!(requests.len(), 1);
                assert_eq!(requests[0].name, "track_order");
            }
            other => panic!("expected tool requests, got {other:?}"),
        }
        assert_eq!(reply.deferred_text, "Let me check that for you.");
    }

    #[tokio::test]
    async fn test_final_answer_cites_turn_tools() {
        let model = MockModel::new().push_final("Your order shipped yesterday.");
        let profile = AgentProfile::for_kind(AgentKind::Customer);
        let registry = ToolRegistry::with_builtin_tools();

        let history = vec![
            SessionMessage::user("old question"),
            SessionMessage::assistant("old answer", Vec::new()),
            SessionMessage::user("Where is my order #45821?"),
            SessionMessage::assistant("", vec![invocation("call_a", "track_order")]),
            SessionMessage::tool_result("call_a", "Order #45821 | shipped"),
        ];

        let reply = profile
            .invoke(&model, &registry, &default_config(), &history)
            .await
            .unwrap();

        match reply.output {
            AgentOutput::FinalAnswer { cited_sources, .. } => {
                assert_eq!(cited_sources, vec!["track_order".to_string()]);
            }
            other => panic!("expected final answer, got {other:?}"),
        }
    }
}
