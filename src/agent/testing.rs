//! Test doubles for the model backend.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::types::{
    ChatMessage, ModelClient, ModelResponse, TokenUsage, ToolDefinition, ToolInvocation,
};

/// What a `MockModel` observed for one `complete` call.
pub struct RecordedCall {
    pub system_prompt: String,
    pub tool_names: Vec<String>,
    pub message_count: usize,
}

enum Scripted {
    Response(ModelResponse),
    Error(String),
}

/// Scripted `ModelClient`: plays back queued responses in order, then
/// the fallback (if set) forever. Records every call it sees.
#[derive(Default)]
pub struct MockModel {
    script: Mutex<VecDeque<Scripted>>,
    fallback: Option<ModelResponse>,
    pub calls: Mutex<Vec<RecordedCall>>,
}

impl MockModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_final(self, text: &str) -> Self {
        self.push_response(text, Vec::new())
    }

    pub fn push_tool_calls(self, tool_calls: Vec<ToolInvocation>) -> Self {
        self.push_response("", tool_calls)
    }

    pub fn push_response(self, text: &str, tool_calls: Vec<ToolInvocation>) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Response(response(text, tool_calls)));
        self
    }

    pub fn push_error(self, message: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Error(message.to_string()));
        self
    }

    /// Once the script is exhausted, answer every further call with
    /// this response. Used to model an agent that never stops
    /// requesting tools.
    pub fn with_fallback(mut self, text: &str, tool_calls: Vec<ToolInvocation>) -> Self {
        self.fallback = Some(response(text, tool_calls));
        self
    }
}

fn response(text: &str, tool_calls: Vec<ToolInvocation>) -> ModelResponse {
    let finish_reason = if tool_calls.is_empty() {
        "stop"
    } else {
        "tool_calls"
    };
    ModelResponse {
        text: text.to_string(),
        tool_calls,
        usage: TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        },
        finish_reason: finish_reason.to_string(),
    }
}

/// `ModelClient` whose calls never resolve, for cancellation tests.
pub struct BlockingModel;

#[async_trait]
impl ModelClient for BlockingModel {
    async fn complete(
        &self,
        _system_prompt: &str,
        _tools: &[ToolDefinition],
        _history: &[ChatMessage],
    ) -> anyhow::Result<ModelResponse> {
        std::future::pending::<()>().await;
        unreachable!()
    }
}

#[async_trait]
impl ModelClient for MockModel {
    async fn complete(
        &self,
        system_prompt: &str,
        tools: &[ToolDefinition],
        history: &[ChatMessage],
    ) -> anyhow::Result<ModelResponse> {
        self.calls.lock().unwrap().push(RecordedCall {
            system_prompt: system_prompt.to_string(),
            tool_names: tools.iter().map(|t| t.function.name.clone()).collect(),
            message_count: history.len(),
        });

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Response(resp)) => Ok(resp),
            Some(Scripted::Error(msg)) => Err(anyhow::anyhow!(msg)),
            None => match &self.fallback {
                Some(resp) => Ok(resp.clone()),
                None => Err(anyhow::anyhow!("mock model script exhausted")),
            },
        }
    }
}
