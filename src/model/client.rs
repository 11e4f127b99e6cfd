//! Model Backend Client
//!
//! Wraps an OpenAI-compatible /v1/chat/completions endpoint. This is
//! the production `ModelClient`; the orchestrator only ever sees the
//! trait.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::types::{
    ChatMessage, ModelClient, ModelResponse, ChatRole, TokenUsage, ToolDefinition, ToolInvocation,
};

pub struct ChatCompletionsClient {
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    timeout: Duration,
    http: Client,
}

impl ChatCompletionsClient {
    /// * `api_url` - Base URL of the completions API (e.g. `https://api.openai.com`).
    /// * `api_key` - Bearer token.
    /// * `model` - Model identifier (e.g. `gpt-4o`).
    /// * `max_tokens` - Max tokens per completion.
    /// * `timeout` - Per-call budget; a slow backend fails the call
    ///   rather than stalling the turn.
    pub fn new(
        api_url: String,
        api_key: String,
        model: String,
        max_tokens: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            api_url,
            api_key,
            model,
            max_tokens,
            timeout,
            http: Client::new(),
        }
    }
}

#[async_trait]
impl ModelClient for ChatCompletionsClient {
    async fn complete(
        &self,
        system_prompt: &str,
        tools: &[ToolDefinition],
        history: &[ChatMessage],
    ) -> Result<ModelResponse> {
        // Newer model families (o-series, gpt-5.x, gpt-4.1) use max_completion_tokens
        let uses_completion_tokens = regex::Regex::new(r"^(o[1-9]|gpt-5|gpt-4\.1)")
            .map(|re| re.is_match(&self.model))
            .unwrap_or(false);

        let mut formatted: Vec<Value> =
            vec![format_message(&ChatMessage::text(ChatRole::System, system_prompt))];
        formatted.extend(history.iter().map(format_message));

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": formatted,
            "stream": false,
        });

        if uses_completion_tokens {
            body["max_completion_tokens"] = serde_json::json!(self.max_tokens);
        } else {
            body["max_tokens"] = serde_json::json!(self.max_tokens);
        }

        if !tools.is_empty() {
            body["tools"] = serde_json::json!(tools);
            body["tool_choice"] = serde_json::json!("auto");
        }

        let url = format!("{}/v1/chat/completions", self.api_url);
        let request = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send();

        let resp = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| anyhow::anyhow!("model call timed out after {:?}", self.timeout))?
            .context("model request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("model backend error: {}: {}", status.as_u16(), text);
        }

        let data: Value = resp
            .json()
            .await
            .context("failed to parse model response")?;

        let choice = data["choices"]
            .get(0)
            .ok_or_else(|| anyhow::anyhow!("no completion choice returned"))?;
        let message = &choice["message"];

        let tool_calls: Vec<ToolInvocation> = message["tool_calls"]
            .as_array()
            .map(|tcs| {
                tcs.iter()
                    .map(|tc| ToolInvocation {
                        id: tc["id"].as_str().unwrap_or("").to_string(),
                        name: tc["function"]["name"].as_str().unwrap_or("").to_string(),
                        arguments: tc["function"]["arguments"]
                            .as_str()
                            .and_then(|s| serde_json::from_str(s).ok())
                            .unwrap_or_else(|| serde_json::json!({})),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(ModelResponse {
            text: message["content"].as_str().unwrap_or("").to_string(),
            tool_calls,
            usage: TokenUsage {
                prompt_tokens: data["usage"]["prompt_tokens"].as_u64().unwrap_or(0),
                completion_tokens: data["usage"]["completion_tokens"].as_u64().unwrap_or(0),
                total_tokens: data["usage"]["total_tokens"].as_u64().unwrap_or(0),
            },
            finish_reason: choice["finish_reason"].as_str().unwrap_or("stop").to_string(),
        })
    }
}

/// Format a ChatMessage into the JSON structure expected by the
/// OpenAI-compatible API. Tool-call arguments go back out as strings.
fn format_message(msg: &ChatMessage) -> Value {
    let role = match msg.role {
        ChatRole::System => "system",
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
        ChatRole::Tool => "tool",
    };

    let mut formatted = serde_json::json!({
        "role": role,
        "content": msg.content,
    });

    if let Some(ref tool_calls) = msg.tool_calls {
        let tc_json: Vec<Value> = tool_calls
            .iter()
            .map(|tc| {
                serde_json::json!({
                    "id": tc.id,
                    "type": "function",
                    "function": {
                        "name": tc.name,
                        "arguments": serde_json::to_string(&tc.arguments)
                            .unwrap_or_else(|_| "{}".to_string()),
                    }
                })
            })
            .collect();
        formatted["tool_calls"] = serde_json::json!(tc_json);
    }

    if let Some(ref tool_call_id) = msg.tool_call_id {
        formatted["tool_call_id"] = serde_json::json!(tool_call_id);
    }

    formatted
}
