//! Storebot - Type Definitions
//!
//! Shared types for the role-aware storefront agent: roles, agents,
//! session messages, tool invocations, model wire types, and the
//! collaborator traits for the model backend and the commerce API.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{CommerceError, InvalidRoleError, ToolError};

// ─── Roles & Agents ──────────────────────────────────────────────

/// Authenticated role of the user driving a session.
/// Immutable for the lifetime of the session.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Admin,
}

impl FromStr for Role {
    type Err = InvalidRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "customer" => Ok(Role::Customer),
            "admin" => Ok(Role::Admin),
            other => Err(InvalidRoleError {
                role: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Customer => write!(f, "customer"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// Which agent owns a conversation thread. New agents are added as
/// variants with their own capability set, not by subclassing.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Customer,
    Admin,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Customer => "customer",
            AgentKind::Admin => "admin",
        }
    }
}

impl FromStr for AgentKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(AgentKind::Customer),
            "admin" => Ok(AgentKind::Admin),
            _ => Err(()),
        }
    }
}

// ─── Configuration ───────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorebotConfig {
    pub store_name: String,
    pub store_description: String,
    pub shopify_store_domain: String,
    pub shopify_api_version: String,
    pub shopify_access_token: String,
    pub model_api_url: String,
    pub model_api_key: String,
    pub model: String,
    pub max_tokens_per_turn: u32,
    pub db_path: String,
    pub log_level: LogLevel,
    /// Maximum AGENT_TURN ⇄ TOOL_EXEC cycles per user message.
    pub max_tool_cycles: u32,
    pub model_timeout_secs: u64,
    pub tool_timeout_secs: u64,
    /// How many recent messages of a thread are replayed to the model.
    pub context_window_messages: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Returns a default `StorebotConfig`. Fields with no sensible default
/// (store domain, credentials) are empty so callers can override them
/// from the config file or environment.
pub fn default_config() -> StorebotConfig {
    StorebotConfig {
        store_name: "Silk Skin".to_string(),
        store_description: "Silk Skin is a luxury leather goods brand offering premium wallets, \
                            handbags, card holders, bags, travel accessories, and gift sets."
            .to_string(),
        shopify_store_domain: String::new(),
        shopify_api_version: "2024-10".to_string(),
        shopify_access_token: String::new(),
        model_api_url: "https://api.openai.com".to_string(),
        model_api_key: String::new(),
        model: "gpt-4o".to_string(),
        max_tokens_per_turn: 4096,
        db_path: "~/.storebot/sessions.db".to_string(),
        log_level: LogLevel::Info,
        max_tool_cycles: 10,
        model_timeout_secs: 60,
        tool_timeout_secs: 15,
        context_window_messages: 40,
    }
}

// ─── Session Messages ────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    User,
    Assistant,
    ToolResult,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::User => "user",
            MessageKind::Assistant => "assistant",
            MessageKind::ToolResult => "tool_result",
        }
    }
}

impl FromStr for MessageKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(MessageKind::User),
            "assistant" => Ok(MessageKind::Assistant),
            "tool_result" => Ok(MessageKind::ToolResult),
            _ => Err(()),
        }
    }
}

/// One entry in a thread's append-only history. Insertion order is
/// conversational order and is preserved exactly by the store.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionMessage {
    pub id: String,
    pub kind: MessageKind,
    pub content: String,
    /// Pending tool-invocation requests, present only on assistant
    /// messages that requested tools.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolInvocation>,
    /// Correlation id of the request this message resolves, present
    /// only on tool-result messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    pub created_at: String,
}

impl SessionMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: MessageKind::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolInvocation>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: MessageKind::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn tool_result(correlation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: MessageKind::ToolResult,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(correlation_id.into()),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

// ─── Tool System ─────────────────────────────────────────────────

/// A structured request from an agent naming a tool and arguments.
/// Must be resolved exactly once before the agent is re-invoked.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    /// Correlation id assigned by the model backend; tool results are
    /// tagged with it so the agent can match results to requests.
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Outcome of executing one tool-invocation request.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
    pub result: String,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
}

impl ToolCallResult {
    /// Render this result as the content of an agent-visible
    /// tool-result message.
    pub fn as_message_content(&self) -> String {
        match &self.error {
            Some(err) => format!("Error: {}", err),
            None => self.result.clone(),
        }
    }
}

// ─── Agent Output ────────────────────────────────────────────────

/// What an agent produced for one invocation: either a final answer
/// or a batch of tool requests, never both. A model response carrying
/// both text and tool calls is treated as `ToolRequests`; the text is
/// non-final.
#[derive(Clone, Debug, PartialEq)]
pub enum AgentOutput {
    FinalAnswer {
        text: String,
        cited_sources: Vec<String>,
    },
    ToolRequests(Vec<ToolInvocation>),
}

/// Result of processing one user message through the orchestration
/// loop, returned to the entry surface.
#[derive(Clone, Debug)]
pub struct TurnOutcome {
    pub answer: String,
    /// True when the answer is a degraded fallback (loop cap hit or
    /// model failure) rather than a model-produced final answer.
    pub degraded: bool,
    /// Tools executed during the turn, in invocation order.
    pub provenance: Vec<ToolCallResult>,
    pub usage: TokenUsage,
}

// ─── Model Wire Types ────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolInvocation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn text(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

/// A tool schema entry as presented to the model backend. Only tools
/// in the invoking agent's capability set are ever rendered.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub def_type: String,
    pub function: ToolDefinitionFunction,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolDefinitionFunction {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn accumulate(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Raw completion from the model backend, before the agent wrapper
/// classifies it as a final answer or tool requests.
#[derive(Clone, Debug)]
pub struct ModelResponse {
    pub text: String,
    pub tool_calls: Vec<ToolInvocation>,
    pub usage: TokenUsage,
    pub finish_reason: String,
}

/// The contract storebot assumes of any language-model collaborator,
/// local or hosted.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        tools: &[ToolDefinition],
        history: &[ChatMessage],
    ) -> anyhow::Result<ModelResponse>;
}

// ─── Commerce Records ────────────────────────────────────────────
//
// Typed records returned by the storefront collaborator. Shopify
// serializes prices as strings; they stay strings here and are parsed
// where arithmetic is needed.

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Product {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub product_type: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub variants: Vec<Variant>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Variant {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub inventory_quantity: Option<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Order {
    pub id: u64,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub financial_status: String,
    #[serde(default)]
    pub fulfillment_status: Option<String>,
    #[serde(default)]
    pub total_price: String,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub fulfillments: Vec<Fulfillment>,
    #[serde(default)]
    pub refunds: Vec<Refund>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct LineItem {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub price: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Fulfillment {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub tracking_company: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub tracking_url: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Refund {
    #[serde(default)]
    pub transactions: Vec<RefundTransaction>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct RefundTransaction {
    #[serde(default)]
    pub amount: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Customer {
    pub id: u64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub orders_count: i64,
    #[serde(default)]
    pub total_spent: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct PriceRule {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub value_type: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub ends_at: Option<String>,
}

/// Read-only query surface of the storefront collaborator, invoked
/// only by the tool executor.
#[async_trait]
pub trait CommerceClient: Send + Sync {
    async fn search_products(&self, query: &str, limit: u32) -> Result<Vec<Product>, CommerceError>;
    async fn get_all_products(&self, limit: u32) -> Result<Vec<Product>, CommerceError>;
    async fn get_order(&self, order_id: u64) -> Result<Order, CommerceError>;
    async fn get_orders_in_range(
        &self,
        created_at_min: &str,
        created_at_max: &str,
    ) -> Result<Vec<Order>, CommerceError>;
    async fn get_unfulfilled_orders(&self) -> Result<Vec<Order>, CommerceError>;
    async fn get_customers(&self, limit: u32) -> Result<Vec<Customer>, CommerceError>;
    async fn get_price_rules(&self, limit: u32) -> Result<Vec<PriceRule>, CommerceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("customer".parse::<Role>().unwrap(), Role::Customer);
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn test_tool_result_message_content() {
        let ok = ToolCallResult {
            id: "call_1".to_string(),
            name: "track_order".to_string(),
            arguments: serde_json::json!({"order_id": 45821}),
            result: "Order #45821".to_string(),
            duration_ms: 12,
            error: None,
        };
        assert_eq!(ok.as_message_content(), "Order #45821");

        let failed = ToolCallResult {
            error: Some(ToolError::NotAuthorized {
                tool: "get_sales_report".to_string(),
                capability_set: "customer_support".to_string(),
            }),
            ..ok
        };
        assert!(failed.as_message_content().starts_with("Error: "));
    }
}
