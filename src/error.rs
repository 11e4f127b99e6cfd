//! Error types for storebot
//!
//! The turn-level taxonomy: errors that reject a turn before it starts
//! (`TurnError`), and recoverable tool failures (`ToolError`) that are
//! absorbed by the orchestration loop and fed back to the agent as
//! tool-result messages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role string outside the defined set. Fatal to the turn, reported to
/// the caller, session untouched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid role '{role}': expected 'customer' or 'admin'")]
pub struct InvalidRoleError {
    pub role: String,
}

/// A turn is already in flight for the thread. Rejected before
/// entering ROUTING; the caller retries.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("session busy: a turn is already in flight for thread '{thread_id}'")]
pub struct SessionBusyError {
    pub thread_id: String,
}

/// The agent kept requesting tools without producing a final answer.
/// Turn-fatal; surfaced as a degraded final answer with the turn's
/// history committed up to that point.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("tool loop exceeded: {max_cycles} agent/tool cycles without a final answer")]
pub struct ToolLoopExceededError {
    pub max_cycles: u32,
}

/// Errors that escape the orchestration loop boundary. Everything else
/// is absorbed into agent-visible history.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    InvalidRole(#[from] InvalidRoleError),

    #[error(transparent)]
    SessionBusy(#[from] SessionBusyError),

    /// Session store I/O failure (cannot be healed conversationally).
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Failure class of a collaborator-backed tool execution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolExecutionKind {
    Timeout,
    NotFound,
    RateLimited,
    Unknown,
}

impl ToolExecutionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolExecutionKind::Timeout => "timeout",
            ToolExecutionKind::NotFound => "not_found",
            ToolExecutionKind::RateLimited => "rate_limited",
            ToolExecutionKind::Unknown => "unknown",
        }
    }
}

/// Typed failure of one tool-invocation request. Never raised past the
/// loop: each variant becomes a tool-result message so the agent can
/// retry, rephrase, or apologize.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ToolError {
    /// The tool exists in the registry but not in the bound capability
    /// set. Independent of router and schema filtering.
    #[error("tool '{tool}' is not authorized for capability set '{capability_set}'")]
    NotAuthorized { tool: String, capability_set: String },

    /// The tool name resolves to nothing in the registry at all.
    #[error("unknown tool '{tool}'")]
    UnknownTool { tool: String },

    /// Arguments failed schema validation; no partial execution.
    #[error("invalid arguments: {}", .fields.join(", "))]
    InvalidArguments { fields: Vec<String> },

    /// The underlying commerce query failed.
    #[error("tool execution failed ({}): {message}", .kind.as_str())]
    Execution {
        kind: ToolExecutionKind,
        message: String,
    },
}

/// Failure returned by the storefront collaborator.
#[derive(Debug, Error)]
pub enum CommerceError {
    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited by the storefront API")]
    RateLimited,

    #[error("storefront API error [{status}]: {body}")]
    Http { status: u16, body: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed storefront response: {0}")]
    Decode(String),
}

impl CommerceError {
    /// Collapse a collaborator failure into the tool-level failure
    /// class fed back to the agent.
    pub fn execution_kind(&self) -> ToolExecutionKind {
        match self {
            CommerceError::Timeout(_) => ToolExecutionKind::Timeout,
            CommerceError::NotFound(_) => ToolExecutionKind::NotFound,
            CommerceError::RateLimited => ToolExecutionKind::RateLimited,
            CommerceError::Http { .. } | CommerceError::Network(_) | CommerceError::Decode(_) => {
                ToolExecutionKind::Unknown
            }
        }
    }
}

impl From<CommerceError> for ToolError {
    fn from(err: CommerceError) -> Self {
        ToolError::Execution {
            kind: err.execution_kind(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commerce_error_kind_mapping() {
        assert_eq!(
            CommerceError::Timeout(15).execution_kind(),
            ToolExecutionKind::Timeout
        );
        assert_eq!(
            CommerceError::NotFound("order 1".into()).execution_kind(),
            ToolExecutionKind::NotFound
        );
        assert_eq!(
            CommerceError::RateLimited.execution_kind(),
            ToolExecutionKind::RateLimited
        );
        assert_eq!(
            CommerceError::Network("dns".into()).execution_kind(),
            ToolExecutionKind::Unknown
        );
    }

    #[test]
    fn test_invalid_arguments_display_lists_fields() {
        let err = ToolError::InvalidArguments {
            fields: vec!["order_id: expected integer".into(), "missing 'topic'".into()],
        };
        let rendered = err.to_string();
        assert!(rendered.contains("order_id"));
        assert!(rendered.contains("topic"));
    }
}
