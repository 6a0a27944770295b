//! Record types for the conversation store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Role of a persisted message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message written by the user
    User,
    /// Message produced by the model
    Assistant,
    /// Tool execution result fed back to the model
    Tool,
}

impl Role {
    /// Stable string form used in storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }

    /// Parse from the stable string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "tool" => Some(Self::Tool),
            _ => None,
        }
    }
}

/// A completed tool invocation embedded in a message
///
/// Only terminal outcomes are ever constructed: `result` holds either the
/// tool's success payload or an `{"error": ...}` object. In-flight
/// invocations have no representation and therefore cannot be persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Registry name of the tool
    pub name: String,
    /// Argument payload the model supplied
    pub arguments: serde_json::Value,
    /// Terminal outcome: success payload or error object
    pub result: serde_json::Value,
}

/// A persisted conversation message
///
/// Message ids are ULIDs: lexicographic id order matches creation order,
/// which keeps retrieval stable even when two appends land on the same
/// timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Unique message identifier (ULID)
    pub id: String,
    /// Sender role
    pub role: Role,
    /// Text content (may be empty for pure tool-invocation steps)
    pub content: String,
    /// Tool invocations carried by this message, with terminal outcomes
    pub tool_calls: Vec<ToolInvocation>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl MessageRecord {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Ulid::new().to_string(),
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Creates a user message record
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates an assistant message record
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Creates an assistant message record carrying completed tool invocations
    pub fn assistant_with_calls(
        content: impl Into<String>,
        tool_calls: Vec<ToolInvocation>,
    ) -> Self {
        let mut record = Self::new(Role::Assistant, content);
        record.tool_calls = tool_calls;
        record
    }

    /// Creates a tool result message record
    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content)
    }
}

/// Conversation metadata as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMeta {
    /// Opaque conversation identifier (ULID)
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Timestamp of the most recent append
    pub updated_at: DateTime<Utc>,
}
