//! Tools module for Taskora
//!
//! This module contains the tool abstraction, the tool registry, and the
//! five task-management tools the model may invoke. The registry is built
//! per request with the caller's user id pre-bound into every executor:
//! the model can never name a user id, which is the primary security
//! boundary of the tool layer.

pub mod complete_task;
pub mod create_task;
pub mod delete_task;
pub mod list_tasks;
pub mod update_task;

pub use complete_task::CompleteTaskTool;
pub use create_task::CreateTaskTool;
pub use delete_task::DeleteTaskTool;
pub use list_tasks::ListTasksTool;
pub use update_task::UpdateTaskTool;

use crate::error::Result;
use crate::tasks::TaskStore;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry name of the create_task tool
pub const TOOL_CREATE_TASK: &str = "create_task";
/// Registry name of the list_tasks tool
pub const TOOL_LIST_TASKS: &str = "list_tasks";
/// Registry name of the complete_task tool
pub const TOOL_COMPLETE_TASK: &str = "complete_task";
/// Registry name of the update_task tool
pub const TOOL_UPDATE_TASK: &str = "update_task";
/// Registry name of the delete_task tool
pub const TOOL_DELETE_TASK: &str = "delete_task";

/// Kind of client error a tool reports back to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// Arguments failed schema or field validation
    ValidationError,
    /// The referenced task does not exist for the calling user
    NotFound,
}

/// Structured error carried in a failed tool outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolError {
    /// Error classification the model can branch on
    pub kind: ToolErrorKind,
    /// Human-readable explanation
    pub message: String,
}

/// Terminal outcome of a tool execution
///
/// Client errors (validation, not-found) are outcomes, not `Err`s: they go
/// back to the model as structured results so it can self-correct within
/// the round budget. Only store outages travel as `Err` to the
/// orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    /// Whether the tool ran to a successful result
    pub success: bool,
    /// Success payload (empty object on failure)
    pub payload: serde_json::Value,
    /// Error details when `success` is false
    pub error: Option<ToolError>,
}

impl ToolOutcome {
    /// Create a successful outcome with a structured payload
    pub fn ok(payload: serde_json::Value) -> Self {
        Self {
            success: true,
            payload,
            error: None,
        }
    }

    /// Create a validation failure outcome
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: serde_json::Value::Null,
            error: Some(ToolError {
                kind: ToolErrorKind::ValidationError,
                message: message.into(),
            }),
        }
    }

    /// Create a not-found failure outcome
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: serde_json::Value::Null,
            error: Some(ToolError {
                kind: ToolErrorKind::NotFound,
                message: message.into(),
            }),
        }
    }

    /// The value recorded in the persisted tool-invocation record
    ///
    /// Success payload as-is, or an `{"error": ...}` object, so every
    /// persisted invocation carries a terminal outcome.
    pub fn record_value(&self) -> serde_json::Value {
        match &self.error {
            Some(error) => serde_json::json!({ "error": error }),
            None => self.payload.clone(),
        }
    }

    /// Render the outcome as the tool-result message shown to the model
    ///
    /// Output larger than `max_size` bytes is cut with a marker so a
    /// pathological listing cannot flood the context window.
    pub fn render(&self, max_size: usize) -> String {
        let mut rendered = self.record_value().to_string();
        if rendered.len() > max_size {
            rendered.truncate(max_size);
            rendered.push_str("\n... (truncated)");
        }
        rendered
    }
}

/// Tool executor trait implemented by each task tool
///
/// `definition` returns the JSON schema advertised to the provider;
/// `execute` runs against arguments the model supplied.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Returns the tool definition (name, description, parameter schema)
    fn definition(&self) -> serde_json::Value;

    /// Executes the tool with the given arguments
    ///
    /// # Errors
    ///
    /// Returns error only on store outages; client errors are encoded in
    /// the returned [`ToolOutcome`].
    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutcome>;
}

/// Tool registry scoped to a single request's user
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolExecutor>>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Build the full task-tool catalog bound to one user
    ///
    /// # Arguments
    ///
    /// * `user_id` - Caller identity baked into every executor
    /// * `store` - Task Store collaborator the tools wrap
    pub fn for_user(user_id: &str, store: Arc<dyn TaskStore>) -> Self {
        let mut registry = Self::new();
        registry.register(
            TOOL_CREATE_TASK,
            Arc::new(CreateTaskTool::new(user_id, store.clone())),
        );
        registry.register(
            TOOL_LIST_TASKS,
            Arc::new(ListTasksTool::new(user_id, store.clone())),
        );
        registry.register(
            TOOL_COMPLETE_TASK,
            Arc::new(CompleteTaskTool::new(user_id, store.clone())),
        );
        registry.register(
            TOOL_UPDATE_TASK,
            Arc::new(UpdateTaskTool::new(user_id, store.clone())),
        );
        registry.register(
            TOOL_DELETE_TASK,
            Arc::new(DeleteTaskTool::new(user_id, store)),
        );
        registry
    }

    /// Register a tool executor
    pub fn register(&mut self, name: impl Into<String>, executor: Arc<dyn ToolExecutor>) {
        self.tools.insert(name.into(), executor);
    }

    /// Get a tool executor by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolExecutor>> {
        self.tools.get(name).cloned()
    }

    /// Get all tool definitions as JSON values
    pub fn definitions(&self) -> Vec<serde_json::Value> {
        let mut definitions: Vec<serde_json::Value> = self
            .tools
            .values()
            .map(|executor| executor.definition())
            .collect();
        // Stable order keeps the provider-facing schema list deterministic.
        definitions.sort_by_key(|d| d["name"].as_str().unwrap_or_default().to_string());
        definitions
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// True when no tools are registered
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a due date supplied by the model
///
/// Accepts RFC-3339 timestamps or plain `YYYY-MM-DD` dates (interpreted as
/// midnight UTC). Anything else is a validation failure.
pub(crate) fn parse_due_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Validate a task title per the tool contract (1-500 characters)
pub(crate) fn validate_title(title: &str) -> std::result::Result<String, String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err("title must not be empty".to_string());
    }
    if trimmed.chars().count() > 500 {
        return Err("title must be at most 500 characters".to_string());
    }
    Ok(trimmed.to_string())
}
