//! Create task tool implementation

use crate::error::Result;
use crate::tasks::{NewTask, TaskPriority, TaskStore};
use crate::tools::{parse_due_date, validate_title, ToolExecutor, ToolOutcome, TOOL_CREATE_TASK};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

/// Creates a new task for the bound user
///
/// Title is required (1-500 characters after trimming); description,
/// priority, and due date are optional. The result echoes the created
/// task so the model can reference its id in later rounds.
pub struct CreateTaskTool {
    user_id: String,
    store: Arc<dyn TaskStore>,
}

impl CreateTaskTool {
    /// Creates a new create task tool bound to a user
    pub fn new(user_id: impl Into<String>, store: Arc<dyn TaskStore>) -> Self {
        Self {
            user_id: user_id.into(),
            store,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateTaskParams {
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    due_date: Option<String>,
}

#[async_trait]
impl ToolExecutor for CreateTaskTool {
    fn definition(&self) -> serde_json::Value {
        serde_json::json!({
            "name": TOOL_CREATE_TASK,
            "description": "Creates a new task on the user's to-do list. Use when the user asks to add, remember, or schedule something.",
            "parameters": {
                "type": "object",
                "properties": {
                    "title": {
                        "type": "string",
                        "description": "Short task title, 1-500 characters"
                    },
                    "description": {
                        "type": "string",
                        "description": "Optional longer description"
                    },
                    "priority": {
                        "type": "string",
                        "enum": ["low", "medium", "high"],
                        "description": "Task priority, defaults to medium"
                    },
                    "due_date": {
                        "type": "string",
                        "description": "Optional due date, RFC-3339 or YYYY-MM-DD"
                    }
                },
                "required": ["title"]
            }
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutcome> {
        let params: CreateTaskParams = match serde_json::from_value(args) {
            Ok(p) => p,
            Err(e) => return Ok(ToolOutcome::validation_error(format!("Invalid arguments: {}", e))),
        };

        let title = match validate_title(&params.title) {
            Ok(t) => t,
            Err(e) => return Ok(ToolOutcome::validation_error(e)),
        };

        let priority = match params.priority.as_deref() {
            None => TaskPriority::default(),
            Some(raw) => match TaskPriority::parse(raw) {
                Some(p) => p,
                None => {
                    return Ok(ToolOutcome::validation_error(format!(
                        "Unknown priority '{}', expected low, medium, or high",
                        raw
                    )))
                }
            },
        };

        let due_date = match params.due_date.as_deref() {
            None => None,
            Some(raw) => match parse_due_date(raw) {
                Some(d) => Some(d),
                None => {
                    return Ok(ToolOutcome::validation_error(format!(
                        "Could not parse due date '{}', expected RFC-3339 or YYYY-MM-DD",
                        raw
                    )))
                }
            },
        };

        let task = self
            .store
            .create(
                &self.user_id,
                NewTask {
                    title,
                    description: params.description,
                    priority,
                    due_date,
                },
            )
            .await?;

        Ok(ToolOutcome::ok(serde_json::json!({
            "task_id": task.id,
            "title": task.title,
            "description": task.description,
            "priority": task.priority,
            "due_date": task.due_date,
            "status": task.status,
        })))
    }
}
