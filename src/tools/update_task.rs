//! Update task tool implementation

use crate::error::Result;
use crate::tasks::{TaskPatch, TaskPriority, TaskStore};
use crate::tools::{parse_due_date, validate_title, ToolExecutor, ToolOutcome, TOOL_UPDATE_TASK};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

/// Applies a partial update to a task owned by the bound user
///
/// Any subset of title, description, priority, and due date may be
/// supplied; at least one field is required.
pub struct UpdateTaskTool {
    user_id: String,
    store: Arc<dyn TaskStore>,
}

impl UpdateTaskTool {
    /// Creates a new update task tool bound to a user
    pub fn new(user_id: impl Into<String>, store: Arc<dyn TaskStore>) -> Self {
        Self {
            user_id: user_id.into(),
            store,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UpdateTaskParams {
    task_id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    due_date: Option<String>,
}

#[async_trait]
impl ToolExecutor for UpdateTaskTool {
    fn definition(&self) -> serde_json::Value {
        serde_json::json!({
            "name": TOOL_UPDATE_TASK,
            "description": "Updates fields of an existing task. Only the supplied fields change.",
            "parameters": {
                "type": "object",
                "properties": {
                    "task_id": {
                        "type": "string",
                        "description": "Id of the task to update"
                    },
                    "title": {
                        "type": "string",
                        "description": "New title, 1-500 characters"
                    },
                    "description": {
                        "type": "string",
                        "description": "New description"
                    },
                    "priority": {
                        "type": "string",
                        "enum": ["low", "medium", "high"],
                        "description": "New priority"
                    },
                    "due_date": {
                        "type": "string",
                        "description": "New due date, RFC-3339 or YYYY-MM-DD"
                    }
                },
                "required": ["task_id"]
            }
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutcome> {
        let params: UpdateTaskParams = match serde_json::from_value(args) {
            Ok(p) => p,
            Err(e) => return Ok(ToolOutcome::validation_error(format!("Invalid arguments: {}", e))),
        };

        let title = match params.title {
            None => None,
            Some(raw) => match validate_title(&raw) {
                Ok(t) => Some(t),
                Err(e) => return Ok(ToolOutcome::validation_error(e)),
            },
        };

        let priority = match params.priority.as_deref() {
            None => None,
            Some(raw) => match TaskPriority::parse(raw) {
                Some(p) => Some(p),
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

        let patch = TaskPatch {
            title,
            description: params.description,
            priority,
            due_date,
        };

        if patch.is_empty() {
            return Ok(ToolOutcome::validation_error(
                "At least one field to update must be supplied",
            ));
        }

        match self
            .store
            .update(&self.user_id, &params.task_id, patch)
            .await?
        {
            Some(task) => Ok(ToolOutcome::ok(serde_json::json!({
                "task_id": task.id,
                "title": task.title,
                "description": task.description,
                "priority": task.priority,
                "due_date": task.due_date,
                "status": task.status,
            }))),
            None => Ok(ToolOutcome::not_found(format!(
                "No task with id '{}'",
                params.task_id
            ))),
        }
    }
}
