//! Complete task tool implementation

use crate::error::Result;
use crate::tasks::TaskStore;
use crate::tools::{ToolExecutor, ToolOutcome, TOOL_COMPLETE_TASK};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

/// Marks a task owned by the bound user as completed
pub struct CompleteTaskTool {
    user_id: String,
    store: Arc<dyn TaskStore>,
}

impl CompleteTaskTool {
    /// Creates a new complete task tool bound to a user
    pub fn new(user_id: impl Into<String>, store: Arc<dyn TaskStore>) -> Self {
        Self {
            user_id: user_id.into(),
            store,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompleteTaskParams {
    task_id: String,
}

#[async_trait]
impl ToolExecutor for CompleteTaskTool {
    fn definition(&self) -> serde_json::Value {
        serde_json::json!({
            "name": TOOL_COMPLETE_TASK,
            "description": "Marks a task as done. Use when the user says a task is finished.",
            "parameters": {
                "type": "object",
                "properties": {
                    "task_id": {
                        "type": "string",
                        "description": "Id of the task to complete"
                    }
                },
                "required": ["task_id"]
            }
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutcome> {
        let params: CompleteTaskParams = match serde_json::from_value(args) {
            Ok(p) => p,
            Err(e) => return Ok(ToolOutcome::validation_error(format!("Invalid arguments: {}", e))),
        };

        match self.store.complete(&self.user_id, &params.task_id).await? {
            Some(task) => Ok(ToolOutcome::ok(serde_json::json!({
                "task_id": task.id,
                "title": task.title,
                "status": task.status,
            }))),
            None => Ok(ToolOutcome::not_found(format!(
                "No task with id '{}'",
                params.task_id
            ))),
        }
    }
}
