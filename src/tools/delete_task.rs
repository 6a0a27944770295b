//! Delete task tool implementation

use crate::error::Result;
use crate::tasks::TaskStore;
use crate::tools::{ToolExecutor, ToolOutcome, TOOL_DELETE_TASK};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

/// Deletes a task owned by the bound user
pub struct DeleteTaskTool {
    user_id: String,
    store: Arc<dyn TaskStore>,
}

impl DeleteTaskTool {
    /// Creates a new delete task tool bound to a user
    pub fn new(user_id: impl Into<String>, store: Arc<dyn TaskStore>) -> Self {
        Self {
            user_id: user_id.into(),
            store,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeleteTaskParams {
    task_id: String,
}

#[async_trait]
impl ToolExecutor for DeleteTaskTool {
    fn definition(&self) -> serde_json::Value {
        serde_json::json!({
            "name": TOOL_DELETE_TASK,
            "description": "Permanently removes a task from the user's list. Use only when the user explicitly asks to delete or remove a task.",
            "parameters": {
                "type": "object",
                "properties": {
                    "task_id": {
                        "type": "string",
                        "description": "Id of the task to delete"
                    }
                },
                "required": ["task_id"]
            }
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutcome> {
        let params: DeleteTaskParams = match serde_json::from_value(args) {
            Ok(p) => p,
            Err(e) => return Ok(ToolOutcome::validation_error(format!("Invalid arguments: {}", e))),
        };

        if self.store.delete(&self.user_id, &params.task_id).await? {
            Ok(ToolOutcome::ok(serde_json::json!({
                "task_id": params.task_id,
                "deleted": true,
            })))
        } else {
            Ok(ToolOutcome::not_found(format!(
                "No task with id '{}'",
                params.task_id
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{InMemoryTaskStore, NewTask};

    #[tokio::test]
    async fn test_deletes_owned_task() {
        let store = Arc::new(InMemoryTaskStore::new());
        let task = store
            .create(
                "user-1",
                NewTask {
                    title: "obsolete".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let tool = DeleteTaskTool::new("user-1", store.clone());
        let outcome = tool
            .execute(serde_json::json!({"task_id": task.id}))
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.payload["deleted"], true);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_foreign_task_is_not_found() {
        let store = Arc::new(InMemoryTaskStore::new());
        let task = store
            .create(
                "user-1",
                NewTask {
                    title: "keep".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let tool = DeleteTaskTool::new("user-2", store.clone());
        let outcome = tool
            .execute(serde_json::json!({"task_id": task.id}))
            .await
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.record_value()["error"]["kind"], "not_found");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_arguments_are_validation_error() {
        let store = Arc::new(InMemoryTaskStore::new());
        let tool = DeleteTaskTool::new("user-1", store);

        let outcome = tool
            .execute(serde_json::json!({"id": "wrong-field"}))
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(
            outcome.record_value()["error"]["kind"],
            "validation_error"
        );
    }
}
