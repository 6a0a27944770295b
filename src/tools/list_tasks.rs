//! List tasks tool implementation

use crate::error::Result;
use crate::tasks::{StatusFilter, TaskStore};
use crate::tools::{ToolExecutor, ToolOutcome, TOOL_LIST_TASKS};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

/// Lists the bound user's tasks, optionally filtered by status
pub struct ListTasksTool {
    user_id: String,
    store: Arc<dyn TaskStore>,
}

impl ListTasksTool {
    /// Creates a new list tasks tool bound to a user
    pub fn new(user_id: impl Into<String>, store: Arc<dyn TaskStore>) -> Self {
        Self {
            user_id: user_id.into(),
            store,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListTasksParams {
    #[serde(default)]
    status: Option<String>,
}

#[async_trait]
impl ToolExecutor for ListTasksTool {
    fn definition(&self) -> serde_json::Value {
        serde_json::json!({
            "name": TOOL_LIST_TASKS,
            "description": "Lists the user's tasks. Use to look up existing tasks before updating, completing, or deleting one.",
            "parameters": {
                "type": "object",
                "properties": {
                    "status": {
                        "type": "string",
                        "enum": ["all", "pending", "completed"],
                        "description": "Status filter, defaults to pending"
                    }
                }
            }
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutcome> {
        let params: ListTasksParams = match serde_json::from_value(args) {
            Ok(p) => p,
            Err(e) => return Ok(ToolOutcome::validation_error(format!("Invalid arguments: {}", e))),
        };

        let filter = match params.status.as_deref() {
            None => StatusFilter::Pending,
            Some("all") => StatusFilter::All,
            Some("pending") => StatusFilter::Pending,
            Some("completed") => StatusFilter::Completed,
            Some(other) => {
                return Ok(ToolOutcome::validation_error(format!(
                    "Unknown status filter '{}', expected all, pending, or completed",
                    other
                )))
            }
        };

        let tasks = self.store.list(&self.user_id, filter).await?;
        let entries: Vec<serde_json::Value> = tasks
            .iter()
            .map(|t| {
                serde_json::json!({
                    "task_id": t.id,
                    "title": t.title,
                    "priority": t.priority,
                    "due_date": t.due_date,
                    "status": t.status,
                })
            })
            .collect();

        Ok(ToolOutcome::ok(serde_json::json!({
            "count": entries.len(),
            "tasks": entries,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{InMemoryTaskStore, NewTask};

    async fn seeded_store() -> Arc<InMemoryTaskStore> {
        let store = Arc::new(InMemoryTaskStore::new());
        let open = store
            .create(
                "user-1",
                NewTask {
                    title: "open task".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let done = store
            .create(
                "user-1",
                NewTask {
                    title: "done task".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store.complete("user-1", &done.id).await.unwrap();
        let _ = open;
        store
    }

    #[tokio::test]
    async fn test_defaults_to_pending() {
        let store = seeded_store().await;
        let tool = ListTasksTool::new("user-1", store);

        let outcome = tool.execute(serde_json::json!({})).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.payload["count"], 1);
        assert_eq!(outcome.payload["tasks"][0]["title"], "open task");
    }

    #[tokio::test]
    async fn test_all_filter_returns_everything() {
        let store = seeded_store().await;
        let tool = ListTasksTool::new("user-1", store);

        let outcome = tool
            .execute(serde_json::json!({"status": "all"}))
            .await
            .unwrap();
        assert_eq!(outcome.payload["count"], 2);
    }

    #[tokio::test]
    async fn test_completed_filter() {
        let store = seeded_store().await;
        let tool = ListTasksTool::new("user-1", store);

        let outcome = tool
            .execute(serde_json::json!({"status": "completed"}))
            .await
            .unwrap();
        assert_eq!(outcome.payload["count"], 1);
        assert_eq!(outcome.payload["tasks"][0]["title"], "done task");
    }

    #[tokio::test]
    async fn test_unknown_filter_is_validation_error() {
        let store = seeded_store().await;
        let tool = ListTasksTool::new("user-1", store);

        let outcome = tool
            .execute(serde_json::json!({"status": "archived"}))
            .await
            .unwrap();
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn test_scoped_to_bound_user() {
        let store = seeded_store().await;
        let tool = ListTasksTool::new("user-2", store);

        let outcome = tool
            .execute(serde_json::json!({"status": "all"}))
            .await
            .unwrap();
        assert_eq!(outcome.payload["count"], 0);
    }
}
