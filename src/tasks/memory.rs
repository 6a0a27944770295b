//! In-memory Task Store
//!
//! Collaborator stand-in for tests and local experiments. Same contract
//! as the SQLite store, held in a mutex-guarded vector.

use crate::error::Result;
use crate::tasks::{NewTask, StatusFilter, Task, TaskPatch, TaskStatus, TaskStore};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex;
use ulid::Ulid;

/// Task store held entirely in process memory
#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: Mutex<Vec<Task>>,
}

impl InMemoryTaskStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks held, across all users
    pub fn len(&self) -> usize {
        self.tasks.lock().expect("task store lock poisoned").len()
    }

    /// True when no tasks are held
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(&self, user_id: &str, task: NewTask) -> Result<Task> {
        let now = Utc::now();
        let record = Task {
            id: Ulid::new().to_string(),
            user_id: user_id.to_string(),
            title: task.title,
            description: task.description,
            priority: task.priority,
            due_date: task.due_date,
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        let mut tasks = self.tasks.lock().expect("task store lock poisoned");
        tasks.push(record.clone());
        Ok(record)
    }

    async fn list(&self, user_id: &str, filter: StatusFilter) -> Result<Vec<Task>> {
        let tasks = self.tasks.lock().expect("task store lock poisoned");
        let mut matching: Vec<Task> = tasks
            .iter()
            .filter(|t| t.user_id == user_id && filter.matches(t.status))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(matching)
    }

    async fn get(&self, user_id: &str, task_id: &str) -> Result<Option<Task>> {
        let tasks = self.tasks.lock().expect("task store lock poisoned");
        Ok(tasks
            .iter()
            .find(|t| t.user_id == user_id && t.id == task_id)
            .cloned())
    }

    async fn update(
        &self,
        user_id: &str,
        task_id: &str,
        patch: TaskPatch,
    ) -> Result<Option<Task>> {
        let mut tasks = self.tasks.lock().expect("task store lock poisoned");
        let Some(task) = tasks
            .iter_mut()
            .find(|t| t.user_id == user_id && t.id == task_id)
        else {
            return Ok(None);
        };

        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = Some(description);
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = Some(due_date);
        }
        task.updated_at = Utc::now();

        Ok(Some(task.clone()))
    }

    async fn complete(&self, user_id: &str, task_id: &str) -> Result<Option<Task>> {
        let mut tasks = self.tasks.lock().expect("task store lock poisoned");
        let Some(task) = tasks
            .iter_mut()
            .find(|t| t.user_id == user_id && t.id == task_id)
        else {
            return Ok(None);
        };

        task.status = TaskStatus::Completed;
        task.updated_at = Utc::now();
        Ok(Some(task.clone()))
    }

    async fn delete(&self, user_id: &str, task_id: &str) -> Result<bool> {
        let mut tasks = self.tasks.lock().expect("task store lock poisoned");
        let before = tasks.len();
        tasks.retain(|t| !(t.user_id == user_id && t.id == task_id));
        Ok(tasks.len() < before)
    }
}
