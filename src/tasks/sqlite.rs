//! SQLite-backed Task Store
//!
//! Reference implementation of the [`TaskStore`] collaborator so the
//! server runs end-to-end without an external task service. Every query
//! filters on `user_id` in SQL; ownership is never checked after the fact.

use crate::error::{Result, TaskoraError};
use crate::tasks::{NewTask, StatusFilter, Task, TaskPatch, TaskPriority, TaskStatus, TaskStore};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use ulid::Ulid;

/// Task store backed by a SQLite database file
pub struct SqliteTaskStore {
    db_path: PathBuf,
}

impl SqliteTaskStore {
    /// Create a new task store in the platform data directory
    ///
    /// The `TASKORA_TASKS_DB` environment variable overrides the path,
    /// which keeps test databases out of the user's data directory.
    pub fn new() -> Result<Self> {
        if let Ok(override_path) = std::env::var("TASKORA_TASKS_DB") {
            return Self::new_with_path(override_path);
        }

        let proj_dirs = ProjectDirs::from("dev", "taskora", "taskora")
            .ok_or_else(|| TaskoraError::Storage("Could not determine data directory".into()))?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)
            .context("Failed to create data directory")
            .map_err(|e| TaskoraError::Storage(e.to_string()))?;

        Self::new_with_path(data_dir.join("tasks.db"))
    }

    /// Create a new task store at the given database path
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create parent directory for database")
                .map_err(|e| TaskoraError::Storage(e.to_string()))?;
        }

        let store = Self { db_path };
        store.init()?;
        Ok(store)
    }

    fn open(&self) -> Result<Connection> {
        Connection::open(&self.db_path)
            .context("Failed to open task database")
            .map_err(|e| TaskoraError::Storage(e.to_string()).into())
    }

    fn init(&self) -> Result<()> {
        let conn = self.open()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                priority TEXT NOT NULL,
                due_date TEXT,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create tasks table")
        .map_err(|e| TaskoraError::Storage(e.to_string()))?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks (user_id, status)",
            [],
        )
        .context("Failed to create task index")
        .map_err(|e| TaskoraError::Storage(e.to_string()))?;

        Ok(())
    }

    fn row_to_task(row: &Row<'_>) -> rusqlite::Result<Task> {
        let priority_str: String = row.get(4)?;
        let status_str: String = row.get(6)?;
        let due_date_str: Option<String> = row.get(5)?;
        let created_at_str: String = row.get(7)?;
        let updated_at_str: String = row.get(8)?;

        Ok(Task {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            priority: TaskPriority::parse(&priority_str).unwrap_or_default(),
            due_date: due_date_str.and_then(|s| parse_ts(&s)),
            status: TaskStatus::parse(&status_str).unwrap_or_default(),
            created_at: parse_ts(&created_at_str).unwrap_or_else(Utc::now),
            updated_at: parse_ts(&updated_at_str).unwrap_or_else(Utc::now),
        })
    }

    fn fetch(&self, conn: &Connection, user_id: &str, task_id: &str) -> Result<Option<Task>> {
        conn.query_row(
            "SELECT id, user_id, title, description, priority, due_date, status,
                    created_at, updated_at
             FROM tasks WHERE id = ? AND user_id = ?",
            params![task_id, user_id],
            Self::row_to_task,
        )
        .optional()
        .context("Failed to query task")
        .map_err(|e| TaskoraError::Storage(e.to_string()).into())
    }
}

fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn create(&self, user_id: &str, task: NewTask) -> Result<Task> {
        let conn = self.open()?;
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

        conn.execute(
            "INSERT INTO tasks (id, user_id, title, description, priority, due_date,
                                status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                record.id,
                record.user_id,
                record.title,
                record.description,
                record.priority.as_str(),
                record.due_date.map(|d| d.to_rfc3339()),
                record.status.as_str(),
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )
        .context("Failed to insert task")
        .map_err(|e| TaskoraError::Storage(e.to_string()))?;

        Ok(record)
    }

    async fn list(&self, user_id: &str, filter: StatusFilter) -> Result<Vec<Task>> {
        let conn = self.open()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, title, description, priority, due_date, status,
                        created_at, updated_at
                 FROM tasks WHERE user_id = ?
                 ORDER BY created_at DESC",
            )
            .context("Failed to prepare task listing")
            .map_err(|e| TaskoraError::Storage(e.to_string()))?;

        let rows = stmt
            .query_map(params![user_id], Self::row_to_task)
            .context("Failed to query tasks")
            .map_err(|e| TaskoraError::Storage(e.to_string()))?;

        let mut tasks = Vec::new();
        for task in rows.flatten() {
            if filter.matches(task.status) {
                tasks.push(task);
            }
        }
        Ok(tasks)
    }

    async fn get(&self, user_id: &str, task_id: &str) -> Result<Option<Task>> {
        let conn = self.open()?;
        self.fetch(&conn, user_id, task_id)
    }

    async fn update(
        &self,
        user_id: &str,
        task_id: &str,
        patch: TaskPatch,
    ) -> Result<Option<Task>> {
        let conn = self.open()?;
        let Some(mut task) = self.fetch(&conn, user_id, task_id)? else {
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

        conn.execute(
            "UPDATE tasks SET title = ?, description = ?, priority = ?, due_date = ?,
                              updated_at = ?
             WHERE id = ? AND user_id = ?",
            params![
                task.title,
                task.description,
                task.priority.as_str(),
                task.due_date.map(|d| d.to_rfc3339()),
                task.updated_at.to_rfc3339(),
                task_id,
                user_id,
            ],
        )
        .context("Failed to update task")
        .map_err(|e| TaskoraError::Storage(e.to_string()))?;

        Ok(Some(task))
    }

    async fn complete(&self, user_id: &str, task_id: &str) -> Result<Option<Task>> {
        let conn = self.open()?;
        let Some(mut task) = self.fetch(&conn, user_id, task_id)? else {
            return Ok(None);
        };

        task.status = TaskStatus::Completed;
        task.updated_at = Utc::now();

        conn.execute(
            "UPDATE tasks SET status = ?, updated_at = ? WHERE id = ? AND user_id = ?",
            params![
                task.status.as_str(),
                task.updated_at.to_rfc3339(),
                task_id,
                user_id,
            ],
        )
        .context("Failed to complete task")
        .map_err(|e| TaskoraError::Storage(e.to_string()))?;

        Ok(Some(task))
    }

    async fn delete(&self, user_id: &str, task_id: &str) -> Result<bool> {
        let conn = self.open()?;
        let affected = conn
            .execute(
                "DELETE FROM tasks WHERE id = ? AND user_id = ?",
                params![task_id, user_id],
            )
            .context("Failed to delete task")
            .map_err(|e| TaskoraError::Storage(e.to_string()))?;
        Ok(affected > 0)
    }
}
