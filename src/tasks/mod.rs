//! Task Store collaborator interface and task domain types
//!
//! The agent core never owns task state: all task reads and writes go
//! through the [`TaskStore`] trait, keyed by user id first so no call path
//! exists that is not tenant-scoped. Two implementations ship with the
//! crate: a SQLite-backed reference store and an in-memory store for tests.

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryTaskStore;
pub use sqlite::SqliteTaskStore;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Task priority levels, ordered so that `High` sorts above `Low`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    /// Can wait
    Low,
    /// Normal priority
    #[default]
    Medium,
    /// Needs attention soon
    High,
}

impl TaskPriority {
    /// Stable string form used in storage and tool payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Parse from the stable string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Open task
    #[default]
    Pending,
    /// Finished task
    Completed,
}

impl TaskStatus {
    /// Stable string form used in storage and tool payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }

    /// Parse from the stable string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Status filter for task listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    /// All tasks regardless of status
    All,
    /// Only open tasks
    #[default]
    Pending,
    /// Only finished tasks
    Completed,
}

impl StatusFilter {
    /// Whether a task with the given status passes this filter
    pub fn matches(&self, status: TaskStatus) -> bool {
        match self {
            Self::All => true,
            Self::Pending => status == TaskStatus::Pending,
            Self::Completed => status == TaskStatus::Completed,
        }
    }
}

/// A task record as returned by the Task Store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Opaque task identifier
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Short task title
    pub title: String,
    /// Optional longer description
    pub description: Option<String>,
    /// Priority level
    pub priority: TaskPriority,
    /// Optional due date
    pub due_date: Option<DateTime<Utc>>,
    /// Lifecycle status
    pub status: TaskStatus,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    /// Short task title (validated by the tool layer: 1-500 chars)
    pub title: String,
    /// Optional longer description
    pub description: Option<String>,
    /// Priority level
    pub priority: TaskPriority,
    /// Optional due date
    pub due_date: Option<DateTime<Utc>>,
}

/// Partial update to a task; `None` fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    /// New title
    pub title: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New priority
    pub priority: Option<TaskPriority>,
    /// New due date
    pub due_date: Option<DateTime<Utc>>,
}

impl TaskPatch {
    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
    }
}

/// External Task Store collaborator
///
/// Every operation takes the user id first; implementations must scope
/// all reads and writes to that user. `Ok(None)` / `Ok(false)` mean "no
/// such task for this user" (a client error upstream); `Err` is reserved
/// for store outages.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Create a task for the user
    async fn create(&self, user_id: &str, task: NewTask) -> Result<Task>;

    /// List the user's tasks matching the status filter
    async fn list(&self, user_id: &str, filter: StatusFilter) -> Result<Vec<Task>>;

    /// Fetch a single task owned by the user
    async fn get(&self, user_id: &str, task_id: &str) -> Result<Option<Task>>;

    /// Apply a partial update to a task owned by the user
    async fn update(&self, user_id: &str, task_id: &str, patch: TaskPatch)
        -> Result<Option<Task>>;

    /// Mark a task owned by the user as completed
    async fn complete(&self, user_id: &str, task_id: &str) -> Result<Option<Task>>;

    /// Delete a task owned by the user; returns false when absent
    async fn delete(&self, user_id: &str, task_id: &str) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(TaskPriority::High > TaskPriority::Medium);
        assert!(TaskPriority::Medium > TaskPriority::Low);
    }

    #[test]
    fn test_priority_string_roundtrip() {
        for p in [TaskPriority::Low, TaskPriority::Medium, TaskPriority::High] {
            assert_eq!(TaskPriority::parse(p.as_str()), Some(p));
        }
        assert_eq!(TaskPriority::parse("urgent"), None);
    }

    #[test]
    fn test_status_string_roundtrip() {
        for s in [TaskStatus::Pending, TaskStatus::Completed] {
            assert_eq!(TaskStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(TaskStatus::parse("done"), None);
    }

    #[test]
    fn test_status_filter_matches() {
        assert!(StatusFilter::All.matches(TaskStatus::Pending));
        assert!(StatusFilter::All.matches(TaskStatus::Completed));
        assert!(StatusFilter::Pending.matches(TaskStatus::Pending));
        assert!(!StatusFilter::Pending.matches(TaskStatus::Completed));
        assert!(StatusFilter::Completed.matches(TaskStatus::Completed));
        assert!(!StatusFilter::Completed.matches(TaskStatus::Pending));
    }

    #[test]
    fn test_priority_serde_lowercase() {
        let json = serde_json::to_string(&TaskPriority::High).unwrap();
        assert_eq!(json, "\"high\"");
        let back: TaskPriority = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(back, TaskPriority::Low);
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(TaskPatch::default().is_empty());
        let patch = TaskPatch {
            title: Some("new".to_string()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
