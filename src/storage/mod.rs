//! Conversation store backed by SQLite
//!
//! Durable record of conversations and their ordered messages. This is the
//! only cross-request state the core relies on: any worker can reconstruct
//! a conversation from here, which is what makes turn handling stateless.

use crate::error::{Result, TaskoraError};
use anyhow::Context;
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use ulid::Ulid;

pub mod types;
pub use types::{ConversationMeta, MessageRecord, Role, ToolInvocation};

/// Storage backend for conversations and messages
pub struct ConversationStore {
    db_path: PathBuf,
}

impl ConversationStore {
    /// Create a new store in the platform data directory
    ///
    /// The `TASKORA_DB` environment variable overrides the path, which
    /// makes it easy to point the binary at a test database without
    /// touching the user's application data dir.
    pub fn new() -> Result<Self> {
        if let Ok(override_path) = std::env::var("TASKORA_DB") {
            return Self::new_with_path(override_path);
        }

        let proj_dirs = ProjectDirs::from("dev", "taskora", "taskora")
            .ok_or_else(|| TaskoraError::Storage("Could not determine data directory".into()))?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)
            .context("Failed to create data directory")
            .map_err(|e| TaskoraError::Storage(e.to_string()))?;

        Self::new_with_path(data_dir.join("conversations.db"))
    }

    /// Create a new store that uses the specified database path
    ///
    /// # Examples
    ///
    /// ```
    /// use taskora::storage::ConversationStore;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let store = ConversationStore::new_with_path(dir.path().join("conv.db")).unwrap();
    /// ```
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
        let conn = Connection::open(&self.db_path)
            .context("Failed to open conversation database")
            .map_err(|e| TaskoraError::Storage(e.to_string()))?;
        // Cascade from conversations to messages requires this per connection.
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")
            .map_err(|e| TaskoraError::Storage(e.to_string()))?;
        Ok(conn)
    }

    /// Initialize the database schema
    fn init(&self) -> Result<()> {
        let conn = self.open()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL
                    REFERENCES conversations(id) ON DELETE CASCADE,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                tool_calls TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_conversation
                ON messages (conversation_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_conversations_user
                ON conversations (user_id, updated_at);",
        )
        .context("Failed to create tables")
        .map_err(|e| TaskoraError::Storage(e.to_string()))?;

        Ok(())
    }

    /// Create a new conversation owned by the user
    pub fn create_conversation(&self, user_id: &str) -> Result<ConversationMeta> {
        let conn = self.open()?;
        let now = Utc::now();
        let meta = ConversationMeta {
            id: Ulid::new().to_string(),
            user_id: user_id.to_string(),
            created_at: now,
            updated_at: now,
        };

        conn.execute(
            "INSERT INTO conversations (id, user_id, created_at, updated_at)
             VALUES (?, ?, ?, ?)",
            params![
                meta.id,
                meta.user_id,
                meta.created_at.to_rfc3339(),
                meta.updated_at.to_rfc3339(),
            ],
        )
        .context("Failed to insert conversation")
        .map_err(|e| TaskoraError::Storage(e.to_string()))?;

        Ok(meta)
    }

    /// Fetch a conversation owned by the user
    ///
    /// The ownership check happens inside the query: a conversation owned
    /// by someone else is indistinguishable from one that does not exist.
    pub fn get_conversation(&self, user_id: &str, id: &str) -> Result<Option<ConversationMeta>> {
        let conn = self.open()?;
        conn.query_row(
            "SELECT id, user_id, created_at, updated_at
             FROM conversations WHERE id = ? AND user_id = ?",
            params![id, user_id],
            Self::row_to_meta,
        )
        .optional()
        .context("Failed to query conversation")
        .map_err(|e| TaskoraError::Storage(e.to_string()).into())
    }

    /// List the user's conversations, most recently active first
    pub fn list_conversations(&self, user_id: &str) -> Result<Vec<ConversationMeta>> {
        let conn = self.open()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, created_at, updated_at
                 FROM conversations WHERE user_id = ?
                 ORDER BY updated_at DESC",
            )
            .context("Failed to prepare conversation listing")
            .map_err(|e| TaskoraError::Storage(e.to_string()))?;

        let rows = stmt
            .query_map(params![user_id], Self::row_to_meta)
            .context("Failed to query conversations")
            .map_err(|e| TaskoraError::Storage(e.to_string()))?;

        let mut conversations = Vec::new();
        for meta in rows.flatten() {
            conversations.push(meta);
        }
        Ok(conversations)
    }

    /// Load the most recent messages of a conversation in chronological order
    ///
    /// Selects newest-first to apply the limit, then reverses so callers
    /// always see creation order.
    pub fn recent_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<MessageRecord>> {
        let conn = self.open()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, role, content, tool_calls, created_at
                 FROM messages WHERE conversation_id = ?
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?",
            )
            .context("Failed to prepare message query")
            .map_err(|e| TaskoraError::Storage(e.to_string()))?;

        let rows = stmt
            .query_map(params![conversation_id, limit as i64], Self::row_to_message)
            .context("Failed to query messages")
            .map_err(|e| TaskoraError::Storage(e.to_string()))?;

        let mut messages = Vec::new();
        for message in rows {
            messages.push(
                message
                    .context("Failed to read message row")
                    .map_err(|e| TaskoraError::Storage(e.to_string()))?,
            );
        }
        messages.reverse();
        Ok(messages)
    }

    /// Append a turn's messages as a single logical operation
    ///
    /// All records land in one transaction together with the conversation's
    /// `updated_at` bump; a turn is either fully recorded or not at all.
    ///
    /// # Errors
    ///
    /// Returns `TaskoraError::Storage` when the conversation does not exist
    /// or the transaction fails.
    pub fn append_turn(&self, conversation_id: &str, records: &[MessageRecord]) -> Result<()> {
        let mut conn = self.open()?;
        let now = Utc::now().to_rfc3339();

        let tx = conn
            .transaction()
            .context("Failed to start transaction")
            .map_err(|e| TaskoraError::Storage(e.to_string()))?;

        for record in records {
            let tool_calls_json = if record.tool_calls.is_empty() {
                None
            } else {
                Some(
                    serde_json::to_string(&record.tool_calls)
                        .context("Failed to serialize tool calls")
                        .map_err(|e| TaskoraError::Storage(e.to_string()))?,
                )
            };

            tx.execute(
                "INSERT INTO messages (id, conversation_id, role, content, tool_calls, created_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    record.id,
                    conversation_id,
                    record.role.as_str(),
                    record.content,
                    tool_calls_json,
                    record.created_at.to_rfc3339(),
                ],
            )
            .context("Failed to insert message")
            .map_err(|e| TaskoraError::Storage(e.to_string()))?;
        }

        let updated = tx
            .execute(
                "UPDATE conversations SET updated_at = ? WHERE id = ?",
                params![now, conversation_id],
            )
            .context("Failed to touch conversation")
            .map_err(|e| TaskoraError::Storage(e.to_string()))?;

        if updated == 0 {
            return Err(TaskoraError::Storage(format!(
                "Conversation {} does not exist",
                conversation_id
            ))
            .into());
        }

        tx.commit()
            .context("Failed to commit transaction")
            .map_err(|e| TaskoraError::Storage(e.to_string()))?;

        Ok(())
    }

    /// Delete a conversation owned by the user, cascading to its messages
    ///
    /// Returns false when the conversation does not exist for this user.
    pub fn delete_conversation(&self, user_id: &str, id: &str) -> Result<bool> {
        let conn = self.open()?;
        let affected = conn
            .execute(
                "DELETE FROM conversations WHERE id = ? AND user_id = ?",
                params![id, user_id],
            )
            .context("Failed to delete conversation")
            .map_err(|e| TaskoraError::Storage(e.to_string()))?;
        Ok(affected > 0)
    }

    fn row_to_meta(row: &Row<'_>) -> rusqlite::Result<ConversationMeta> {
        let created_at_str: String = row.get(2)?;
        let updated_at_str: String = row.get(3)?;
        Ok(ConversationMeta {
            id: row.get(0)?,
            user_id: row.get(1)?,
            created_at: parse_ts(&created_at_str),
            updated_at: parse_ts(&updated_at_str),
        })
    }

    fn row_to_message(row: &Row<'_>) -> rusqlite::Result<MessageRecord> {
        let role_str: String = row.get(1)?;
        let tool_calls_json: Option<String> = row.get(3)?;
        let created_at_str: String = row.get(4)?;

        let tool_calls = tool_calls_json
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default();

        Ok(MessageRecord {
            id: row.get(0)?,
            role: Role::parse(&role_str).unwrap_or(Role::Assistant),
            content: row.get(2)?,
            tool_calls,
            created_at: parse_ts(&created_at_str),
        })
    }
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
