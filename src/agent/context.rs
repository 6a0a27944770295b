//! Per-request context assembly
//!
//! Every turn starts by reconstructing a [`ContextSnapshot`] from durable
//! storage: bounded recent history, the user's ranked open tasks, and
//! preference flags. Nothing here is cached across requests; the snapshot
//! is the only conversational memory the agent ever sees, which is what
//! lets any worker serve any turn.

use crate::config::ContextConfig;
use crate::directory::{UserDirectory, UserPreferences};
use crate::error::{Result, TaskoraError};
use crate::storage::{ConversationMeta, ConversationStore, MessageRecord, Role};
use crate::tasks::{StatusFilter, Task, TaskStore};
use std::sync::Arc;
use tracing::debug;

/// Read-only aggregate handed to the optimizer and then the orchestrator
///
/// Built fresh at the start of every request and discarded afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextSnapshot {
    /// Conversation metadata, absent for a fresh thread
    pub conversation: Option<ConversationMeta>,
    /// Synthetic summary of collapsed history, set by the optimizer
    pub summary: Option<String>,
    /// Recent messages in chronological order
    pub history: Vec<MessageRecord>,
    /// Ranked open tasks
    pub tasks: Vec<Task>,
    /// Count of tasks dropped by the optimizer's cap
    pub tasks_omitted: usize,
    /// User preference flags; dropped last under budget pressure
    pub preferences: Option<UserPreferences>,
}

impl ContextSnapshot {
    /// Render the task list as the context block shown to the model
    pub fn task_context_block(&self) -> Option<String> {
        if self.tasks.is_empty() && self.tasks_omitted == 0 {
            return None;
        }
        let mut block = String::from("Open tasks (most relevant first):\n");
        for task in &self.tasks {
            block.push_str(&format!(
                "- [{}] {} (priority: {}{})\n",
                task.id,
                task.title,
                task.priority.as_str(),
                task.due_date
                    .map(|d| format!(", due {}", d.format("%Y-%m-%d")))
                    .unwrap_or_default(),
            ));
        }
        if self.tasks_omitted > 0 {
            block.push_str(&format!("(and {} more not shown)\n", self.tasks_omitted));
        }
        Some(block)
    }

    /// Estimated token footprint of the snapshot
    ///
    /// Counts everything the orchestrator will put in front of the model:
    /// summary, history (including embedded tool-call JSON), task block,
    /// and preference flags.
    pub fn estimated_tokens(&self) -> usize {
        let mut total = 0;
        if let Some(summary) = &self.summary {
            total += estimate_tokens(summary);
        }
        for record in &self.history {
            total += estimate_tokens(&record.content);
            for call in &record.tool_calls {
                total += estimate_tokens(&call.name);
                total += estimate_tokens(&call.arguments.to_string());
                total += estimate_tokens(&call.result.to_string());
            }
        }
        if let Some(block) = self.task_context_block() {
            total += estimate_tokens(&block);
        }
        if let Some(prefs) = &self.preferences {
            total += estimate_tokens(&prefs.locale);
            if let Some(tz) = &prefs.time_zone {
                total += estimate_tokens(tz);
            }
        }
        total
    }

    /// Index of the most recent user message in the history, if any
    pub fn last_user_message_index(&self) -> Option<usize> {
        self.history.iter().rposition(|m| m.role == Role::User)
    }
}

/// Estimates token count for a string using a simple heuristic
///
/// Uses characters / 4, which approximates common tokenizers for English
/// text; the budget math only needs to be roughly right.
pub(crate) fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() + 3) / 4
}

/// Builds context snapshots from the stores
pub struct ContextLoader {
    conversations: Arc<ConversationStore>,
    tasks: Arc<dyn TaskStore>,
    directory: Arc<dyn UserDirectory>,
    config: ContextConfig,
}

impl ContextLoader {
    /// Creates a new loader over the given collaborators
    pub fn new(
        conversations: Arc<ConversationStore>,
        tasks: Arc<dyn TaskStore>,
        directory: Arc<dyn UserDirectory>,
        config: ContextConfig,
    ) -> Self {
        Self {
            conversations,
            tasks,
            directory,
            config,
        }
    }

    /// Produce a context snapshot for the user
    ///
    /// With no conversation id the history is empty and a fresh
    /// conversation is started at persistence time. With one, the
    /// ownership check runs before anything else is read.
    ///
    /// # Errors
    ///
    /// Returns `TaskoraError::ConversationNotFound` when the conversation
    /// does not exist or belongs to another user.
    pub async fn load(
        &self,
        user_id: &str,
        conversation_id: Option<&str>,
    ) -> Result<ContextSnapshot> {
        let (conversation, history) = match conversation_id {
            None => (None, Vec::new()),
            Some(id) => {
                let meta = self
                    .conversations
                    .get_conversation(user_id, id)?
                    .ok_or_else(|| TaskoraError::ConversationNotFound(id.to_string()))?;
                let history = self
                    .conversations
                    .recent_messages(id, self.config.recent_messages)?;
                (Some(meta), history)
            }
        };

        let mut tasks = self.tasks.list(user_id, StatusFilter::Pending).await?;
        rank_tasks(&mut tasks);

        let preferences = self.directory.preferences(user_id).await?;

        debug!(
            "Loaded context for {}: {} messages, {} open tasks",
            user_id,
            history.len(),
            tasks.len()
        );

        Ok(ContextSnapshot {
            conversation,
            summary: None,
            history,
            tasks,
            tasks_omitted: 0,
            preferences: Some(preferences),
        })
    }
}

/// Rank tasks so the most likely referent of "the task" comes first
///
/// Order: explicit priority, then soonest due date with undated tasks
/// last, then most recent creation.
pub fn rank_tasks(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| match (a.due_date, b.due_date) {
                (Some(a_due), Some(b_due)) => a_due.cmp(&b_due),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}
