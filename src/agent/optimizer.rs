//! Context optimization under a token budget
//!
//! Reduces a loaded snapshot until it fits the configured budget while
//! keeping the most recent turns verbatim. Reduction runs in fixed order:
//! collapse old history into a synthetic summary, cap the task list, drop
//! preference flags. The most recent user message is never cut.

use crate::agent::context::{estimate_tokens, ContextSnapshot};
use crate::config::ContextConfig;
use crate::storage::MessageRecord;
use tracing::debug;

/// Fit a snapshot to the configured token budget
///
/// Returns the snapshot unchanged when it already fits. The summarization
/// strategy is count-and-excerpt truncation; swapping in a model-generated
/// summary would slot in at [`summarize`] without touching the stages.
pub fn optimize(mut snapshot: ContextSnapshot, config: &ContextConfig) -> ContextSnapshot {
    let budget = config.token_budget;
    if snapshot.estimated_tokens() <= budget {
        return snapshot;
    }

    // Stage 1: collapse everything but the most recent K messages into a
    // single synthetic summary entry. The cut point never moves past the
    // most recent user message.
    if snapshot.history.len() > config.keep_recent_messages {
        let mut cut = snapshot.history.len() - config.keep_recent_messages;
        if let Some(last_user) = snapshot.last_user_message_index() {
            cut = cut.min(last_user);
        }
        collapse_before(&mut snapshot, cut);
    }
    if snapshot.estimated_tokens() <= budget {
        debug!("Context fit after history collapse");
        return snapshot;
    }

    // Stage 2: cap the task list, leaving a count-only marker.
    if snapshot.tasks.len() > config.max_tasks {
        snapshot.tasks_omitted += snapshot.tasks.len() - config.max_tasks;
        snapshot.tasks.truncate(config.max_tasks);
    }
    if snapshot.estimated_tokens() <= budget {
        debug!("Context fit after task cap");
        return snapshot;
    }

    // Stage 3: preferences are the lowest-priority context.
    snapshot.preferences = None;
    if snapshot.estimated_tokens() <= budget {
        return snapshot;
    }

    // Last resort: shrink the verbatim tail down to the most recent user
    // message. That message itself is never dropped or edited.
    if let Some(last_user) = snapshot.last_user_message_index() {
        if last_user > 0 {
            collapse_before(&mut snapshot, last_user);
        }
    }
    if snapshot.estimated_tokens() > budget {
        // A single oversized user message can still blow the budget;
        // trim the summary instead of the message.
        if let Some(summary) = snapshot.summary.take() {
            let trimmed = truncate_string(&summary, 400);
            snapshot.summary = Some(trimmed);
        }
    }

    debug!(
        "Context reduced to ~{} tokens (budget {})",
        snapshot.estimated_tokens(),
        budget
    );
    snapshot
}

/// Collapse `history[..cut]` into the snapshot's summary entry
fn collapse_before(snapshot: &mut ContextSnapshot, cut: usize) {
    if cut == 0 || cut > snapshot.history.len() {
        return;
    }
    let tail = snapshot.history.split_off(cut);
    let head = std::mem::replace(&mut snapshot.history, tail);
    snapshot.summary = Some(summarize(&head, snapshot.summary.take()));
}

/// Build a synthetic summary of collapsed messages
///
/// Counts per role plus short excerpts of the first and last collapsed
/// messages, folded together with any previous summary.
fn summarize(messages: &[MessageRecord], previous: Option<String>) -> String {
    let mut summary = match previous {
        Some(prev) => format!("{}\n", prev),
        None => String::from("Summary of earlier conversation:\n"),
    };

    let mut user_messages = 0;
    let mut assistant_messages = 0;
    let mut tool_calls = 0;
    for message in messages {
        match message.role {
            crate::storage::Role::User => user_messages += 1,
            crate::storage::Role::Assistant => {
                assistant_messages += 1;
                tool_calls += message.tool_calls.len();
            }
            crate::storage::Role::Tool => {}
        }
    }

    summary.push_str(&format!(
        "- {} user messages, {} assistant replies",
        user_messages, assistant_messages
    ));
    if tool_calls > 0 {
        summary.push_str(&format!(", {} tool calls", tool_calls));
    }
    summary.push('\n');

    if let Some(first) = messages.iter().find(|m| !m.content.is_empty()) {
        summary.push_str(&format!(
            "First: {}\n",
            truncate_string(&first.content, 100)
        ));
    }
    if messages.len() > 1 {
        if let Some(last) = messages.iter().rev().find(|m| !m.content.is_empty()) {
            summary.push_str(&format!("Last: {}\n", truncate_string(&last.content, 100)));
        }
    }

    summary
}

/// Truncates a string to a maximum length, adding ellipsis if truncated
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let mut truncated = s.chars().take(max_len.saturating_sub(3)).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}
