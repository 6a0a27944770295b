//! Turn orchestration
//!
//! The per-request control loop: load context, fit it to the token
//! budget, converse with the provider executing any requested tools, then
//! persist the turn. The orchestrator holds only shared handles to the
//! stores and provider; no conversational state survives a call, so any
//! number of instances across any number of workers behave identically.

use crate::agent::context::{ContextLoader, ContextSnapshot};
use crate::agent::metrics::{self, TurnMetrics};
use crate::agent::optimizer::optimize;
use crate::config::Config;
use crate::directory::UserDirectory;
use crate::error::{Result, TaskoraError};
use crate::providers::{ChatMessage, CompletionResponse, Provider, ToolCall};
use crate::storage::{ConversationStore, MessageRecord, Role, ToolInvocation};
use crate::tasks::TaskStore;
use crate::tools::{ToolOutcome, ToolRegistry};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Reply shown when the provider stays unreachable after the retry
const PROVIDER_FAILURE_REPLY: &str =
    "Sorry, I ran into a problem reaching the language model. Your request was not completed; please try again in a moment.";

/// Reply shown when the round limit is hit without a final answer
const ROUNDS_EXHAUSTED_REPLY: &str =
    "Sorry, I couldn't complete that request within the allowed number of steps. Please try rephrasing it or splitting it up.";

/// Result of one handled turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Conversation the turn was appended to (created when none was supplied)
    pub conversation_id: String,
    /// Final reply text shown to the user
    pub reply: String,
    /// Tool invocations made during the turn, in execution order
    pub tool_calls: Vec<ToolInvocation>,
    /// False when the turn ended in a recoverable failure
    /// (provider unreachable or round limit reached)
    pub completed: bool,
}

/// How the converse loop ended
enum LoopEnd {
    /// Model produced a final answer
    Answered(String),
    /// Provider stayed unreachable after the retry
    ProviderFailed,
    /// Round limit reached while the model kept requesting tools
    RoundsExhausted,
}

/// The per-request turn handler
pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    conversations: Arc<ConversationStore>,
    tasks: Arc<dyn TaskStore>,
    loader: ContextLoader,
    config: Config,
}

impl Orchestrator {
    /// Creates a new orchestrator over the given collaborators
    ///
    /// # Errors
    ///
    /// Returns `TaskoraError::Config` if the configuration fails validation.
    pub fn new(
        provider: Arc<dyn Provider>,
        conversations: Arc<ConversationStore>,
        tasks: Arc<dyn TaskStore>,
        directory: Arc<dyn UserDirectory>,
        config: Config,
    ) -> Result<Self> {
        config.validate()?;

        let loader = ContextLoader::new(
            conversations.clone(),
            tasks.clone(),
            directory,
            config.context.clone(),
        );

        Ok(Self {
            provider,
            conversations,
            tasks,
            loader,
            config,
        })
    }

    /// Handle one user turn
    ///
    /// Load, optimize, converse (bounded rounds), persist, return. The
    /// only durable side effects are the task mutations the invoked tools
    /// performed and the persisted message history.
    ///
    /// # Errors
    ///
    /// - `TaskoraError::Validation` when the message is empty
    /// - `TaskoraError::ConversationNotFound` on a missing or foreign
    ///   conversation id (checked before any model call)
    /// - `TaskoraError::Storage` when a store is unavailable
    ///
    /// Provider failures and round exhaustion are not errors: the turn
    /// resolves to an apologetic reply with `completed` set to false.
    pub async fn handle_turn(
        &self,
        user_id: &str,
        conversation_id: Option<&str>,
        message: &str,
    ) -> Result<TurnOutcome> {
        let message = message.trim();
        if message.is_empty() {
            return Err(TaskoraError::Validation("message must not be empty".to_string()).into());
        }

        let turn_metrics = TurnMetrics::new();
        info!("Handling turn for user {}", user_id);

        // Load fails fast on ownership problems, before any model call.
        let snapshot = self.loader.load(user_id, conversation_id).await?;
        let snapshot = optimize(snapshot, &self.config.context);

        let registry = ToolRegistry::for_user(user_id, self.tasks.clone());
        let definitions = registry.definitions();
        let mut composed = self.compose(&snapshot, user_id, message);

        let mut invocations: Vec<ToolInvocation> = Vec::new();
        let mut rounds = 0;
        let mut end = LoopEnd::RoundsExhausted;

        while rounds < self.config.agent.max_rounds {
            rounds += 1;
            debug!("Round {}/{}", rounds, self.config.agent.max_rounds);

            let completion = match self.complete_with_retry(&composed, &definitions).await {
                Ok(response) => response,
                Err(e) => {
                    warn!("Provider unavailable after retry: {}", e);
                    end = LoopEnd::ProviderFailed;
                    break;
                }
            };

            let reply = completion.message.content.clone();
            match completion.message.tool_calls.clone() {
                Some(calls) if !calls.is_empty() => {
                    composed.push(ChatMessage::assistant_with_tools(reply, calls.clone()));
                    for call in &calls {
                        let (invocation, rendered) =
                            self.execute_tool_call(&registry, call).await?;
                        composed.push(ChatMessage::tool_result(&call.id, rendered));
                        invocations.push(invocation);
                    }
                }
                _ => match reply {
                    Some(text) => {
                        end = LoopEnd::Answered(text);
                        break;
                    }
                    None => {
                        warn!("Provider returned neither content nor tool calls");
                        end = LoopEnd::ProviderFailed;
                        break;
                    }
                },
            }
        }

        let (reply, completed, status) = match end {
            LoopEnd::Answered(text) => (text, true, "completed"),
            LoopEnd::ProviderFailed => (PROVIDER_FAILURE_REPLY.to_string(), false, "provider_failed"),
            LoopEnd::RoundsExhausted => {
                warn!(
                    "Round limit of {} reached without a final answer",
                    self.config.agent.max_rounds
                );
                (ROUNDS_EXHAUSTED_REPLY.to_string(), false, "rounds_exhausted")
            }
        };

        // Persist the turn as one logical append: the user message plus a
        // single assistant message carrying the reply and every tool
        // invocation record made along the way.
        let conversation_id = match &snapshot.conversation {
            Some(meta) => meta.id.clone(),
            None => self.conversations.create_conversation(user_id)?.id,
        };

        let records = vec![
            MessageRecord::user(message),
            MessageRecord::assistant_with_calls(reply.clone(), invocations.clone()),
        ];
        if let Err(e) = self.conversations.append_turn(&conversation_id, &records) {
            // Task mutations made by the tools above are not rolled back;
            // log which ones happened so the inconsistency is observable.
            let tool_names: Vec<&str> = invocations.iter().map(|i| i.name.as_str()).collect();
            warn!(
                "Turn persistence failed after tool calls {:?}: {}",
                tool_names, e
            );
            turn_metrics.record_completion(rounds, "failed");
            return Err(e);
        }

        turn_metrics.record_completion(rounds, status);
        info!(
            "Turn finished in {} rounds with {} tool calls ({})",
            rounds,
            invocations.len(),
            status
        );

        Ok(TurnOutcome {
            conversation_id,
            reply,
            tool_calls: invocations,
            completed,
        })
    }

    /// Build the model-facing message sequence
    ///
    /// Fixed system instruction, optional history summary, replayed
    /// history, then the new user message. Replayed turns contribute only
    /// their user and assistant text; embedded tool records stay in
    /// storage, where the audit trail lives.
    fn compose(
        &self,
        snapshot: &ContextSnapshot,
        user_id: &str,
        message: &str,
    ) -> Vec<ChatMessage> {
        let mut composed = vec![ChatMessage::system(self.system_prompt(snapshot, user_id))];

        if let Some(summary) = &snapshot.summary {
            composed.push(ChatMessage::system(summary.clone()));
        }

        for record in &snapshot.history {
            match record.role {
                Role::User => composed.push(ChatMessage::user(record.content.clone())),
                Role::Assistant => {
                    if !record.content.is_empty() {
                        composed.push(ChatMessage::assistant(record.content.clone()));
                    }
                }
                Role::Tool => {}
            }
        }

        composed.push(ChatMessage::user(message.to_string()));
        composed
    }

    fn system_prompt(&self, snapshot: &ContextSnapshot, user_id: &str) -> String {
        let mut prompt = String::from(
            "You are a personal task-management assistant. Help the user manage \
             their to-do list through conversation, using the provided tools for \
             every task change. Never invent task ids: take them from the task \
             context below or look them up with list_tasks. When the user says \
             \"it\" or \"that task\", prefer the first matching open task in the \
             context.",
        );

        prompt.push_str(&format!(
            "\nYou are serving user {}. Tool calls are already scoped to this \
             user on the server side; the id is stated for phrasing only.",
            user_id
        ));

        if let Some(prefs) = &snapshot.preferences {
            prompt.push_str(&format!("\nReply in the {} locale.", prefs.locale));
            if let Some(tz) = &prefs.time_zone {
                prompt.push_str(&format!(" Render dates in the {} time zone.", tz));
            }
        }

        if let Some(block) = snapshot.task_context_block() {
            prompt.push('\n');
            prompt.push_str(&block);
        }

        prompt
    }

    /// Call the provider once, retrying a single time with jittered backoff
    async fn complete_with_retry(
        &self,
        messages: &[ChatMessage],
        tools: &[serde_json::Value],
    ) -> Result<CompletionResponse> {
        match self.complete_once(messages, tools).await {
            Ok(response) => Ok(response),
            Err(first) => {
                metrics::record_provider_retry();
                let base = self.config.agent.retry_backoff_ms;
                let jitter = rand::rng().random_range(0..=base.max(1) / 2);
                let backoff = Duration::from_millis(base + jitter);
                warn!(
                    "Provider call failed ({}), retrying once after {:?}",
                    first, backoff
                );
                tokio::time::sleep(backoff).await;
                self.complete_once(messages, tools).await
            }
        }
    }

    async fn complete_once(
        &self,
        messages: &[ChatMessage],
        tools: &[serde_json::Value],
    ) -> Result<CompletionResponse> {
        let seconds = self.config.provider.request_timeout_seconds;
        match tokio::time::timeout(
            Duration::from_secs(seconds),
            self.provider.complete(messages, tools),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(TaskoraError::ProviderTimeout { seconds }.into()),
        }
    }

    /// Execute one requested tool call
    ///
    /// Unknown tools and malformed argument payloads become structured
    /// validation errors returned to the model; only store outages
    /// propagate as `Err` and fail the turn.
    async fn execute_tool_call(
        &self,
        registry: &ToolRegistry,
        call: &ToolCall,
    ) -> Result<(ToolInvocation, String)> {
        let name = &call.function.name;
        debug!("Executing tool: {}", name);

        let parsed_args: std::result::Result<serde_json::Value, _> =
            serde_json::from_str(&call.function.arguments);

        let (arguments, outcome) = match (registry.get(name), parsed_args) {
            (None, parsed) => {
                let arguments =
                    parsed.unwrap_or(serde_json::Value::String(call.function.arguments.clone()));
                (
                    arguments,
                    ToolOutcome::validation_error(format!("Unknown tool '{}'", name)),
                )
            }
            (Some(_), Err(e)) => (
                serde_json::Value::String(call.function.arguments.clone()),
                ToolOutcome::validation_error(format!("Arguments were not valid JSON: {}", e)),
            ),
            (Some(executor), Ok(arguments)) => {
                let outcome = executor.execute(arguments.clone()).await?;
                (arguments, outcome)
            }
        };

        metrics::record_tool_execution(name, outcome.success);

        let rendered = outcome.render(self.config.agent.max_tool_output_size);
        let invocation = ToolInvocation {
            name: name.clone(),
            arguments,
            result: outcome.record_value(),
        };
        Ok((invocation, rendered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::StaticDirectory;
    use crate::providers::FunctionCall;
    use crate::tasks::InMemoryTaskStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Provider returning a scripted sequence of responses
    struct ScriptedProvider {
        responses: Mutex<Vec<ChatMessage>>,
        calls: Mutex<usize>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<ChatMessage>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(0),
            }
        }

        fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _tools: &[serde_json::Value],
        ) -> Result<CompletionResponse> {
            *self.calls.lock().unwrap() += 1;
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(CompletionResponse::new(ChatMessage::assistant("Done")))
            } else {
                Ok(CompletionResponse::new(responses.remove(0)))
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    /// Provider that always fails
    struct FailingProvider;

    #[async_trait]
    impl Provider for FailingProvider {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _tools: &[serde_json::Value],
        ) -> Result<CompletionResponse> {
            Err(TaskoraError::Provider("always down".to_string()).into())
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn tool_call(name: &str, arguments: &str) -> ChatMessage {
        ChatMessage::assistant_with_tools(
            None,
            vec![ToolCall {
                id: "call_1".to_string(),
                function: FunctionCall {
                    name: name.to_string(),
                    arguments: arguments.to_string(),
                },
            }],
        )
    }

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.agent.retry_backoff_ms = 1;
        config
    }

    struct Fixture {
        orchestrator: Orchestrator,
        tasks: Arc<InMemoryTaskStore>,
        _dir: tempfile::TempDir,
    }

    fn fixture(provider: Arc<dyn Provider>, config: Config) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let conversations =
            Arc::new(ConversationStore::new_with_path(dir.path().join("conv.db")).unwrap());
        let tasks = Arc::new(InMemoryTaskStore::new());
        let directory = Arc::new(StaticDirectory::with_tokens(HashMap::new(), "en-US"));
        let orchestrator = Orchestrator::new(
            provider,
            conversations,
            tasks.clone(),
            directory,
            config,
        )
        .unwrap();
        Fixture {
            orchestrator,
            tasks,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_simple_answer_turn() {
        let provider = Arc::new(ScriptedProvider::new(vec![ChatMessage::assistant(
            "Hello! What should I add?",
        )]));
        let f = fixture(provider, fast_config());

        let outcome = f
            .orchestrator
            .handle_turn("user-1", None, "hi there")
            .await
            .unwrap();

        assert!(outcome.completed);
        assert_eq!(outcome.reply, "Hello! What should I add?");
        assert!(outcome.tool_calls.is_empty());
        assert!(!outcome.conversation_id.is_empty());
    }

    #[tokio::test]
    async fn test_empty_message_is_validation_error() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let f = fixture(provider.clone(), fast_config());

        let result = f.orchestrator.handle_turn("user-1", None, "   ").await;
        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TaskoraError>(),
            Some(TaskoraError::Validation(_))
        ));
        // Failed before any model call
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_foreign_conversation_fails_before_model_call() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let f = fixture(provider.clone(), fast_config());

        let result = f
            .orchestrator
            .handle_turn("user-1", Some("not-a-conversation"), "hello")
            .await;
        assert!(result.is_err());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_tool_call_round_then_answer() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call("create_task", r#"{"title":"buy milk"}"#),
            ChatMessage::assistant("Added \"buy milk\" to your list."),
        ]));
        let f = fixture(provider.clone(), fast_config());

        let outcome = f
            .orchestrator
            .handle_turn("user-1", None, "Add buy milk to my list")
            .await
            .unwrap();

        assert!(outcome.completed);
        assert_eq!(outcome.tool_calls.len(), 1);
        assert_eq!(outcome.tool_calls[0].name, "create_task");
        assert_eq!(outcome.tool_calls[0].result["title"], "buy milk");
        assert_eq!(provider.call_count(), 2);
        assert_eq!(f.tasks.len(), 1);
    }

    #[tokio::test]
    async fn test_round_limit_terminates_with_reply() {
        // A model that never stops asking for tools
        let responses: Vec<ChatMessage> = (0..20)
            .map(|_| tool_call("list_tasks", "{}"))
            .collect();
        let provider = Arc::new(ScriptedProvider::new(responses));
        let mut config = fast_config();
        config.agent.max_rounds = 3;
        let f = fixture(provider.clone(), config);

        let outcome = f
            .orchestrator
            .handle_turn("user-1", None, "loop please")
            .await
            .unwrap();

        assert!(!outcome.completed);
        assert_eq!(provider.call_count(), 3);
        assert!(outcome.reply.contains("couldn't complete"));
        // One list_tasks execution per round
        assert_eq!(outcome.tool_calls.len(), 3);
    }

    #[tokio::test]
    async fn test_provider_failure_yields_apologetic_reply() {
        let f = fixture(Arc::new(FailingProvider), fast_config());

        let outcome = f
            .orchestrator
            .handle_turn("user-1", None, "hello")
            .await
            .unwrap();

        assert!(!outcome.completed);
        assert!(outcome.reply.contains("try again"));
        assert!(outcome.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_validation_result_not_crash() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call("launch_rocket", "{}"),
            ChatMessage::assistant("I can't do that."),
        ]));
        let f = fixture(provider, fast_config());

        let outcome = f
            .orchestrator
            .handle_turn("user-1", None, "launch the rocket")
            .await
            .unwrap();

        assert!(outcome.completed);
        assert_eq!(outcome.tool_calls.len(), 1);
        assert_eq!(
            outcome.tool_calls[0].result["error"]["kind"],
            "validation_error"
        );
    }

    #[tokio::test]
    async fn test_malformed_tool_arguments_become_validation_result() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call("create_task", "{not json"),
            ChatMessage::assistant("Let me try again."),
        ]));
        let f = fixture(provider, fast_config());

        let outcome = f
            .orchestrator
            .handle_turn("user-1", None, "add something")
            .await
            .unwrap();

        assert_eq!(
            outcome.tool_calls[0].result["error"]["kind"],
            "validation_error"
        );
        assert!(f.tasks.is_empty());
    }

    #[tokio::test]
    async fn test_second_turn_sees_first_turn_history() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            ChatMessage::assistant("First reply"),
            ChatMessage::assistant("Second reply"),
        ]));
        let f = fixture(provider, fast_config());

        let first = f
            .orchestrator
            .handle_turn("user-1", None, "first message")
            .await
            .unwrap();

        let second = f
            .orchestrator
            .handle_turn("user-1", Some(&first.conversation_id), "second message")
            .await
            .unwrap();

        assert_eq!(second.conversation_id, first.conversation_id);

        let messages = f
            .orchestrator
            .conversations
            .recent_messages(&first.conversation_id, 10)
            .unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].content, "first message");
        assert_eq!(messages[1].content, "First reply");
        assert_eq!(messages[2].content, "second message");
        assert_eq!(messages[3].content, "Second reply");
    }

    #[tokio::test]
    async fn test_persists_exactly_two_messages_with_embedded_tool_record() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call("create_task", r#"{"title":"buy milk"}"#),
            ChatMessage::assistant("Added \"buy milk\" to your list."),
        ]));
        let f = fixture(provider, fast_config());

        let outcome = f
            .orchestrator
            .handle_turn("user-1", None, "Add buy milk to my list")
            .await
            .unwrap();

        let messages = f
            .orchestrator
            .conversations
            .recent_messages(&outcome.conversation_id, 10)
            .unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].tool_calls.len(), 1);
        assert_eq!(messages[1].tool_calls[0].name, "create_task");
        assert!(messages[1].tool_calls[0].result["task_id"].is_string());
    }

    #[test]
    fn test_compose_order() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let f = fixture(provider, fast_config());

        let snapshot = ContextSnapshot {
            conversation: None,
            summary: Some("Summary of earlier conversation:".to_string()),
            history: vec![
                MessageRecord::user("old question"),
                MessageRecord::assistant("old answer"),
            ],
            tasks: Vec::new(),
            tasks_omitted: 0,
            preferences: None,
        };

        let composed = f.orchestrator.compose(&snapshot, "user-1", "new question");
        assert_eq!(composed.len(), 5);
        assert_eq!(composed[0].role, "system");
        assert_eq!(composed[1].role, "system");
        assert_eq!(composed[2].content.as_deref(), Some("old question"));
        assert_eq!(composed[3].content.as_deref(), Some("old answer"));
        assert_eq!(composed[4].content.as_deref(), Some("new question"));
    }

    #[test]
    fn test_system_prompt_mentions_user_locale_and_tasks() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let f = fixture(provider, fast_config());

        let snapshot = ContextSnapshot {
            conversation: None,
            summary: None,
            history: Vec::new(),
            tasks: vec![crate::tasks::Task {
                id: "t1".to_string(),
                user_id: "user-1".to_string(),
                title: "water the plants".to_string(),
                description: None,
                priority: Default::default(),
                due_date: None,
                status: Default::default(),
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
            }],
            tasks_omitted: 0,
            preferences: Some(crate::directory::UserPreferences::with_locale("fr-FR")),
        };

        let prompt = f.orchestrator.system_prompt(&snapshot, "user-1");
        assert!(prompt.contains("user-1"));
        assert!(prompt.contains("fr-FR"));
        assert!(prompt.contains("water the plants"));
    }

    #[tokio::test]
    async fn test_zero_max_rounds_rejected_at_construction() {
        let dir = tempfile::tempdir().unwrap();
        let conversations =
            Arc::new(ConversationStore::new_with_path(dir.path().join("conv.db")).unwrap());
        let mut config = Config::default();
        config.agent.max_rounds = 0;

        let result = Orchestrator::new(
            Arc::new(FailingProvider),
            conversations,
            Arc::new(InMemoryTaskStore::new()),
            Arc::new(StaticDirectory::with_tokens(HashMap::new(), "en-US")),
            config,
        );
        assert!(result.is_err());
    }
}
