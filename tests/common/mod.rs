//! Shared fixtures for integration tests

// Not every test binary uses every helper.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use taskora::config::Config;
use taskora::directory::{StaticDirectory, UserDirectory};
use taskora::providers::{
    ChatMessage, CompletionResponse, FunctionCall, Provider, ToolCall,
};
use taskora::storage::ConversationStore;
use taskora::tasks::{InMemoryTaskStore, TaskStore};
use taskora::Orchestrator;

/// Provider that replays a scripted sequence of responses
///
/// Once the script runs out it answers with a plain "Done" so a test can
/// never hang on an empty script.
pub struct ScriptedProvider {
    responses: Mutex<Vec<ChatMessage>>,
    pub calls: Mutex<usize>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ChatMessage>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn complete(
        &self,
        _messages: &[ChatMessage],
        _tools: &[serde_json::Value],
    ) -> taskora::Result<CompletionResponse> {
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

/// Assistant message requesting a single tool call
pub fn tool_call_message(name: &str, arguments: serde_json::Value) -> ChatMessage {
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

/// Everything an orchestrator test needs, sharing one conversation DB
pub struct Fixture {
    pub orchestrator: Orchestrator,
    pub conversations: Arc<ConversationStore>,
    pub tasks: Arc<InMemoryTaskStore>,
    pub directory: Arc<StaticDirectory>,
    pub config: Config,
    /// Holds the on-disk databases; must stay alive as long as the stores
    pub dir: tempfile::TempDir,
}

/// Config with test-friendly backoff
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.agent.retry_backoff_ms = 1;
    config
}

/// Build a fixture around a provider and config
pub fn fixture_with_config(provider: Arc<dyn Provider>, config: Config) -> Fixture {
    let dir = tempfile::tempdir().expect("failed to create tempdir");
    let conversations = Arc::new(
        ConversationStore::new_with_path(dir.path().join("conversations.db"))
            .expect("failed to create conversation store"),
    );
    let tasks = Arc::new(InMemoryTaskStore::new());

    let mut tokens = HashMap::new();
    tokens.insert("token-alpha".to_string(), "user-1".to_string());
    tokens.insert("token-beta".to_string(), "user-2".to_string());
    let directory = Arc::new(StaticDirectory::with_tokens(tokens, "en-US"));

    let orchestrator = Orchestrator::new(
        provider,
        conversations.clone(),
        tasks.clone() as Arc<dyn TaskStore>,
        directory.clone() as Arc<dyn UserDirectory>,
        config.clone(),
    )
    .expect("failed to build orchestrator");

    Fixture {
        orchestrator,
        conversations,
        tasks,
        directory,
        config,
        dir,
    }
}

/// Build a fixture with the default test config
pub fn fixture(provider: Arc<dyn Provider>) -> Fixture {
    fixture_with_config(provider, test_config())
}
