//! HTTP server wiring
//!
//! Builds the axum router over shared application state and runs the
//! listener. State is a bundle of `Arc`s; every request handler works
//! against the same stateless orchestrator.

pub mod chat;

pub use chat::{AuthUser, ChatRequest, ChatResponse, ErrorBody};

use crate::agent::Orchestrator;
use crate::config::Config;
use crate::directory::{StaticDirectory, UserDirectory};
use crate::error::Result;
use crate::providers::create_provider;
use crate::storage::ConversationStore;
use crate::tasks::{SqliteTaskStore, TaskStore};
use axum::{
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Shared application state behind every handler
pub struct AppContext {
    /// The stateless turn handler
    pub orchestrator: Orchestrator,
    /// Conversation store, used directly by the listing/deletion handlers
    pub conversations: Arc<ConversationStore>,
    /// User directory, used by the auth extractor
    pub directory: Arc<dyn UserDirectory>,
}

/// Handler state type: cheap to clone per request
pub type AppState = Arc<AppContext>;

#[derive(Serialize)]
struct Health {
    status: String,
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
    })
}

/// Build the router over the given state
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat::chat))
        .route("/conversations", get(chat::list_conversations))
        .route("/conversations/:id", delete(chat::delete_conversation))
        .with_state(state)
}

/// Assemble the application state from configuration
///
/// # Errors
///
/// Returns error if a store cannot be opened or the provider fails to
/// initialize.
pub fn build_state(config: &Config) -> Result<AppState> {
    let conversations = Arc::new(match &config.storage.conversations_db {
        Some(path) => ConversationStore::new_with_path(path)?,
        None => ConversationStore::new()?,
    });

    let tasks: Arc<dyn TaskStore> = Arc::new(match &config.storage.tasks_db {
        Some(path) => SqliteTaskStore::new_with_path(path)?,
        None => SqliteTaskStore::new()?,
    });

    let directory: Arc<dyn UserDirectory> =
        Arc::new(StaticDirectory::from_config(&config.directory));

    let provider = Arc::from(create_provider(&config.provider)?);

    let orchestrator = Orchestrator::new(
        provider,
        conversations.clone(),
        tasks,
        directory.clone(),
        config.clone(),
    )?;

    Ok(Arc::new(AppContext {
        orchestrator,
        conversations,
        directory,
    }))
}

/// Run the HTTP server until shutdown
///
/// # Errors
///
/// Returns error if the listener cannot bind or the server fails.
pub async fn run(config: Config) -> Result<()> {
    let state = build_state(&config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!("Listening on {}", config.server.bind);
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::StaticDirectory;
    use crate::providers::{ChatMessage, CompletionResponse, Provider};
    use crate::tasks::InMemoryTaskStore;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct EchoProvider;

    #[async_trait]
    impl Provider for EchoProvider {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _tools: &[serde_json::Value],
        ) -> Result<CompletionResponse> {
            Ok(CompletionResponse::new(ChatMessage::assistant("ok")))
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    #[test]
    fn test_build_router_with_fixture_state() {
        let dir = tempfile::tempdir().unwrap();
        let conversations =
            Arc::new(ConversationStore::new_with_path(dir.path().join("conv.db")).unwrap());
        let directory: Arc<dyn UserDirectory> =
            Arc::new(StaticDirectory::with_tokens(HashMap::new(), "en-US"));
        let orchestrator = Orchestrator::new(
            Arc::new(EchoProvider),
            conversations.clone(),
            Arc::new(InMemoryTaskStore::new()),
            directory.clone(),
            Config::default(),
        )
        .unwrap();

        let state = Arc::new(AppContext {
            orchestrator,
            conversations,
            directory,
        });
        let _router = build_router(state);
    }

    #[test]
    fn test_build_state_with_configured_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.conversations_db =
            Some(dir.path().join("conv.db").to_string_lossy().to_string());
        config.storage.tasks_db = Some(dir.path().join("tasks.db").to_string_lossy().to_string());
        config.provider.provider_type = "ollama".to_string();

        let state = build_state(&config).unwrap();
        assert!(state.conversations.list_conversations("nobody").unwrap().is_empty());
    }
}
