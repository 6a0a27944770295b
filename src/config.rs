//! Configuration management for Taskora
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{Result, TaskoraError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Main configuration structure for Taskora
///
/// This structure holds all configuration needed for the agent core,
/// including provider settings, turn-handling limits, context assembly
/// budgets, storage paths, and the HTTP server address.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Provider configuration (OpenAI-compatible, Ollama, etc.)
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Turn-handling configuration (round limits, retry backoff)
    #[serde(default)]
    pub agent: AgentConfig,

    /// Context assembly configuration (budgets, windows)
    #[serde(default)]
    pub context: ContextConfig,

    /// Storage paths for the conversation and task databases
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// User directory configuration (token table, locale defaults)
    #[serde(default)]
    pub directory: DirectoryConfig,
}

/// Provider configuration
///
/// Specifies which language-model provider to use and its settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Type of provider to use ("openai" or "ollama")
    #[serde(rename = "type", default = "default_provider_type")]
    pub provider_type: String,

    /// OpenAI-compatible chat-completions configuration
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Ollama configuration
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// Timeout for a single provider request (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_provider_type() -> String {
    "openai".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: default_provider_type(),
            openai: OpenAiConfig::default(),
            ollama: OllamaConfig::default(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

/// OpenAI-compatible provider configuration
///
/// Works against any endpoint implementing the chat-completions wire
/// format with tool calling, which keeps the provider substitutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API base URL (useful for tests and compatible gateways)
    #[serde(default = "default_openai_api_base")]
    pub api_base: String,

    /// Model to request
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// Name of the environment variable holding the API key
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
}

fn default_openai_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_base: default_openai_api_base(),
            model: default_openai_model(),
            api_key_env: default_openai_key_env(),
        }
    }
}

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Ollama server host
    #[serde(default = "default_ollama_host")]
    pub host: String,

    /// Model to use for Ollama
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

fn default_ollama_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2:latest".to_string()
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            model: default_ollama_model(),
        }
    }
}

/// Turn-handling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum number of provider rounds within a single turn
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,

    /// Base backoff before the single provider retry (milliseconds)
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Maximum size of a tool result shown to the model (bytes)
    #[serde(default = "default_max_tool_output")]
    pub max_tool_output_size: usize,
}

fn default_max_rounds() -> usize {
    5
}

fn default_retry_backoff() -> u64 {
    500
}

fn default_max_tool_output() -> usize {
    16_384
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            retry_backoff_ms: default_retry_backoff(),
            max_tool_output_size: default_max_tool_output(),
        }
    }
}

/// Context assembly configuration
///
/// Controls how much history and task context is loaded per request and
/// the token budget the optimizer must fit it into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Token budget for the assembled context
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,

    /// Number of most recent messages loaded from the conversation store
    #[serde(default = "default_recent_messages")]
    pub recent_messages: usize,

    /// Number of most recent messages kept verbatim when collapsing history
    #[serde(default = "default_keep_recent")]
    pub keep_recent_messages: usize,

    /// Maximum number of tasks kept when the task list is capped
    #[serde(default = "default_max_tasks")]
    pub max_tasks: usize,
}

fn default_token_budget() -> usize {
    8_000
}

fn default_recent_messages() -> usize {
    40
}

fn default_keep_recent() -> usize {
    6
}

fn default_max_tasks() -> usize {
    10
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            token_budget: default_token_budget(),
            recent_messages: default_recent_messages(),
            keep_recent_messages: default_keep_recent(),
            max_tasks: default_max_tasks(),
        }
    }
}

/// Storage configuration
///
/// Paths are optional; when absent the stores fall back to the platform
/// data directory (or the `TASKORA_DB` / `TASKORA_TASKS_DB` environment
/// overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Path to the conversation database file
    #[serde(default)]
    pub conversations_db: Option<String>,

    /// Path to the task database file
    #[serde(default)]
    pub tasks_db: Option<String>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP listener
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// User directory configuration
///
/// The reference directory implementation resolves bearer tokens against
/// this static table. A production deployment substitutes its own
/// `UserDirectory` implementation behind the same trait.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Bearer token to user id mapping
    #[serde(default)]
    pub tokens: HashMap<String, String>,

    /// Locale used when a user has no stored preference
    #[serde(default = "default_locale")]
    pub default_locale: String,
}

fn default_locale() -> String {
    "en-US".to_string()
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            tokens: HashMap::new(),
            default_locale: default_locale(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// A missing file is not an error: defaults are used so the binary can
    /// start without a config file on disk.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the YAML configuration file
    ///
    /// # Errors
    ///
    /// Returns `TaskoraError::Yaml` if the file exists but cannot be parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(TaskoraError::Io)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(TaskoraError::Yaml)?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `TaskoraError::Config` if any setting is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.agent.max_rounds == 0 {
            return Err(
                TaskoraError::Config("agent.max_rounds must be greater than 0".to_string()).into(),
            );
        }
        if self.context.token_budget == 0 {
            return Err(TaskoraError::Config(
                "context.token_budget must be greater than 0".to_string(),
            )
            .into());
        }
        if self.context.recent_messages == 0 {
            return Err(TaskoraError::Config(
                "context.recent_messages must be greater than 0".to_string(),
            )
            .into());
        }
        if self.context.keep_recent_messages == 0 {
            return Err(TaskoraError::Config(
                "context.keep_recent_messages must be greater than 0".to_string(),
            )
            .into());
        }
        if self.provider.request_timeout_seconds == 0 {
            return Err(TaskoraError::Config(
                "provider.request_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }
        match self.provider.provider_type.as_str() {
            "openai" | "ollama" => {}
            other => {
                return Err(TaskoraError::Config(format!(
                    "Unknown provider type: {}",
                    other
                ))
                .into());
            }
        }
        Ok(())
    }
}
