//! Error types for Taskora
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Taskora operations
///
/// This enum encompasses all possible errors that can occur during
/// turn handling, configuration loading, provider interactions,
/// tool execution, and conversation persistence.
///
/// The variants follow the failure taxonomy the HTTP layer maps onto
/// status codes: client errors (`Validation`, `ConversationNotFound`,
/// `Forbidden`), provider errors (`Provider`, `ProviderTimeout`), and
/// store errors (`Storage`).
#[derive(Error, Debug)]
pub enum TaskoraError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed input (empty message, bad tool arguments, invalid field values)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Conversation does not exist or is not owned by the requesting user
    ///
    /// Ownership failures are deliberately indistinguishable from missing
    /// records so a caller cannot probe for other users' conversation ids.
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    /// Task does not exist or is not owned by the requesting user
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Caller identity could not be resolved
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Provider-related errors (API calls, malformed responses, etc.)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider call exceeded its configured timeout
    #[error("Provider timed out after {seconds} seconds")]
    ProviderTimeout {
        /// The configured timeout that was exceeded
        seconds: u64,
    },

    /// Tool execution errors (store outages surfaced through a tool)
    #[error("Tool execution error: {0}")]
    Tool(String),

    /// Conversation or task store errors (database operations)
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Taskora operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
