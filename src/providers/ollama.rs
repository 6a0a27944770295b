//! Ollama provider implementation
//!
//! Talks to a local Ollama server via `/api/chat` with streaming disabled.
//! Ollama's tool calls carry structured argument objects and no call ids,
//! so arguments are re-serialized to strings and ids are synthesized to
//! match the provider-neutral [`ToolCall`] shape.

use crate::config::OllamaConfig;
use crate::error::{Result, TaskoraError};
use crate::providers::base::{
    ChatMessage, CompletionResponse, FunctionCall, Provider, TokenUsage, ToolCall,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Provider backed by a local Ollama server
pub struct OllamaProvider {
    client: reqwest::Client,
    config: OllamaConfig,
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OllamaToolCall>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaToolCall {
    function: OllamaFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaFunctionCall {
    name: String,
    arguments: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
    #[serde(default)]
    prompt_eval_count: Option<usize>,
    #[serde(default)]
    eval_count: Option<usize>,
}

impl OllamaProvider {
    /// Creates a new Ollama provider
    ///
    /// # Errors
    ///
    /// Returns `TaskoraError::Config` if the host URL cannot be parsed or
    /// the HTTP client fails to build.
    pub fn new(config: OllamaConfig, request_timeout: Duration) -> Result<Self> {
        url::Url::parse(&config.host)
            .map_err(|e| TaskoraError::Config(format!("Invalid Ollama host: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(TaskoraError::Http)?;

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.config.host.trim_end_matches('/'))
    }

    fn to_wire_messages(messages: &[ChatMessage]) -> Vec<OllamaMessage> {
        messages
            .iter()
            .map(|m| OllamaMessage {
                role: m.role.clone(),
                content: m.content.clone().unwrap_or_default(),
                tool_calls: m.tool_calls.as_ref().map(|calls| {
                    calls
                        .iter()
                        .map(|c| OllamaToolCall {
                            function: OllamaFunctionCall {
                                name: c.function.name.clone(),
                                arguments: serde_json::from_str(&c.function.arguments)
                                    .unwrap_or(serde_json::Value::Null),
                            },
                        })
                        .collect()
                }),
            })
            .collect()
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[serde_json::Value],
    ) -> Result<CompletionResponse> {
        let request = OllamaRequest {
            model: self.config.model.clone(),
            messages: Self::to_wire_messages(messages),
            stream: false,
            tools: tools
                .iter()
                .map(|schema| serde_json::json!({ "type": "function", "function": schema }))
                .collect(),
        };

        debug!("Sending completion request to {}", self.endpoint());

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(TaskoraError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(TaskoraError::Provider(format!(
                "Ollama request failed with status {}: {}",
                status, detail
            ))
            .into());
        }

        let parsed: OllamaResponse = response.json().await.map_err(TaskoraError::Http)?;

        let tool_calls = parsed.message.tool_calls.map(|calls| {
            calls
                .into_iter()
                .enumerate()
                .map(|(i, c)| ToolCall {
                    id: format!("call_{}", i),
                    function: FunctionCall {
                        name: c.function.name,
                        arguments: c.function.arguments.to_string(),
                    },
                })
                .collect::<Vec<_>>()
        });

        let content = if parsed.message.content.is_empty() {
            None
        } else {
            Some(parsed.message.content)
        };

        let message = ChatMessage {
            role: "assistant".to_string(),
            content,
            tool_calls,
            tool_call_id: None,
        };

        let usage = match (parsed.prompt_eval_count, parsed.eval_count) {
            (Some(p), Some(c)) => Some(TokenUsage::new(p, c)),
            _ => None,
        };

        Ok(CompletionResponse { message, usage })
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
