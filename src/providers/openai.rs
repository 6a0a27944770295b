//! OpenAI-compatible chat-completions provider
//!
//! Speaks the widely-implemented `/chat/completions` wire format with
//! function calling, so any compatible gateway can be used by pointing
//! `api_base` at it. The API key is read from the environment variable
//! named in the configuration, never from the config file itself.

use crate::config::OpenAiConfig;
use crate::error::{Result, TaskoraError};
use crate::providers::base::{
    ChatMessage, CompletionResponse, FunctionCall, Provider, TokenUsage, ToolCall,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Provider backed by an OpenAI-compatible chat-completions endpoint
pub struct OpenAiProvider {
    client: reqwest::Client,
    config: OpenAiConfig,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<UsagePayload>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct UsagePayload {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

impl OpenAiProvider {
    /// Creates a new OpenAI-compatible provider
    ///
    /// # Arguments
    ///
    /// * `config` - Endpoint, model, and key-env settings
    /// * `request_timeout` - Timeout applied to every request
    ///
    /// # Errors
    ///
    /// Returns `TaskoraError::Config` when the key environment variable is
    /// unset while targeting the default public endpoint. Compatible local
    /// gateways (and tests) may run without a key.
    pub fn new(config: OpenAiConfig, request_timeout: Duration) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() && config.api_base == "https://api.openai.com/v1" {
            return Err(TaskoraError::Config(format!(
                "Environment variable {} is not set",
                config.api_key_env
            ))
            .into());
        }

        // Reject unparseable bases up front rather than on the first turn.
        url::Url::parse(&config.api_base)
            .map_err(|e| TaskoraError::Config(format!("Invalid api_base: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(TaskoraError::Http)?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'))
    }

    fn build_request_body(
        &self,
        messages: &[ChatMessage],
        tools: &[serde_json::Value],
    ) -> serde_json::Value {
        let wire_messages: Vec<serde_json::Value> = messages
            .iter()
            .map(|m| {
                let mut obj = serde_json::json!({ "role": m.role });
                // The wire format wants an explicit null content for pure
                // tool-call messages, not an absent field.
                obj["content"] = match &m.content {
                    Some(c) => serde_json::Value::String(c.clone()),
                    None => serde_json::Value::Null,
                };
                if let Some(calls) = &m.tool_calls {
                    obj["tool_calls"] = calls
                        .iter()
                        .map(|c| {
                            serde_json::json!({
                                "id": c.id,
                                "type": "function",
                                "function": {
                                    "name": c.function.name,
                                    "arguments": c.function.arguments,
                                }
                            })
                        })
                        .collect();
                }
                if let Some(id) = &m.tool_call_id {
                    obj["tool_call_id"] = serde_json::Value::String(id.clone());
                }
                obj
            })
            .collect();

        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": wire_messages,
        });

        if !tools.is_empty() {
            body["tools"] = tools
                .iter()
                .map(|schema| serde_json::json!({ "type": "function", "function": schema }))
                .collect();
            body["tool_choice"] = serde_json::Value::String("auto".to_string());
        }

        body
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[serde_json::Value],
    ) -> Result<CompletionResponse> {
        let body = self.build_request_body(messages, tools);
        debug!("Sending completion request to {}", self.endpoint());

        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(TaskoraError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(TaskoraError::Provider(format!(
                "Completion request failed with status {}: {}",
                status, detail
            ))
            .into());
        }

        let parsed: ChatCompletionsResponse =
            response.json().await.map_err(TaskoraError::Http)?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| TaskoraError::Provider("Response contained no choices".to_string()))?;

        let tool_calls = choice.message.tool_calls.map(|calls| {
            calls
                .into_iter()
                .map(|c| ToolCall {
                    id: c.id,
                    function: FunctionCall {
                        name: c.function.name,
                        arguments: c.function.arguments,
                    },
                })
                .collect::<Vec<_>>()
        });

        let message = ChatMessage {
            role: "assistant".to_string(),
            content: choice.message.content,
            tool_calls,
            tool_call_id: None,
        };

        let usage = parsed
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens));

        Ok(CompletionResponse { message, usage })
    }

    fn name(&self) -> &str {
        "openai"
    }
}
