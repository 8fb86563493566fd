// IDE Agent Gateway - Model Client
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Anthropic Messages API client with tool use.
// Conversation types are the wire types: text, tool_use and tool_result blocks.

use crate::config::ModelConfig;
use crate::error::UpstreamError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: vec![ContentBlock::Text { text: text.into() }] }
    }
}

/// A tool call proposed by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub input: Value,
}

/// One model turn: concatenated text plus any proposed tool calls
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub text: String,
    pub tool_calls: Vec<ToolInvocation>,
    pub stop_reason: Option<String>,
}

impl ModelReply {
    /// Assistant message echoing this turn back into the conversation
    pub fn to_message(&self) -> Message {
        let mut content = Vec::new();
        if !self.text.trim().is_empty() {
            content.push(ContentBlock::Text { text: self.text.clone() });
        }
        for call in &self.tool_calls {
            content.push(ContentBlock::ToolUse {
                id: call.id.clone(),
                name: call.name.clone(),
                input: call.input.clone(),
            });
        }
        Message { role: Role::Assistant, content }
    }
}

/// Generative model collaborator. `tools` empty means no tool use allowed.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, system: &str, messages: &[Message], tools: &[Value]) -> Result<ModelReply, UpstreamError>;
}

// ============================================================================
// ANTHROPIC
// ============================================================================

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "<[Value]>::is_empty")]
    tools: &'a [Value],
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
    stop_reason: Option<String>,
}

fn parse_reply(body: &str) -> Result<ModelReply, UpstreamError> {
    let parsed: MessagesResponse =
        serde_json::from_str(body).map_err(|e| UpstreamError::Decode(e.to_string()))?;
    let mut reply = ModelReply { stop_reason: parsed.stop_reason, ..Default::default() };
    for block in parsed.content {
        match block {
            ResponseBlock::Text { text } => reply.text.push_str(&text),
            ResponseBlock::ToolUse { id, name, input } => reply.tool_calls.push(ToolInvocation { id, name, input }),
            ResponseBlock::Other => {}
        }
    }
    Ok(reply)
}

pub struct AnthropicClient {
    client: Client,
    config: ModelConfig,
}

impl AnthropicClient {
    pub fn new(config: &ModelConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .user_agent("IDE-Agent-Gate/1.0")
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| UpstreamError::Http(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config: config.clone() })
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    async fn complete(&self, system: &str, messages: &[Message], tools: &[Value]) -> Result<ModelReply, UpstreamError> {
        if self.config.api_key.is_empty() {
            return Err(UpstreamError::Http("ANTHROPIC_API_KEY is not configured".to_string()));
        }
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system,
            messages,
            tools,
        };
        log::debug!("Model request: {} messages, {} tools", messages.len(), tools.len());

        let timeout = self.config.request_timeout_secs;
        let on_err = |e: reqwest::Error| if e.is_timeout() { UpstreamError::Timeout(timeout) } else { e.into() };

        let response = self
            .client
            .post(&self.config.api_url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(on_err)?;

        let status = response.status();
        let body = response.text().await.map_err(on_err)?;
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let reply = parse_reply(&body)?;
        log::debug!(
            "Model reply: {} chars, {} tool calls, stop={:?}",
            reply.text.len(),
            reply.tool_calls.len(),
            reply.stop_reason
        );
        Ok(reply)
    }
}

// ============================================================================
// TESTS
// ============================================================================
