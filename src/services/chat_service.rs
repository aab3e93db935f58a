//! Chat completion client for the LLM gateway.
//!
//! The gateway speaks the Ollama `/api/chat` dialect: a list of role-tagged
//! messages in, one `message.content` out. Streaming is never requested.

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};

use crate::models::conversation::ConversationTurn;

const CHAT_ENDPOINT: &str = "/api/chat";

/// Model and sampling parameters for one kind of call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationConfig {
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
}

impl GenerationConfig {
    /// Short, low-temperature call used to derive search keywords.
    pub fn keyword(model: &str) -> Self {
        Self {
            model: model.to_string(),
            temperature: 0.5,
            top_p: 0.9,
            max_tokens: 100,
            presence_penalty: 0.4,
            frequency_penalty: 0.7,
        }
    }

    /// The grounded recommendation call. Penalties keep five entries from
    /// collapsing into repeats.
    pub fn recommendation(model: &str, max_tokens: u32) -> Self {
        Self {
            model: model.to_string(),
            temperature: 0.6,
            top_p: 0.9,
            max_tokens,
            presence_penalty: 0.4,
            frequency_penalty: 0.8,
        }
    }
}

#[derive(Debug)]
pub enum ChatError {
    HttpError(reqwest::Error),
    /// The gateway answered with a non-success status.
    Status { code: u16, body: String },
    ResponseError(String),
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::HttpError(err) => write!(f, "HTTP error: {}", err),
            ChatError::Status { code, body } => write!(f, "LLM API failed ({}): {}", code, body),
            ChatError::ResponseError(msg) => write!(f, "Response error: {}", msg),
        }
    }
}

impl std::error::Error for ChatError {}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::HttpError(err)
    }
}

#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// One non-streaming completion. A successful call may return an empty string.
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ConversationTurn],
        user_prompt: &str,
        generation: &GenerationConfig,
    ) -> Result<String, ChatError>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    presence_penalty: f32,
    frequency_penalty: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatMessage>,
}

pub fn build_messages(
    system_prompt: &str,
    history: &[ConversationTurn],
    user_prompt: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage {
        role: "system".to_string(),
        content: system_prompt.to_string(),
    });
    messages.extend(history.iter().map(|turn| ChatMessage {
        role: turn.role.as_str().to_string(),
        content: turn.content.clone(),
    }));
    messages.push(ChatMessage {
        role: "user".to_string(),
        content: user_prompt.to_string(),
    });
    messages
}

#[derive(Clone)]
pub struct GatewayChatClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GatewayChatClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, ChatError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl ChatCompletion for GatewayChatClient {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ConversationTurn],
        user_prompt: &str,
        generation: &GenerationConfig,
    ) -> Result<String, ChatError> {
        let request = ChatRequest {
            model: &generation.model,
            messages: build_messages(system_prompt, history, user_prompt),
            stream: false,
            temperature: generation.temperature,
            top_p: generation.top_p,
            max_tokens: generation.max_tokens,
            presence_penalty: generation.presence_penalty,
            frequency_penalty: generation.frequency_penalty,
        };

        let url = format!("{}{}", self.base_url, CHAT_ENDPOINT);
        debug!(
            "Calling {} with model {} ({} messages)",
            url,
            generation.model,
            request.messages.len()
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ChatError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| ChatError::ResponseError(format!("Failed to parse response: {}", e)))?;

        chat_response
            .message
            .map(|m| m.content)
            .ok_or_else(|| ChatError::ResponseError("Response has no message".to_string()))
    }
}
