use async_openai::{
    config::{Config, OpenAIConfig},
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use chat_relay_shared::{ChatMessage, MessageRole};
use futures_util::Stream;
use reqwest::{header, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::pin::Pin;
use tracing::{debug, info};

use crate::config::{MODEL, TEMPERATURE};
use crate::credentials::ClientConfig;
use crate::error::RelayError;
use crate::event_stream;

/// Incremental completion output. `next()` yields a chunk, a fault, or
/// `None` once the provider is done.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChatChunk, RelayError>> + Send>>;

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            model: MODEL.to_string(),
            messages,
            temperature: TEMPERATURE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Completion {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompletionChoice {
    #[serde(default)]
    pub message: Option<CompletionMessage>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompletionMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// One streamed piece of a completion; `delta` is `None` for chunks that
/// carry no text (role announcements, finish markers).
#[derive(Debug, Clone, PartialEq)]
pub struct ChatChunk {
    pub delta: Option<String>,
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(
        &self,
        config: &ClientConfig,
        request: CompletionRequest,
    ) -> Result<Completion, RelayError>;

    async fn open_stream(
        &self,
        config: &ClientConfig,
        request: CompletionRequest,
    ) -> Result<ChunkStream, RelayError>;
}

/// Talks to any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiProvider {
    http: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new() -> Self {
        info!("Initializing OpenAI-compatible provider");
        Self {
            http: reqwest::Client::new(),
        }
    }

    fn post(
        &self,
        config: &ClientConfig,
        body: &CreateChatCompletionRequest,
    ) -> reqwest::RequestBuilder {
        let openai = openai_config(config);
        self.http
            .post(openai.url("/chat/completions"))
            .headers(openai.headers())
            .json(body)
    }
}

impl Default for OpenAiProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    async fn complete(
        &self,
        config: &ClientConfig,
        request: CompletionRequest,
    ) -> Result<Completion, RelayError> {
        let body = build_request(request, false)?;
        debug!(base_url = ?config.base_url, model = %body.model, "Requesting completion");

        let response = self.post(config, &body).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(failure_from_body(status, &bytes));
        }

        serde_json::from_slice(&bytes).map_err(|e| {
            RelayError::upstream(None, Some(format!("invalid completion payload: {e}")))
        })
    }

    async fn open_stream(
        &self,
        config: &ClientConfig,
        request: CompletionRequest,
    ) -> Result<ChunkStream, RelayError> {
        let body = build_request(request, true)?;
        debug!(base_url = ?config.base_url, model = %body.model, "Opening completion stream");

        let response = self
            .post(config, &body)
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let bytes = response.bytes().await.unwrap_or_default();
            return Err(failure_from_body(status, &bytes));
        }

        Ok(event_stream::chunks(response.bytes_stream()))
    }
}

fn openai_config(config: &ClientConfig) -> OpenAIConfig {
    let openai = OpenAIConfig::new().with_api_key(config.api_key.clone().unwrap_or_default());
    match &config.base_url {
        Some(base_url) => openai.with_api_base(base_url.trim_end_matches('/')),
        None => openai,
    }
}

fn build_request(
    request: CompletionRequest,
    stream: bool,
) -> Result<CreateChatCompletionRequest, RelayError> {
    let messages = request
        .messages
        .into_iter()
        .map(convert_to_openai_message)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CreateChatCompletionRequestArgs::default()
        .model(request.model)
        .messages(messages)
        .temperature(request.temperature)
        .stream(stream)
        .build()?)
}

fn convert_to_openai_message(msg: ChatMessage) -> Result<ChatCompletionRequestMessage, RelayError> {
    let message = match msg.role {
        MessageRole::System => ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(msg.content)
                .build()?,
        ),
        MessageRole::User => ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(msg.content)
                .build()?,
        ),
        MessageRole::Assistant => ChatCompletionRequestMessage::Assistant(
            ChatCompletionRequestAssistantMessageArgs::default()
                .content(msg.content)
                .build()?,
        ),
    };
    Ok(message)
}

/// Best message in a provider error document: `error.message`, a bare string
/// `error`, then a top-level `message`.
pub fn error_message(value: &Value) -> Option<String> {
    value
        .pointer("/error/message")
        .and_then(Value::as_str)
        .or_else(|| value.get("error").and_then(Value::as_str))
        .or_else(|| value.get("message").and_then(Value::as_str))
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn failure_from_body(status: StatusCode, body: &[u8]) -> RelayError {
    let message = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| error_message(&value))
        .unwrap_or_else(|| {
            format!(
                "{} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("upstream error")
            )
        });
    RelayError::upstream(Some(status.as_u16()), Some(message))
}
