use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use chat_relay_shared::{ChatRequest, ChatResponse};
use std::sync::Arc;
use tracing::{debug, error};

use crate::completion;
use crate::config::Settings;
use crate::credentials::ClientConfig;
use crate::error::RelayError;
use crate::llm::ChatProvider;
use crate::messages::build_messages;
use crate::relay;
use crate::sse::SseTransport;

const BODY_LIMIT: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub provider: Arc<dyn ChatProvider>,
}

impl AppState {
    pub fn new(settings: Settings, provider: Arc<dyn ChatProvider>) -> Self {
        Self {
            settings: Arc::new(settings),
            provider,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/chat/stream", post(chat_stream))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, RelayError> {
    let Json(request) = payload.inspect_err(|e| error!("Rejected chat body: {}", e))?;
    let config = ClientConfig::resolve(
        request.api_key.as_deref(),
        request.base_url.as_deref(),
        &state.settings,
    );
    let messages = build_messages(&request.text, request.history)
        .inspect_err(|e| error!("Rejected chat input: {}", e))?;
    debug!(messages = messages.len(), ?config, "Chat request");

    let answer = completion::invoke(state.provider.as_ref(), &config, messages)
        .await
        .inspect_err(|e| error!("Chat completion failed: {}", e))?;

    Ok(Json(ChatResponse { answer }))
}

/// Validation failures are plain JSON responses; once the input is accepted
/// the response is committed to `200` and every later failure travels as an
/// `error` event.
async fn chat_stream(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, RelayError> {
    let Json(request) = payload.inspect_err(|e| error!("Rejected stream body: {}", e))?;
    let config = ClientConfig::resolve(
        request.api_key.as_deref(),
        request.base_url.as_deref(),
        &state.settings,
    );
    let messages = build_messages(&request.text, request.history)
        .inspect_err(|e| error!("Rejected chat input: {}", e))?;
    debug!(messages = messages.len(), ?config, "Stream request");

    let (transport, response) = SseTransport::open();
    let provider = state.provider.clone();
    tokio::spawn(async move {
        let summary = relay::run(provider, config, messages, transport).await;
        debug!(tokens = summary.tokens, outcome = ?summary.outcome, "Relay finished");
    });

    Ok(response)
}
