use chat_relay_shared::{ChatMessage, StreamEvent};
use futures_util::StreamExt;
use std::sync::Arc;
use tracing::{error, info};

use crate::credentials::ClientConfig;
use crate::llm::{ChatProvider, CompletionRequest};
use crate::sse::SseTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Failed,
    /// The client went away; the provider stream was dropped unfinished.
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaySummary {
    pub tokens: usize,
    pub outcome: Outcome,
}

/// Pulls the provider's chunk stream and forwards it onto `transport`.
///
/// Sequence: `meta`, one `token` per non-empty delta in provider order,
/// then `done`. Any provider fault, including failing to open the stream,
/// ends the stream with a single `error` event instead.
pub async fn run(
    provider: Arc<dyn ChatProvider>,
    config: ClientConfig,
    messages: Vec<ChatMessage>,
    mut transport: SseTransport,
) -> RelaySummary {
    let mut chunks = match provider
        .open_stream(&config, CompletionRequest::new(messages))
        .await
    {
        Ok(chunks) => chunks,
        Err(e) => {
            error!("Failed to open completion stream: {}", e);
            let _ = transport.send(e.to_event());
            transport.close();
            return RelaySummary { tokens: 0, outcome: Outcome::Failed };
        }
    };

    if transport.send(StreamEvent::Meta).is_err() {
        info!("Client disconnected before the stream started");
        return RelaySummary { tokens: 0, outcome: Outcome::Disconnected };
    }

    let mut tokens = 0;
    let outcome = loop {
        match chunks.next().await {
            Some(Ok(chunk)) => {
                let Some(delta) = chunk.delta.filter(|d| !d.is_empty()) else {
                    continue;
                };
                if transport.send(StreamEvent::Token { delta }).is_err() {
                    info!("Client disconnected after {} tokens", tokens);
                    break Outcome::Disconnected;
                }
                tokens += 1;
            }
            Some(Err(e)) => {
                error!("Completion stream failed after {} tokens: {}", tokens, e);
                let _ = transport.send(e.to_event());
                break Outcome::Failed;
            }
            None => {
                let _ = transport.send(StreamEvent::Done);
                break Outcome::Done;
            }
        }
    };

    transport.close();
    RelaySummary { tokens, outcome }
}
