use chat_relay_shared::ChatMessage;
use tracing::debug;

use crate::credentials::ClientConfig;
use crate::error::RelayError;
use crate::llm::{ChatProvider, CompletionRequest};

/// Runs one non-streaming completion and returns the first choice's text.
/// A reply without choices is an empty answer, not a failure.
pub async fn invoke(
    provider: &dyn ChatProvider,
    config: &ClientConfig,
    messages: Vec<ChatMessage>,
) -> Result<String, RelayError> {
    let completion = provider
        .complete(config, CompletionRequest::new(messages))
        .await?;

    let answer = completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .unwrap_or_default();
    debug!("Completion returned {} chars", answer.len());
    Ok(answer)
}
