//! Decoding of the provider's `text/event-stream` completion body into
//! [`ChatChunk`]s.

use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;

use crate::error::RelayError;
use crate::llm::{error_message, ChatChunk, ChunkStream};

/// Accumulates raw bytes and hands out complete `data:` payloads.
#[derive(Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(payload) = data_payload(&line) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flushes a trailing line that arrived without its newline.
    pub fn finish(&mut self) -> Vec<String> {
        let line = std::mem::take(&mut self.buffer);
        data_payload(&line).into_iter().collect()
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let payload = line.trim_end_matches(['\r', '\n']).strip_prefix("data:")?;
    let payload = payload.trim();
    (!payload.is_empty()).then(|| payload.to_string())
}

#[derive(Debug, PartialEq)]
pub enum Decoded {
    Chunk(ChatChunk),
    End,
    Fault(RelayError),
}

#[derive(Deserialize)]
struct StreamPayload {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

pub fn decode_payload(payload: &str) -> Decoded {
    if payload == "[DONE]" {
        return Decoded::End;
    }

    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => {
            return Decoded::Fault(RelayError::upstream(
                None,
                Some(format!("invalid stream payload: {e}")),
            ))
        }
    };

    if value.get("error").is_some_and(|e| !e.is_null()) {
        let status = value
            .pointer("/error/status")
            .and_then(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok());
        return Decoded::Fault(RelayError::upstream(status, error_message(&value)));
    }

    match serde_json::from_value::<StreamPayload>(value) {
        Ok(payload) => Decoded::Chunk(ChatChunk {
            delta: payload
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta)
                .and_then(|delta| delta.content),
        }),
        Err(e) => Decoded::Fault(RelayError::upstream(
            None,
            Some(format!("invalid stream payload: {e}")),
        )),
    }
}

/// Turns a raw byte stream into a chunk stream. The stream ends after
/// `[DONE]`, after the body is exhausted, or right after the first fault.
pub fn chunks<S, B, E>(bytes: S) -> ChunkStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<RelayError> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut bytes = std::pin::pin!(bytes);
        let mut decoder = SseDecoder::default();
        let mut exhausted = false;

        while !exhausted {
            let payloads = match bytes.next().await {
                Some(Ok(data)) => decoder.push(data.as_ref()),
                Some(Err(e)) => {
                    let err: RelayError = e.into();
                    yield Err(err);
                    return;
                }
                None => {
                    exhausted = true;
                    decoder.finish()
                }
            };

            for payload in payloads {
                match decode_payload(&payload) {
                    Decoded::Chunk(chunk) => {
                        yield Ok(chunk);
                    }
                    Decoded::End => return,
                    Decoded::Fault(err) => {
                        yield Err(err);
                        return;
                    }
                }
            }
        }
    })
}
