use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default)]
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Milliseconds since the Unix epoch, as the web client stamps it.
    #[serde(default)]
    pub created_at: i64,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            streaming: None,
            error: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// Body of both `/api/chat` and `/api/chat/stream`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<ChatMessage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
}

/// JSON error body. `status` is only present inside an `error` stream event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

/// One server-sent event of the chat stream.
///
/// Every stream is `Meta`, any number of `Token`s, then exactly one of
/// `Done` or `Error`.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Meta,
    Token { delta: String },
    Done,
    Error { message: String, status: u16 },
}

#[derive(Deserialize)]
struct TokenData {
    delta: String,
}

impl StreamEvent {
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Meta => "meta",
            StreamEvent::Token { .. } => "token",
            StreamEvent::Done => "done",
            StreamEvent::Error { .. } => "error",
        }
    }

    pub fn data(&self) -> serde_json::Value {
        match self {
            StreamEvent::Meta | StreamEvent::Done => json!({ "ok": true }),
            StreamEvent::Token { delta } => json!({ "delta": delta }),
            StreamEvent::Error { message, status } => json!({ "error": message, "status": status }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error { .. })
    }

    /// Rebuilds an event from its `event:` name and `data:` payload.
    pub fn from_parts(name: &str, data: &str) -> Option<Self> {
        match name {
            "meta" => Some(StreamEvent::Meta),
            "done" => Some(StreamEvent::Done),
            "token" => serde_json::from_str::<TokenData>(data)
                .ok()
                .map(|token| StreamEvent::Token { delta: token.delta }),
            "error" => serde_json::from_str::<ErrorBody>(data)
                .ok()
                .map(|body| StreamEvent::Error {
                    message: body.error,
                    status: body.status.unwrap_or(500),
                }),
            _ => None,
        }
    }
}

/// Splits a `text/event-stream` body into events. Frames with an unknown
/// name or undecodable data are skipped.
pub fn parse_frames(body: &str) -> Vec<StreamEvent> {
    body.split("\n\n")
        .filter_map(|frame| {
            let mut name = None;
            let mut data = Vec::new();
            for line in frame.lines() {
                if let Some(value) = line.strip_prefix("event:") {
                    name = Some(value.trim());
                } else if let Some(value) = line.strip_prefix("data:") {
                    data.push(value.strip_prefix(' ').unwrap_or(value));
                }
            }
            StreamEvent::from_parts(name?, &data.join("\n"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_message_accepts_client_shape() {
        let raw = r#"{"id":"1","role":"user","content":"a","createdAt":1}"#;
        let message: ChatMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(message.id, "1");
        assert_eq!(message.role, MessageRole::User);
        assert_eq!(message.content, "a");
        assert_eq!(message.created_at, 1);
        assert_eq!(message.error, None);
    }

    #[test]
    fn null_error_and_streaming_flag_are_accepted() {
        let raw = r#"{"id":"2","role":"assistant","content":"b","streaming":false,"error":null,"createdAt":2}"#;
        let message: ChatMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(message.streaming, Some(false));
        assert_eq!(message.error, None);
    }

    #[test]
    fn unknown_role_is_rejected() {
        let raw = r#"{"id":"1","role":"tool","content":"a","createdAt":1}"#;
        assert!(serde_json::from_str::<ChatMessage>(raw).is_err());
    }

    #[test]
    fn request_fields_are_optional() {
        let request: ChatRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.text, "");
        assert!(request.history.is_none());
        assert!(request.api_key.is_none());

        let request: ChatRequest =
            serde_json::from_str(r#"{"text":"hi","apiKey":"sk-x","baseUrl":"http://local"}"#).unwrap();
        assert_eq!(request.api_key.as_deref(), Some("sk-x"));
        assert_eq!(request.base_url.as_deref(), Some("http://local"));
    }

    #[test]
    fn event_payloads_match_wire_vocabulary() {
        assert_eq!(StreamEvent::Meta.data(), json!({ "ok": true }));
        assert_eq!(StreamEvent::Done.data(), json!({ "ok": true }));
        assert_eq!(
            StreamEvent::Token { delta: "при".into() }.data(),
            json!({ "delta": "при" })
        );
        assert_eq!(
            StreamEvent::Error { message: "slow down".into(), status: 429 }.data(),
            json!({ "error": "slow down", "status": 429 })
        );
        assert!(StreamEvent::Done.is_terminal());
        assert!(!StreamEvent::Meta.is_terminal());
    }

    #[test]
    fn parses_event_stream_body() {
        let body = "event: meta\ndata: {\"ok\":true}\n\n\
                    event: token\ndata: {\"delta\":\"Hi\"}\n\n\
                    : keep-alive\n\n\
                    event: error\ndata: {\"error\":\"boom\",\"status\":429}\n\n";
        assert_eq!(
            parse_frames(body),
            vec![
                StreamEvent::Meta,
                StreamEvent::Token { delta: "Hi".into() },
                StreamEvent::Error { message: "boom".into(), status: 429 },
            ]
        );
    }
}
