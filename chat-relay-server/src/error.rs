use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chat_relay_shared::{ErrorBody, StreamEvent};
use thiserror::Error;

pub const EMPTY_TEXT: &str = "Пустой текст";
pub const COMPLETION_FALLBACK: &str = "Неизвестная ошибка при обращении к модели";
pub const STREAM_FALLBACK: &str = "Ошибка стриминга";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RelayError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Body the JSON extractor refused; keeps its status (413 for oversized
    /// bodies, 400 for syntax errors).
    #[error("rejected request body ({status}): {message}")]
    RejectedBody { status: u16, message: String },

    #[error("upstream error ({status}): {}", .message.as_deref().unwrap_or("<no message>"))]
    Upstream { status: u16, message: Option<String> },

    #[error("unexpected error: {0}")]
    Unknown(String),
}

impl RelayError {
    pub fn empty_text() -> Self {
        RelayError::InvalidInput(EMPTY_TEXT.to_string())
    }

    /// Provider fault. A missing status becomes 500, a blank message is dropped.
    pub fn upstream(status: Option<u16>, message: Option<String>) -> Self {
        RelayError::Upstream {
            status: status.unwrap_or(500),
            message: message.filter(|m| !m.trim().is_empty()),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RelayError::RejectedBody { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(StatusCode::is_client_error)
                .unwrap_or(StatusCode::BAD_REQUEST),
            RelayError::Upstream { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            RelayError::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the caller; `fallback` covers faults with nothing
    /// worth repeating.
    pub fn client_message(&self, fallback: &str) -> String {
        match self {
            RelayError::InvalidInput(message) | RelayError::RejectedBody { message, .. } => {
                message.clone()
            }
            RelayError::Upstream { message: Some(message), .. } => message.clone(),
            RelayError::Upstream { message: None, .. } | RelayError::Unknown(_) => {
                fallback.to_string()
            }
        }
    }

    pub fn to_event(&self) -> StreamEvent {
        StreamEvent::Error {
            message: self.client_message(STREAM_FALLBACK),
            status: self.status().as_u16(),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.client_message(COMPLETION_FALLBACK),
            status: None,
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<JsonRejection> for RelayError {
    fn from(rejection: JsonRejection) -> Self {
        RelayError::RejectedBody {
            status: rejection.status().as_u16(),
            message: rejection.body_text(),
        }
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        RelayError::upstream(err.status().map(|s| s.as_u16()), Some(err.to_string()))
    }
}

impl From<async_openai::error::OpenAIError> for RelayError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        RelayError::Unknown(err.to_string())
    }
}
