use axum::{
    http::{header, HeaderName},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
};
use chat_relay_shared::StreamEvent;
use futures_util::stream;
use std::convert::Infallible;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error, PartialEq)]
pub enum SendError {
    #[error("stream already ended")]
    Ended,
    #[error("client disconnected")]
    Disconnected,
}

/// Write side of one SSE response.
///
/// Events are queued in order onto the response body. After a terminal
/// event (`done` or `error`) nothing else is accepted; dropping or closing
/// the transport ends the response.
pub struct SseTransport {
    tx: mpsc::UnboundedSender<StreamEvent>,
    ended: bool,
}

impl SseTransport {
    pub fn new(tx: mpsc::UnboundedSender<StreamEvent>) -> Self {
        Self { tx, ended: false }
    }

    /// Builds the `200` streaming response and the transport feeding it.
    /// Headers go out as soon as the response is returned, before any event.
    pub fn open() -> (Self, Response) {
        let (tx, rx) = mpsc::unbounded_channel();
        let body = stream::unfold(rx, |mut rx| async move {
            let event = rx.recv().await?;
            Some((Ok::<_, Infallible>(to_sse_event(&event)), rx))
        });

        let response = (
            [
                (header::CACHE_CONTROL, "no-cache, no-transform"),
                (header::CONNECTION, "keep-alive"),
                (HeaderName::from_static("x-accel-buffering"), "no"),
            ],
            Sse::new(body),
        )
            .into_response();

        (Self::new(tx), response)
    }

    pub fn send(&mut self, event: StreamEvent) -> Result<(), SendError> {
        if self.ended {
            return Err(SendError::Ended);
        }
        if event.is_terminal() {
            self.ended = true;
        }
        self.tx.send(event).map_err(|_| SendError::Disconnected)
    }

    /// Ends the SSE body by dropping the sender.
    pub fn close(self) {
        drop(self);
    }
}

fn to_sse_event(event: &StreamEvent) -> Event {
    Event::default()
        .event(event.name())
        .data(event.data().to_string())
}
