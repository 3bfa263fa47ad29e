use async_trait::async_trait;
use futures_util::stream;
use std::io;
use std::sync::{Arc, Mutex};

use crate::credentials::ClientConfig;
use crate::error::RelayError;
use crate::llm::{ChatChunk, ChatProvider, ChunkStream, Completion, CompletionRequest};

/// In-memory provider that replays a fixed script and records every call.
pub struct ScriptedProvider {
    completion: Result<Completion, RelayError>,
    open_error: Option<RelayError>,
    chunks: Vec<Result<ChatChunk, RelayError>>,
    requests: Mutex<Vec<CompletionRequest>>,
    configs: Mutex<Vec<ClientConfig>>,
}

impl ScriptedProvider {
    fn new(
        completion: Result<Completion, RelayError>,
        open_error: Option<RelayError>,
        chunks: Vec<Result<ChatChunk, RelayError>>,
    ) -> Self {
        Self {
            completion,
            open_error,
            chunks,
            requests: Mutex::new(Vec::new()),
            configs: Mutex::new(Vec::new()),
        }
    }

    pub fn answering(completion: Completion) -> Self {
        Self::new(Ok(completion), None, Vec::new())
    }

    /// Fails both the completion call and the stream open.
    pub fn failing(err: RelayError) -> Self {
        Self::new(Err(err.clone()), Some(err), Vec::new())
    }

    pub fn streaming(chunks: Vec<Result<ChatChunk, RelayError>>) -> Self {
        Self::new(Ok(Completion::default()), None, chunks)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn configs(&self) -> Vec<ClientConfig> {
        self.configs.lock().unwrap().clone()
    }

    fn record(&self, config: &ClientConfig, request: CompletionRequest) {
        self.configs.lock().unwrap().push(config.clone());
        self.requests.lock().unwrap().push(request);
    }
}

pub fn token(delta: &str) -> Result<ChatChunk, RelayError> {
    Ok(ChatChunk {
        delta: Some(delta.to_string()),
    })
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn complete(
        &self,
        config: &ClientConfig,
        request: CompletionRequest,
    ) -> Result<Completion, RelayError> {
        self.record(config, request);
        self.completion.clone()
    }

    async fn open_stream(
        &self,
        config: &ClientConfig,
        request: CompletionRequest,
    ) -> Result<ChunkStream, RelayError> {
        self.record(config, request);
        match &self.open_error {
            Some(err) => Err(err.clone()),
            None => Ok(Box::pin(stream::iter(self.chunks.clone()))),
        }
    }
}

/// Shared sink for log output captured during a test.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Routes `tracing` output on the current thread into a buffer until the
/// guard is dropped.
pub fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    (buffer, tracing::subscriber::set_default(subscriber))
}
