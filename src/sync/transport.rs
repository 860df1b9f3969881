//! Push-event transports.
//!
//! A transport yields `processing_update` events in delivery order. The
//! store never owns one; a [`SyncSession`](crate::sync::SyncSession) does.

use crate::error::TransportError;
use crate::models::StatusEvent;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Event name carried by status updates.
pub const PROCESSING_UPDATE: &str = "processing_update";

/// Source of push events.
#[async_trait]
pub trait PushTransport: Send {
    /// Next event, or `None` once the channel has closed.
    async fn next_event(&mut self) -> Option<Result<StatusEvent, TransportError>>;
}

/// In-process transport fed through an unbounded channel.
pub struct ChannelTransport {
    rx: mpsc::UnboundedReceiver<StatusEvent>,
}

impl ChannelTransport {
    /// Create a transport and the sender that feeds it.
    pub fn pair() -> (mpsc::UnboundedSender<StatusEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }
}

#[async_trait]
impl PushTransport for ChannelTransport {
    async fn next_event(&mut self) -> Option<Result<StatusEvent, TransportError>> {
        self.rx.recv().await.map(Ok)
    }
}

/// Newline-delimited JSON event stream read over a long-lived HTTP response.
pub struct HttpEventStream {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    buffer: Vec<u8>,
    finished: bool,
}

impl HttpEventStream {
    /// Open the stream. `token` is sent as a bearer header when present.
    pub async fn connect(url: &str, token: Option<&str>) -> Result<Self, TransportError> {
        // No overall timeout: the response is expected to stay open.
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let mut request = client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/x-ndjson, text/event-stream");
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Connect(format!("{}: {}", url, e)))?;
        if !response.status().is_success() {
            return Err(TransportError::Connect(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        info!("Connected to event stream at {}", url);
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()))
            .boxed();

        Ok(Self::from_stream(body))
    }

    fn from_stream(body: BoxStream<'static, reqwest::Result<Vec<u8>>>) -> Self {
        Self {
            body,
            buffer: Vec::new(),
            finished: false,
        }
    }

    /// Remove and return the next complete line from the buffer.
    fn take_line(&mut self) -> Option<String> {
        let pos = self.buffer.iter().position(|b| *b == b'\n')?;
        let line: Vec<u8> = self.buffer.drain(..=pos).collect();
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

#[async_trait]
impl PushTransport for HttpEventStream {
    async fn next_event(&mut self) -> Option<Result<StatusEvent, TransportError>> {
        loop {
            while let Some(line) = self.take_line() {
                if let Some(event) = parse_event_line(&line) {
                    return Some(Ok(event));
                }
            }

            if self.finished {
                return None;
            }

            match self.body.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(TransportError::Stream(e.to_string())));
                }
                None => {
                    self.finished = true;
                    // Flush a trailing line without a newline.
                    if !self.buffer.is_empty() {
                        let rest = String::from_utf8_lossy(&self.buffer).into_owned();
                        self.buffer.clear();
                        if let Some(event) = parse_event_line(&rest) {
                            return Some(Ok(event));
                        }
                    }
                    return None;
                }
            }
        }
    }
}

/// Decode one line of the event stream.
///
/// Accepts a bare `{video_id, status, progress}` object or an envelope
/// `{"event": "processing_update", "data": {...}}`, optionally behind an
/// SSE `data:` prefix. Anything else yields `None`.
pub fn parse_event_line(line: &str) -> Option<StatusEvent> {
    let line = line.trim();
    let line = line.strip_prefix("data:").map(str::trim).unwrap_or(line);
    if line.is_empty() || !line.starts_with('{') {
        return None;
    }

    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            debug!("Skipping malformed event line: {}", e);
            return None;
        }
    };

    let event_name = value
        .get("event")
        .map(|name| name.as_str().unwrap_or_default().to_string());
    let payload = match event_name {
        Some(name) if name == PROCESSING_UPDATE => value.get("data")?.clone(),
        Some(name) => {
            debug!("Ignoring event {:?}", name);
            return None;
        }
        None => value,
    };

    match serde_json::from_value::<StatusEvent>(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            debug!("Skipping event with unexpected shape: {}", e);
            None
        }
    }
}
