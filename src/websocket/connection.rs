//! WebSocket transport for the AscendEX stream
//!
//! Handles connection, message reception and sending.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{
    connect_async,
    tungstenite::protocol::Message,
    MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{MessageKind, Transport};
use crate::error::{FeedError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket implementation of [`Transport`]
///
/// The socket is split so a reader blocked in `read_message` never holds
/// the lock writers need.
pub struct WsTransport {
    sink: Mutex<Option<SplitSink<WsStream, Message>>>,
    stream: Mutex<Option<SplitStream<WsStream>>>,
    opened: AtomicBool,
    closed: CancellationToken,
}

impl WsTransport {
    pub fn new() -> Self {
        Self {
            sink: Mutex::new(None),
            stream: Mutex::new(None),
            opened: AtomicBool::new(false),
            closed: CancellationToken::new(),
        }
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.opened.load(Ordering::Acquire) && !self.closed.is_cancelled()
    }

    /// Error for a connection that ended without a local `close`
    fn peer_closed(&self, detail: &str) -> FeedError {
        if self.closed.is_cancelled() {
            FeedError::Closed
        } else {
            FeedError::Transport(format!("connection closed by peer: {}", detail))
        }
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, endpoint: &str) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(FeedError::Closed);
        }
        if self.opened.swap(true, Ordering::AcqRel) {
            return Err(FeedError::ServerConnect(
                "transport is already connected".to_string(),
            ));
        }

        info!(url = %endpoint, "Connecting to WebSocket");

        let (ws_stream, response) = match connect_async(endpoint).await {
            Ok(connected) => connected,
            Err(e) => {
                self.opened.store(false, Ordering::Release);
                return Err(FeedError::ServerConnect(format!(
                    "Failed to connect to {}: {}",
                    endpoint, e
                )));
            }
        };

        info!(status = ?response.status(), "WebSocket connected");

        // Closed while the handshake was in flight
        let mut sink_guard = self.sink.lock().await;
        if self.closed.is_cancelled() {
            drop(sink_guard);
            let mut ws_stream = ws_stream;
            if let Err(e) = ws_stream.close(None).await {
                debug!(error = %e, "Error closing socket opened during close");
            }
            return Err(FeedError::Closed);
        }

        let (sink, stream) = ws_stream.split();
        *self.stream.lock().await = Some(stream);
        *sink_guard = Some(sink);

        Ok(())
    }

    async fn read_message(&self) -> Result<Vec<u8>> {
        if self.closed.is_cancelled() {
            return Err(FeedError::Closed);
        }

        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or(FeedError::Closed)?;

        loop {
            let next = tokio::select! {
                _ = self.closed.cancelled() => return Err(FeedError::Closed),
                next = stream.next() => next,
            };

            match next {
                Some(Ok(Message::Text(text))) => {
                    debug!(len = text.len(), "Received text message");
                    return Ok(text.into_bytes());
                }
                Some(Ok(Message::Binary(data))) => {
                    debug!(len = data.len(), "Received binary message");
                    return Ok(data);
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                    // Protocol-level keep-alive; tungstenite queues the pong itself
                    continue;
                }
                Some(Ok(Message::Frame(_))) => continue,
                Some(Ok(Message::Close(frame))) => {
                    warn!(frame = ?frame, "Received close frame");
                    return Err(self.peer_closed("close frame"));
                }
                Some(Err(e)) => {
                    return Err(match FeedError::from(e) {
                        FeedError::Closed => self.peer_closed("socket closed"),
                        other => other,
                    });
                }
                None => {
                    warn!("WebSocket stream ended");
                    return Err(self.peer_closed("stream ended"));
                }
            }
        }
    }

    async fn write_message(&self, kind: MessageKind, payload: &[u8]) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(FeedError::Closed);
        }

        let message = match kind {
            MessageKind::Text => Message::Text(String::from_utf8(payload.to_vec()).map_err(
                |e| FeedError::Transport(format!("text message is not valid UTF-8: {}", e)),
            )?),
            MessageKind::Binary => Message::Binary(payload.to_vec()),
        };

        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(FeedError::Closed)?;
        sink.send(message).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let was_closed = self.closed.is_cancelled();
        self.closed.cancel();
        if was_closed {
            return Err(FeedError::Closed);
        }

        let sink = self.sink.lock().await.take();
        let Some(mut sink) = sink else {
            return Err(FeedError::Closed);
        };

        if let Err(e) = sink.close().await {
            debug!(error = %e, "Error sending close frame");
        }
        self.stream.lock().await.take();

        info!("WebSocket closed");
        Ok(())
    }
}
