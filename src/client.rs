//! Feed client lifecycle and message dispatch
//!
//! Drives connect -> subscribe -> dispatch -> disconnect over a [`Transport`]
//! and routes decoded messages: pings are answered, BBO updates are handed to
//! the [`Publisher`], everything else is ignored.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::Config;
use crate::error::{FeedError, Result};
use crate::metrics::{FeedMetrics, DROP_PARSE};
use crate::orderbook::BestOrderBook;
use crate::parser::{channel_name, IncomingMessage, Request, SubscriptionAck};
use crate::publisher::Publisher;
use crate::websocket::{MessageKind, Transport, WsTransport};

/// Default delay between firing shutdown and closing the transport
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(1);
/// Default depth of the internal delivery queue
pub const DEFAULT_DELIVERY_CAPACITY: usize = 1024;

/// Lifecycle state of a [`FeedClient`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ClientState {
    Idle = 0,
    Connected = 1,
    Subscribed = 2,
    Dispatching = 3,
    Closed = 4,
}

impl ClientState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ClientState::Idle,
            1 => ClientState::Connected,
            2 => ClientState::Subscribed,
            3 => ClientState::Dispatching,
            _ => ClientState::Closed,
        }
    }
}

/// Streaming BBO client for a single symbol
pub struct FeedClient<T: Transport> {
    endpoint: String,
    transport: T,
    shutdown: CancellationToken,
    state: AtomicU8,
    grace_period: Duration,
    delivery_capacity: usize,
    metrics: Arc<FeedMetrics>,
}

impl FeedClient<WsTransport> {
    /// Client over a WebSocket transport, configured from `config`
    pub fn from_config(config: &Config, metrics: Arc<FeedMetrics>) -> Self {
        Self::new(&config.ws_endpoint, WsTransport::new(), metrics)
            .with_grace_period(config.shutdown_grace())
            .with_delivery_capacity(config.delivery_queue_capacity)
    }
}

impl<T: Transport> FeedClient<T> {
    /// Create an idle client; nothing is opened until [`connect`](Self::connect)
    pub fn new(endpoint: &str, transport: T, metrics: Arc<FeedMetrics>) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            transport,
            shutdown: CancellationToken::new(),
            state: AtomicU8::new(ClientState::Idle as u8),
            grace_period: DEFAULT_GRACE_PERIOD,
            delivery_capacity: DEFAULT_DELIVERY_CAPACITY,
            metrics,
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn with_delivery_capacity(mut self, capacity: usize) -> Self {
        self.delivery_capacity = capacity.max(1);
        self
    }

    pub fn state(&self) -> ClientState {
        ClientState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn metrics(&self) -> &Arc<FeedMetrics> {
        &self.metrics
    }

    /// Whether shutdown has been signalled
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    fn set_state(&self, state: ClientState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Move from `expected` to `next`, failing if the client is elsewhere
    fn transition(&self, expected: ClientState, next: ClientState) -> Result<()> {
        self.state
            .compare_exchange(
                expected as u8,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(|actual| FeedError::InvalidState {
                expected,
                actual: ClientState::from_u8(actual),
            })
    }

    fn expect_state(&self, expected: ClientState) -> Result<()> {
        let actual = self.state();
        if actual != expected {
            return Err(FeedError::InvalidState { expected, actual });
        }
        Ok(())
    }

    /// Open the transport and consume the server's handshake confirmation
    pub async fn connect(&self) -> Result<()> {
        self.expect_state(ClientState::Idle)?;

        info!(endpoint = %self.endpoint, "Connecting to feed");

        self.transport
            .connect(&self.endpoint)
            .await
            .map_err(|e| match e {
                FeedError::ServerConnect(_) => e,
                other => FeedError::ServerConnect(other.to_string()),
            })?;

        match self.transport.read_message().await {
            Ok(raw) => {
                debug!(len = raw.len(), "Handshake confirmation received");
            }
            Err(e) => {
                if let Err(close_err) = self.transport.close().await {
                    debug!(error = %close_err, "Error releasing transport after failed handshake");
                }
                return Err(FeedError::ServerConnect(format!(
                    "handshake read failed: {}",
                    e
                )));
            }
        }

        self.transition(ClientState::Idle, ClientState::Connected)?;
        info!("Connected to feed");
        Ok(())
    }

    /// Subscribe to BBO updates for `symbol` (e.g. "BTC_USDT")
    ///
    /// Any failure disconnects the client before returning.
    pub async fn subscribe(&self, symbol: &str) -> Result<()> {
        self.expect_state(ClientState::Connected)?;

        match self.request_subscription(symbol).await {
            Ok(()) => {
                self.transition(ClientState::Connected, ClientState::Subscribed)?;
                info!(channel = %channel_name(symbol), "Subscribed");
                Ok(())
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Subscription failed, disconnecting");
                self.disconnect().await;
                Err(e)
            }
        }
    }

    async fn request_subscription(&self, symbol: &str) -> Result<()> {
        let request = Request::subscribe(symbol).encode()?;

        self.transport
            .write_message(MessageKind::Text, request.as_bytes())
            .await
            .map_err(|e| FeedError::Subscription {
                code: None,
                reason: format!("failed to send subscribe request: {}", e),
            })?;

        let raw = self
            .transport
            .read_message()
            .await
            .map_err(|e| FeedError::Subscription {
                code: None,
                reason: format!("failed to read acknowledgment: {}", e),
            })?;

        let ack = SubscriptionAck::decode(&raw).map_err(|e| FeedError::Subscription {
            code: None,
            reason: format!("malformed acknowledgment: {}", e),
        })?;

        if !ack.is_success() {
            return Err(FeedError::Subscription {
                code: Some(ack.code),
                reason: ack.reason.unwrap_or_default(),
            });
        }

        debug!(channel = ?ack.ch, id = ?ack.id, "Subscription acknowledged");
        Ok(())
    }

    /// Run the read/dispatch loop, delivering snapshots to `output`
    ///
    /// Returns once the transport closes, an unexpected transport error
    /// disconnects the client, a message fails to decode, or shutdown is
    /// signalled. Loop failures are logged, not returned; the consumer sees
    /// `output` close once pending deliveries finish or are abandoned.
    pub async fn run(&self, output: mpsc::Sender<BestOrderBook>) -> Result<()> {
        self.transition(ClientState::Subscribed, ClientState::Dispatching)?;

        let (publisher, _forwarder) = Publisher::spawn(
            output,
            self.delivery_capacity,
            self.shutdown.clone(),
            self.metrics.clone(),
        );

        info!("Starting dispatch loop");

        loop {
            let read = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    debug!("Shutdown signalled, leaving dispatch loop");
                    break;
                }
                read = self.transport.read_message() => read,
            };

            let raw = match read {
                Ok(raw) => raw,
                Err(FeedError::Closed) => {
                    info!("Connection closed, leaving dispatch loop");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Error reading from feed");
                    self.disconnect().await;
                    break;
                }
            };

            self.metrics.messages_received.inc();

            let message = match IncomingMessage::decode(&raw) {
                Ok(message) => message,
                Err(e) => {
                    self.metrics.decode_failures.inc();
                    error!(
                        error = %e,
                        raw = %String::from_utf8_lossy(&raw),
                        "Failed to decode message, stopping dispatch"
                    );
                    break;
                }
            };

            self.route(message, &publisher).await;
        }

        info!("Dispatch loop stopped");
        Ok(())
    }

    async fn route(&self, message: IncomingMessage, publisher: &Publisher) {
        match message {
            IncomingMessage::Ping(ping) => {
                trace!(hp = ?ping.hp, "Server ping");
                if self.send_request(&Request::Pong).await {
                    self.metrics.pings_answered.inc();
                }
            }
            IncomingMessage::Bbo(update) => match update.best_order_book() {
                Ok(book) => {
                    trace!(
                        symbol = %update.symbol,
                        ts = ?update.timestamp(),
                        bid = book.bid.price,
                        ask = book.ask.price,
                        "BBO update"
                    );
                    publisher.publish(book);
                }
                Err(e) => {
                    warn!(symbol = %update.symbol, error = %e, "Dropping malformed BBO update");
                    self.metrics.record_dropped(DROP_PARSE);
                }
            },
            IncomingMessage::SubscriptionAck(ack) => {
                debug!(channel = ?ack.ch, code = ack.code, "Ignoring late acknowledgment");
            }
            IncomingMessage::Unrecognized(kind) => {
                trace!(kind = ?kind, "Ignoring unrecognized message");
            }
        }
    }

    /// Send a client-initiated keep-alive ping
    ///
    /// Does not schedule anything itself; call it on the caller's own timer.
    /// Failures are logged and otherwise ignored.
    pub async fn send_ping(&self) {
        if self.send_request(&Request::Ping).await {
            self.metrics.keepalives_sent.inc();
        }
    }

    async fn send_request(&self, request: &Request) -> bool {
        let payload = match request.encode() {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "Failed to encode request");
                return false;
            }
        };

        match self
            .transport
            .write_message(MessageKind::Text, payload.as_bytes())
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(request = ?request, error = %e, "Failed to send keep-alive message");
                false
            }
        }
    }

    /// Signal shutdown, wait the grace period, then close the transport
    ///
    /// Pending deliveries observe the signal and are abandoned. Closing an
    /// already closed transport is ignored.
    pub async fn disconnect(&self) {
        self.set_state(ClientState::Closed);
        self.shutdown.cancel();

        sleep(self.grace_period).await;

        match self.transport.close().await {
            Ok(()) => info!("Disconnected from feed"),
            Err(FeedError::Closed) => debug!("Transport already closed"),
            Err(e) => warn!(error = %e, "Error closing transport"),
        }
    }
}
