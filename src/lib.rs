//! BBO Stream - AscendEX best bid/offer client
//!
//! This crate connects to the AscendEX WebSocket stream, subscribes to the
//! best bid/offer channel of one trading pair and delivers decoded snapshots
//! to a consumer queue while keeping the connection alive.

pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod orderbook;
pub mod parser;
pub mod publisher;
pub mod websocket;

pub use client::{ClientState, FeedClient};
pub use config::Config;
pub use error::{FeedError, Result};
pub use metrics::FeedMetrics;
pub use orderbook::{BestOrderBook, Order};
pub use parser::{channel_name, BboUpdate, IncomingMessage, Request, SubscriptionAck};
pub use publisher::Publisher;
pub use websocket::{MessageKind, Transport, WsTransport};
