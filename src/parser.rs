//! Parser module for AscendEX WebSocket messages
//!
//! Decodes inbound messages into a tagged envelope and encodes the outbound
//! requests the client sends.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FeedError, Result};
use crate::orderbook::BestOrderBook;

/// Channel prefix for best bid/offer subscriptions
const BBO_CHANNEL_PREFIX: &str = "bbo:";

/// Acknowledgment sent by the server in response to a subscribe request
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionAck {
    /// Message kind ("sub" on success, "error" on rejection)
    #[serde(default)]
    pub m: Option<String>,

    /// Channel the acknowledgment refers to
    #[serde(default)]
    pub ch: Option<String>,

    /// Request id echoed by the server
    #[serde(default)]
    pub id: Option<String>,

    /// Status code, zero on success
    pub code: i64,

    /// Rejection reason
    #[serde(default)]
    pub reason: Option<String>,
}

impl SubscriptionAck {
    /// Decode an acknowledgment from a raw message
    pub fn decode(raw: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(raw)?)
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// Server-initiated keep-alive
#[derive(Debug, Clone, Deserialize)]
pub struct Ping {
    /// Remaining health points before the server drops the session
    #[serde(default)]
    pub hp: Option<i64>,
}

/// Best bid/offer update for a symbol
#[derive(Debug, Clone, Deserialize)]
pub struct BboUpdate {
    #[serde(default)]
    pub symbol: String,

    pub data: BboData,
}

/// Payload of a BBO update
#[derive(Debug, Clone, Deserialize)]
pub struct BboData {
    /// Exchange timestamp (milliseconds)
    pub ts: i64,

    /// Raw `[price, amount]` tokens for the best bid
    pub bid: Vec<String>,

    /// Raw `[price, amount]` tokens for the best ask
    pub ask: Vec<String>,
}

impl BboUpdate {
    /// Build the snapshot carried by this update
    pub fn best_order_book(&self) -> Result<BestOrderBook> {
        BestOrderBook::from_tokens(&self.data.bid, &self.data.ask)
    }

    /// Exchange timestamp as a UTC datetime
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.data.ts).single()
    }
}

/// Decoded inbound message
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    SubscriptionAck(SubscriptionAck),
    Ping(Ping),
    Bbo(BboUpdate),
    /// Any other message kind; `None` when the message carries no kind at all
    Unrecognized(Option<String>),
}

impl IncomingMessage {
    /// Decode a raw message by its `m` tag
    pub fn decode(raw: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(raw)?;

        let kind = match value.as_object().map(|obj| obj.get("m")) {
            None => {
                return Err(FeedError::Decode(
                    "expected a JSON object at top level".to_string(),
                ))
            }
            Some(None) => return Ok(IncomingMessage::Unrecognized(None)),
            Some(Some(Value::String(kind))) => kind.clone(),
            Some(Some(other)) => {
                return Err(FeedError::Decode(format!(
                    "message kind must be a string, got {}",
                    other
                )))
            }
        };

        match kind.as_str() {
            "ping" => Ok(IncomingMessage::Ping(serde_json::from_value(value)?)),
            "bbo" => Ok(IncomingMessage::Bbo(serde_json::from_value(value)?)),
            "sub" => Ok(IncomingMessage::SubscriptionAck(serde_json::from_value(
                value,
            )?)),
            _ => Ok(IncomingMessage::Unrecognized(Some(kind))),
        }
    }
}

/// Outbound request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Request {
    Sub { ch: String },
    Ping,
    Pong,
}

impl Request {
    /// Subscribe request for the BBO channel of `symbol`
    pub fn subscribe(symbol: &str) -> Self {
        Request::Sub {
            ch: channel_name(symbol),
        }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Channel name for a `TOKEN_ASSET` symbol, e.g. "USDT_BTC" -> "bbo:USDT/BTC"
pub fn channel_name(symbol: &str) -> String {
    format!("{}{}", BBO_CHANNEL_PREFIX, symbol.replacen('_', "/", 1))
}
