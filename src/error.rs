//! Error types for the BBO stream client

use thiserror::Error;

use crate::client::ClientState;

/// Feed client errors
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to connect to feed server: {0}")]
    ServerConnect(String),

    #[error("Connection is closed")]
    Closed,

    #[error(
        "Subscription failed (code {}): {reason}",
        .code.map_or_else(|| "none".to_string(), |c| c.to_string())
    )]
    Subscription { code: Option<i64>, reason: String },

    #[error("Failed to parse order: {0}")]
    Parse(String),

    #[error("Failed to decode message: {0}")]
    Decode(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid client state: expected {expected:?}, found {actual:?}")]
    InvalidState {
        expected: ClientState,
        actual: ClientState,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metrics error: {0}")]
    Metrics(String),
}

impl FeedError {
    /// Whether this error means the transport was closed or never opened
    pub fn is_closed(&self) -> bool {
        matches!(self, FeedError::Closed)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for FeedError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;

        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => FeedError::Closed,
            other => FeedError::Transport(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::Decode(err.to_string())
    }
}

impl From<prometheus::Error> for FeedError {
    fn from(err: prometheus::Error) -> Self {
        FeedError::Metrics(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_error_display() {
        let err = FeedError::Subscription {
            code: Some(10000),
            reason: "INVALID_CHANNEL".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Subscription failed (code 10000): INVALID_CHANNEL"
        );

        let err = FeedError::Subscription {
            code: None,
            reason: "malformed acknowledgment".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Subscription failed (code none): malformed acknowledgment"
        );
    }

    #[test]
    fn test_websocket_close_maps_to_closed() {
        let err: FeedError = tokio_tungstenite::tungstenite::Error::AlreadyClosed.into();
        assert!(err.is_closed());

        let err: FeedError = tokio_tungstenite::tungstenite::Error::Utf8.into();
        assert!(matches!(err, FeedError::Transport(_)));
    }
}
