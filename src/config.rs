//! Configuration module for the BBO stream client

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{FeedError, Result};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// WebSocket endpoint of the feed
    pub ws_endpoint: String,

    /// Trading pair in `TOKEN_ASSET` form (e.g. "BTC_USDT")
    pub symbol: String,

    /// Delay between firing shutdown and closing the transport
    pub shutdown_grace_ms: u64,

    /// Interval between client-initiated keep-alive pings
    pub keepalive_interval_secs: u64,

    /// Internal delivery queue depth before updates are dropped
    pub delivery_queue_capacity: usize,

    /// Port for the health and metrics HTTP server
    pub health_port: u16,
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            ws_endpoint: env::var("WS_ENDPOINT").unwrap_or(defaults.ws_endpoint),
            symbol: env::var("SYMBOL")
                .map(|s| s.trim().to_uppercase())
                .unwrap_or(defaults.symbol),
            shutdown_grace_ms: env_or("SHUTDOWN_GRACE_MS", defaults.shutdown_grace_ms),
            keepalive_interval_secs: env_or(
                "KEEPALIVE_INTERVAL_SECS",
                defaults.keepalive_interval_secs,
            ),
            delivery_queue_capacity: env_or(
                "DELIVERY_QUEUE_CAPACITY",
                defaults.delivery_queue_capacity,
            ),
            health_port: env_or("HEALTH_PORT", defaults.health_port),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the client cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.ws_endpoint.trim().is_empty() {
            return Err(FeedError::Config("WS_ENDPOINT must not be empty".to_string()));
        }
        if !self.symbol.contains('_') {
            return Err(FeedError::Config(format!(
                "SYMBOL must have the form TOKEN_ASSET, got {:?}",
                self.symbol
            )));
        }
        if self.delivery_queue_capacity == 0 {
            return Err(FeedError::Config(
                "DELIVERY_QUEUE_CAPACITY must be greater than zero".to_string(),
            ));
        }
        if self.keepalive_interval_secs == 0 {
            return Err(FeedError::Config(
                "KEEPALIVE_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ws_endpoint: "wss://ascendex.com/0/api/pro/v1/stream".to_string(),
            symbol: "BTC_USDT".to_string(),
            shutdown_grace_ms: 1000,
            keepalive_interval_secs: 15,
            delivery_queue_capacity: 1024,
            health_port: 9090,
        }
    }
}

/// Read and parse an environment variable, falling back when unset or invalid
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.shutdown_grace(), Duration::from_secs(1));
        assert_eq!(config.keepalive_interval(), Duration::from_secs(15));
    }

    #[test]
    fn test_validate_rejects_bad_symbol() {
        let config = Config {
            symbol: "BTCUSDT".to_string(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(FeedError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = Config {
            delivery_queue_capacity: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(FeedError::Config(_))));
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        env::set_var("BBO_STREAM_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_or("BBO_STREAM_TEST_GARBAGE", 7u64), 7);
        env::set_var("BBO_STREAM_TEST_NUMBER", " 42 ");
        assert_eq!(env_or("BBO_STREAM_TEST_NUMBER", 7u64), 42);
    }
}
