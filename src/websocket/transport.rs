//! Duplex message channel used by the feed client

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::error::Result;

/// Frame type of an outbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Binary,
}

/// A connection to a remote endpoint carrying whole messages
///
/// Lifecycle is Disconnected -> Connected -> Closed and never goes back.
/// Every operation before `connect` or after `close` fails with
/// [`FeedError::Closed`](crate::FeedError::Closed). Implementations never
/// retry; failures are returned as-is.
///
/// `write_message` may be called from several tasks while another task is
/// blocked in `read_message`, so implementations must serialize writes
/// internally and must not hold the read side while writing.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the connection to `endpoint`
    async fn connect(&self, endpoint: &str) -> Result<()>;

    /// Wait for the next message
    async fn read_message(&self) -> Result<Vec<u8>>;

    /// Send one message
    async fn write_message(&self, kind: MessageKind, payload: &[u8]) -> Result<()>;

    /// Close the connection, waking any pending reader
    async fn close(&self) -> Result<()>;
}
