//! WebSocket module for feed connection management

mod connection;
mod transport;

#[cfg(test)]
pub(crate) mod scripted;

pub use connection::WsTransport;
pub use transport::{MessageKind, Transport};

#[cfg(test)]
pub use transport::MockTransport;
