//! Client transports: a byte pipe to an IRC server through the relay.
//!
//! A [`Transport`] is driven by commands and reports back through a
//! [`TransportEvent`] channel handed to it at construction. Every
//! implementation completes the relay handshake before its first
//! [`TransportEvent::Connected`].

mod proxy;
pub mod reconnect;

use bytes::Bytes;
use thiserror::Error;

use crate::link::LinkError;

pub use proxy::{dial, ProxyEndpoint, ProxyTransport};
pub use reconnect::Supervisor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The relay bridged us to the IRC server.
    Connected,
    /// Bytes from the IRC server, in arrival order.
    Received(Bytes),
    Disconnected(DisconnectReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The link dropped or could not be established.
    Closed(String),
    /// The relay answered `DISCONNECTED <reason>` during the handshake.
    Rejected(String),
    /// The relay refused our digest.
    AuthFailed(String),
    /// The relay sent a line the handshake does not understand.
    Protocol(String),
    /// `disconnect()` was called.
    Operator,
}

impl DisconnectReason {
    pub fn from_rejection(reason: String) -> Self {
        if reason.starts_with("digest") {
            DisconnectReason::AuthFailed(reason)
        } else {
            DisconnectReason::Rejected(reason)
        }
    }

    /// Whether a reconnect should follow.
    pub fn should_retry(&self) -> bool {
        !matches!(
            self,
            DisconnectReason::Operator | DisconnectReason::AuthFailed(_)
        )
    }
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisconnectReason::Closed(reason) => write!(f, "connection lost: {}", reason),
            DisconnectReason::Rejected(reason) => write!(f, "relay refused: {}", reason),
            DisconnectReason::AuthFailed(reason) => write!(f, "authentication failed: {}", reason),
            DisconnectReason::Protocol(reason) => write!(f, "protocol error: {}", reason),
            DisconnectReason::Operator => write!(f, "disconnected"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("could not resolve {0}")]
    Resolve(String),
    #[error("not connected")]
    NotConnected,
}

/// Command side of a transport.
pub trait Transport: Send {
    /// Start connecting to `host:port` through the relay. Progress is
    /// reported on the event channel; any previous connection is dropped.
    fn connect(&mut self, host: &str, port: u16);

    /// Tear the connection down. A `Disconnected(Operator)` event follows.
    fn disconnect(&mut self);

    /// Queue text for the IRC server. Fails unless the bridge is open.
    fn send(&mut self, text: &str) -> Result<(), TransportError>;
}
