//! The relay handshake, from both ends.
//!
//! Both sides are sans-IO state machines: the relay's connection task drives
//! [`ConnectionWork`] and the client transport drives [`ClientHandshake`].

pub mod client;
pub mod digest;
pub mod server;

pub use client::{ClientHandshake, ClientState, HandshakeAction};
pub use server::{ConnectionWork, RelayAction, RelayState};

/// Version advertised in the relay greeting.
pub const PROTOCOL_VERSION: &str = "0.9.4";
