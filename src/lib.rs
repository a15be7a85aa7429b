//! IRC over an authenticated socket relay.
//!
//! The relay ([`relay`]) accepts clients over WebSocket, length-framed TCP or
//! raw TCP, checks a password digest, and bridges each client to the IRC
//! server it names. The client side pairs a [`transport`] that performs the
//! relay handshake with an [`irc`] session engine that tracks channels and
//! reports events to an observer.

pub mod app;
pub mod config;
pub mod irc;
pub mod link;
pub mod logging;
pub mod proxy;
pub mod relay;
pub mod transport;
