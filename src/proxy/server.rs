//! Relay side of the handshake.
//!
//! ```text
//! S->C: HELLO ij v<version> (<nonce>)
//! C->S: DIGEST <md5(nonce:password)>
//! C->S: CONNECT <host> <port>
//! S->C: CONNECTED to <host>:<port>  |  DISCONNECTED <reason>
//!       [raw byte bridge]
//! S->C: DISCONNECTED <reason>
//! ```
//!
//! [`ConnectionWork`] holds everything one client connection needs and is
//! owned by that connection's task alone. It performs no I/O; the relay
//! executes the [`RelayAction`]s it returns.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::irc::framer::LineFramer;
use crate::proxy::digest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Waiting for DIGEST and CONNECT.
    Idle,
    /// Dialing the upstream server.
    Connecting,
    /// Bytes flow both ways untouched.
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayAction {
    /// Send a control line to the client.
    Reply(String),
    /// Open the upstream TCP connection.
    Dial { host: String, port: u16 },
    /// Write client bytes to the upstream socket.
    Forward(Vec<u8>),
    /// Close the client connection and drop the upstream socket.
    Close,
}

#[derive(Debug)]
pub struct ConnectionWork {
    state: RelayState,
    framer: LineFramer,
    nonce: String,
    verified_digest: Option<String>,
    password: Arc<str>,
    /// Client bytes received after CONNECT, held until the bridge is up.
    pending: Vec<u8>,
    upstream: Option<(String, u16)>,
}

impl ConnectionWork {
    pub fn new(password: Arc<str>, nonce: String) -> Self {
        Self {
            state: RelayState::Idle,
            framer: LineFramer::new(),
            nonce,
            verified_digest: None,
            password,
            pending: Vec::new(),
            upstream: None,
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    pub fn is_bridged(&self) -> bool {
        self.state == RelayState::Connected
    }

    pub fn is_closed(&self) -> bool {
        self.state == RelayState::Disconnected
    }

    pub fn greeting(&self, version: &str) -> String {
        format!("HELLO ij v{} ({})\n", version, self.nonce)
    }

    pub fn on_client_chunk(&mut self, chunk: &[u8]) -> Vec<RelayAction> {
        match self.state {
            RelayState::Idle => self.on_handshake_chunk(chunk),
            RelayState::Connecting => {
                self.pending.extend_from_slice(chunk);
                Vec::new()
            }
            RelayState::Connected => vec![RelayAction::Forward(chunk.to_vec())],
            RelayState::Disconnected => Vec::new(),
        }
    }

    fn on_handshake_chunk(&mut self, chunk: &[u8]) -> Vec<RelayAction> {
        let mut actions = Vec::new();
        self.framer.push(chunk);
        while self.state == RelayState::Idle {
            let Some(line) = self.framer.next_line() else {
                break;
            };
            self.handle_line(&line, &mut actions);
        }
        if self.state == RelayState::Connecting {
            // Whatever followed CONNECT belongs to the upstream, byte for byte.
            let rest = self.framer.take_remainder();
            self.pending.extend(rest);
        }
        actions
    }

    fn handle_line(&mut self, line: &str, actions: &mut Vec<RelayAction>) {
        let mut args = line.split(' ');
        match args.next().unwrap_or("") {
            "DIGEST" => {
                let candidate = args.next().unwrap_or("");
                if digest::verify(&self.nonce, &self.password, candidate) {
                    debug!("client digest accepted");
                    self.verified_digest = Some(candidate.to_string());
                } else {
                    warn!(%candidate, "client digest mismatch");
                    self.reject("digest mismatch", actions);
                }
            }
            "CONNECT" => {
                if self.verified_digest.is_none() {
                    warn!("CONNECT without a verified digest");
                    self.reject("digest required", actions);
                    return;
                }
                let host = args.next().unwrap_or("");
                let port = args.next().and_then(|p| p.parse::<u16>().ok());
                match port {
                    Some(port) if !host.is_empty() => {
                        info!(%host, port, "client proxy connecting");
                        self.state = RelayState::Connecting;
                        self.upstream = Some((host.to_string(), port));
                        actions.push(RelayAction::Dial {
                            host: host.to_string(),
                            port,
                        });
                    }
                    _ => {
                        warn!(%line, "malformed CONNECT request");
                        self.reject("invalid connect request", actions);
                    }
                }
            }
            _ => debug!(%line, "ignoring handshake line"),
        }
    }

    fn reject(&mut self, reason: &str, actions: &mut Vec<RelayAction>) {
        self.state = RelayState::Disconnected;
        actions.push(RelayAction::Reply(format!("DISCONNECTED {}\n", reason)));
        actions.push(RelayAction::Close);
    }

    fn upstream_label(&self) -> String {
        match &self.upstream {
            Some((host, port)) => format!("{}:{}", host, port),
            None => "upstream".to_string(),
        }
    }

    pub fn on_upstream_connected(&mut self) -> Vec<RelayAction> {
        if self.state != RelayState::Connecting {
            return Vec::new();
        }
        self.state = RelayState::Connected;
        info!(upstream = %self.upstream_label(), "client proxy connected");
        let mut actions = vec![RelayAction::Reply(format!(
            "CONNECTED to {}\n",
            self.upstream_label()
        ))];
        if !self.pending.is_empty() {
            actions.push(RelayAction::Forward(std::mem::take(&mut self.pending)));
        }
        actions
    }

    /// The upstream server closed its side.
    pub fn on_upstream_eof(&mut self) -> Vec<RelayAction> {
        let reason = format!("from {}", self.upstream_label());
        self.close_with(&reason)
    }

    /// Dialing or talking to the upstream server failed.
    pub fn on_upstream_error(&mut self, error: &dyn fmt::Display) -> Vec<RelayAction> {
        warn!(upstream = %self.upstream_label(), %error, "client proxy connection failed");
        let reason = format!("from {} for an error", self.upstream_label());
        self.close_with(&reason)
    }

    /// Handshake did not reach the bridged state in time.
    pub fn on_handshake_timeout(&mut self) -> Vec<RelayAction> {
        match self.state {
            RelayState::Idle | RelayState::Connecting => self.close_with("handshake timeout"),
            RelayState::Connected | RelayState::Disconnected => Vec::new(),
        }
    }

    fn close_with(&mut self, reason: &str) -> Vec<RelayAction> {
        if self.state == RelayState::Disconnected {
            return Vec::new();
        }
        let mut actions = Vec::new();
        self.reject(reason, &mut actions);
        actions
    }
}
