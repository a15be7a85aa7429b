//! Client side of the relay handshake.
//!
//! ```text
//! Opening --link up--> Handshake --HELLO--> Connecting --CONNECTED--> Open
//! any state --DISCONNECTED, unknown line, link lost--> Disconnected
//! ```
//!
//! [`ClientHandshake`] is pure: the transport feeds it received chunks and
//! carries out the returned [`HandshakeAction`]s.

use tracing::{debug, info, warn};

use crate::irc::framer::LineFramer;
use crate::proxy::digest::digest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Opening,
    Handshake,
    Connecting,
    Open,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeAction {
    /// Write this line (terminator included) to the relay.
    Send(String),
    /// The relay bridged us to the upstream server.
    Opened,
    /// Application data for the caller.
    Deliver(Vec<u8>),
    /// The relay refused with `DISCONNECTED <reason>`.
    Rejected(String),
    /// The relay sent something the handshake does not understand.
    Violation(String),
}

#[derive(Debug)]
pub struct ClientHandshake {
    state: ClientState,
    target_host: String,
    target_port: u16,
    password: Option<String>,
    framer: LineFramer,
}

impl ClientHandshake {
    pub fn new(target_host: impl Into<String>, target_port: u16, password: Option<String>) -> Self {
        Self {
            state: ClientState::Opening,
            target_host: target_host.into(),
            target_port,
            password: password.filter(|p| !p.is_empty()),
            framer: LineFramer::new(),
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ClientState::Open
    }

    /// The underlying link to the relay is up.
    pub fn on_link_open(&mut self) {
        if self.state == ClientState::Opening {
            info!("proxy connection established");
            self.state = ClientState::Handshake;
        }
    }

    pub fn on_link_closed(&mut self) {
        self.state = ClientState::Disconnected;
        self.framer.clear();
    }

    pub fn on_chunk(&mut self, chunk: &[u8]) -> Vec<HandshakeAction> {
        match self.state {
            ClientState::Open => return vec![HandshakeAction::Deliver(chunk.to_vec())],
            ClientState::Disconnected | ClientState::Opening => return Vec::new(),
            ClientState::Handshake | ClientState::Connecting => {}
        }

        let mut actions = Vec::new();
        self.framer.push(chunk);
        while matches!(self.state, ClientState::Handshake | ClientState::Connecting) {
            let Some(line) = self.framer.next_line() else {
                break;
            };
            self.handle_line(&line, &mut actions);
        }

        if self.state == ClientState::Open {
            // Upstream data that arrived in the same chunk as CONNECTED.
            let rest = self.framer.take_remainder();
            if !rest.is_empty() {
                actions.push(HandshakeAction::Deliver(rest));
            }
        }
        actions
    }

    fn handle_line(&mut self, line: &str, actions: &mut Vec<HandshakeAction>) {
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        match (self.state, command) {
            (ClientState::Handshake, "HELLO") => {
                info!(greeting = %line, "proxy greeting");
                let Some(nonce) = extract_nonce(line) else {
                    warn!(greeting = %line, "proxy greeting without a nonce");
                    self.state = ClientState::Disconnected;
                    actions.push(HandshakeAction::Violation(line.to_string()));
                    return;
                };
                if let Some(password) = &self.password {
                    let proof = digest(nonce, password);
                    debug!(%proof, "proxy digest");
                    actions.push(HandshakeAction::Send(format!("DIGEST {}\n", proof)));
                }
                info!(host = %self.target_host, port = self.target_port, "proxy connecting");
                actions.push(HandshakeAction::Send(format!(
                    "CONNECT {} {}\n",
                    self.target_host, self.target_port
                )));
                self.state = ClientState::Connecting;
            }
            (ClientState::Handshake | ClientState::Connecting, "DISCONNECTED") => {
                info!(reason = %rest, "proxy rejected connection");
                self.state = ClientState::Disconnected;
                actions.push(HandshakeAction::Rejected(rest.to_string()));
            }
            (ClientState::Connecting, "CONNECTED") => {
                info!(host = %self.target_host, port = self.target_port, "proxy connected");
                self.state = ClientState::Open;
                actions.push(HandshakeAction::Opened);
            }
            _ => {
                warn!(%line, "unknown proxy response");
                self.state = ClientState::Disconnected;
                actions.push(HandshakeAction::Violation(line.to_string()));
            }
        }
    }
}

/// Text between the first `(` and the following `)`.
fn extract_nonce(greeting: &str) -> Option<&str> {
    let start = greeting.find('(')? + 1;
    let len = greeting[start..].find(')')?;
    let nonce = &greeting[start..start + len];
    (!nonce.is_empty()).then_some(nonce)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opened(password: Option<&str>) -> ClientHandshake {
        let mut hs = ClientHandshake::new("irc.example.org", 6667, password.map(str::to_string));
        hs.on_link_open();
        hs
    }

    #[test]
    fn test_hello_with_password() {
        let mut hs = opened(Some("secret"));
        let actions = hs.on_chunk(b"HELLO ij v0.9.4 (n0nce)\n");
        assert_eq!(
            actions,
            vec![
                HandshakeAction::Send(format!("DIGEST {}\n", digest("n0nce", "secret"))),
                HandshakeAction::Send("CONNECT irc.example.org 6667\n".into()),
            ]
        );
        assert_eq!(hs.state(), ClientState::Connecting);
    }

    #[test]
    fn test_hello_without_password_skips_digest() {
        let mut hs = opened(None);
        let actions = hs.on_chunk(b"HELLO ij v0.9.4 (n0nce)\r\n");
        assert_eq!(
            actions,
            vec![HandshakeAction::Send("CONNECT irc.example.org 6667\n".into())]
        );
    }

    #[test]
    fn test_connected_opens_and_forwards_rest() {
        let mut hs = opened(None);
        hs.on_chunk(b"HELLO ij v0.9.4 (n)\n");
        let actions = hs.on_chunk(b"CONNECTED to irc.example.org:6667\n:srv NOTICE * :hi\n:srv 00");
        assert_eq!(
            actions,
            vec![
                HandshakeAction::Opened,
                HandshakeAction::Deliver(b":srv NOTICE * :hi\n:srv 00".to_vec()),
            ]
        );
        assert!(hs.is_open());
        assert_eq!(
            hs.on_chunk(b"1 me :Welcome\r\n"),
            vec![HandshakeAction::Deliver(b"1 me :Welcome\r\n".to_vec())]
        );
    }

    #[test]
    fn test_data_after_connected_is_delivered_verbatim() {
        let mut hs = opened(None);
        hs.on_chunk(b"HELLO ij v0.9.4 (n)\n");
        let actions = hs.on_chunk(b"CONNECTED to h:1\r\n:srv NOTICE * :a\r\n\xff\r\n");
        assert_eq!(
            actions,
            vec![
                HandshakeAction::Opened,
                HandshakeAction::Deliver(b":srv NOTICE * :a\r\n\xff\r\n".to_vec()),
            ]
        );
    }

    #[test]
    fn test_fragmented_handshake() {
        let mut hs = opened(None);
        assert!(hs.on_chunk(b"HEL").is_empty());
        assert_eq!(hs.on_chunk(b"LO ij v1 (x)\nCONN").len(), 1);
        assert_eq!(hs.on_chunk(b"ECTED to h:1\n"), vec![HandshakeAction::Opened]);
    }

    #[test]
    fn test_rejection() {
        let mut hs = opened(Some("bad"));
        hs.on_chunk(b"HELLO ij v0.9.4 (n)\n");
        assert_eq!(
            hs.on_chunk(b"DISCONNECTED digest mismatch\n"),
            vec![HandshakeAction::Rejected("digest mismatch".into())]
        );
        assert_eq!(hs.state(), ClientState::Disconnected);
        assert!(hs.on_chunk(b"anything\n").is_empty());
    }

    #[test]
    fn test_unknown_line_is_fatal() {
        let mut hs = opened(None);
        assert_eq!(
            hs.on_chunk(b"WHAT\n"),
            vec![HandshakeAction::Violation("WHAT".into())]
        );
        assert_eq!(hs.state(), ClientState::Disconnected);
    }

    #[test]
    fn test_hello_without_nonce_is_fatal() {
        let mut hs = opened(None);
        assert_eq!(
            hs.on_chunk(b"HELLO ij v0.9.4\n"),
            vec![HandshakeAction::Violation("HELLO ij v0.9.4".into())]
        );
    }

    #[test]
    fn test_data_before_link_open_ignored() {
        let mut hs = ClientHandshake::new("h", 1, None);
        assert!(hs.on_chunk(b"HELLO ij v1 (x)\n").is_empty());
        assert_eq!(hs.state(), ClientState::Opening);
    }

    #[test]
    fn test_extract_nonce() {
        assert_eq!(extract_nonce("HELLO ij v0.9.4 (abc+/=)"), Some("abc+/="));
        assert_eq!(extract_nonce("HELLO ()"), None);
        assert_eq!(extract_nonce("HELLO (open"), None);
    }
}
