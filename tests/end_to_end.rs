//! Client transport, relay and IRC session wired together over loopback,
//! once per transport kind.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use ircbridge::config::{ListenConfig, RelayConfig};
use ircbridge::irc::{IrcSession, SessionConfig, SessionEvent};
use ircbridge::link::TransportKind;
use ircbridge::relay::RelayServer;
use ircbridge::transport::{
    DisconnectReason, ProxyEndpoint, ProxyTransport, Transport, TransportEvent,
};

const WAIT: Duration = Duration::from_secs(5);

async fn start_relay() -> RelayAddrs {
    let any: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let config = RelayConfig {
        password: Some("secret".into()),
        listen: ListenConfig {
            websocket: Some(any),
            framed: Some(any),
            tcp: Some(any),
        },
        ..RelayConfig::default()
    };
    let server = RelayServer::bind(&config).await.unwrap();
    let addrs = RelayAddrs {
        websocket: server.local_addr(TransportKind::WebSocket).unwrap(),
        framed: server.local_addr(TransportKind::Framed).unwrap(),
        tcp: server.local_addr(TransportKind::Tcp).unwrap(),
    };
    tokio::spawn(server.run());
    addrs
}

struct RelayAddrs {
    websocket: SocketAddr,
    framed: SocketAddr,
    tcp: SocketAddr,
}

impl RelayAddrs {
    fn endpoint(&self, kind: TransportKind, password: &str) -> ProxyEndpoint {
        let addr = match kind {
            TransportKind::WebSocket => self.websocket,
            TransportKind::Framed => self.framed,
            TransportKind::Tcp => self.tcp,
        };
        ProxyEndpoint {
            kind,
            host: addr.ip().to_string(),
            port: addr.port(),
            password: Some(password.to_string()),
        }
    }
}

/// Accepts one client and answers registration with a welcome, a JOIN echo
/// and a PING. Signals when the PONG arrives and returns every line it read
/// once the relay drops the connection.
async fn fake_irc_server() -> (u16, oneshot::Receiver<()>, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (pong_tx, pong_rx) = oneshot::channel();
    let mut pong_tx = Some(pong_tx);
    let task = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut socket = BufReader::new(socket);
        let mut seen = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            if socket.read_line(&mut line).await.unwrap() == 0 {
                break;
            }
            let text = line.trim_end().to_string();
            seen.push(text.clone());
            if text.starts_with("USER ") {
                socket
                    .get_mut()
                    .write_all(
                        b":srv 001 me :Welcome\r\n:me!u@h JOIN #rust\r\n:srv PING :tok\r\n",
                    )
                    .await
                    .unwrap();
            }
            if text.starts_with("PONG") {
                if let Some(tx) = pong_tx.take() {
                    let _ = tx.send(());
                }
            }
        }
        seen
    });
    (port, pong_rx, task)
}

async fn next(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
    timeout(WAIT, rx.recv()).await.unwrap().unwrap()
}

async fn session_round_trip(kind: TransportKind) {
    let relay = start_relay().await;
    let (irc_port, pong, server) = fake_irc_server().await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut transport = ProxyTransport::new(relay.endpoint(kind, "secret"), tx);
    let mut session = IrcSession::new(SessionConfig::new("me", "127.0.0.1"), Vec::new());

    transport.connect("127.0.0.1", irc_port);
    assert_eq!(next(&mut rx).await, TransportEvent::Connected);
    session.on_connected();
    for line in session.drain_outbound() {
        transport.send(&line).unwrap();
    }

    // The JOIN and the PING may arrive split across chunks.
    let mut replies = Vec::new();
    while session.channel("#rust").is_none() || replies.is_empty() {
        match next(&mut rx).await {
            TransportEvent::Received(data) => session.receive(&data),
            other => panic!("unexpected {:?}", other),
        }
        replies.extend(session.drain_outbound());
    }
    assert_eq!(replies, vec!["PONG tok\r\n".to_string()]);
    for line in replies {
        transport.send(&line).unwrap();
    }

    timeout(WAIT, pong).await.unwrap().unwrap();

    assert!(session.observer().contains(&SessionEvent::Join {
        nick: "me".into(),
        channel: "#rust".into(),
    }));

    transport.disconnect();
    assert_eq!(
        next(&mut rx).await,
        TransportEvent::Disconnected(DisconnectReason::Operator)
    );

    // Dropping the client link tears down the upstream side as well.
    let seen = timeout(WAIT, server).await.unwrap().unwrap();
    assert_eq!(seen[0], "NICK me");
    assert!(seen[1].starts_with("USER me localhost 127.0.0.1 :"));
    assert_eq!(seen.last().map(String::as_str), Some("PONG tok"));
}

#[tokio::test]
async fn session_over_raw_tcp() {
    session_round_trip(TransportKind::Tcp).await;
}

#[tokio::test]
async fn session_over_framed_tcp() {
    session_round_trip(TransportKind::Framed).await;
}

#[tokio::test]
async fn session_over_websocket() {
    session_round_trip(TransportKind::WebSocket).await;
}

#[tokio::test]
async fn wrong_password_is_not_retried() {
    let relay = start_relay().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut transport = ProxyTransport::new(relay.endpoint(TransportKind::Tcp, "wrong"), tx);
    transport.connect("127.0.0.1", 6667);
    match next(&mut rx).await {
        TransportEvent::Disconnected(reason) => {
            assert_eq!(reason, DisconnectReason::AuthFailed("digest mismatch".into()));
            assert!(!reason.should_retry());
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn send_before_open_fails() {
    let relay = start_relay().await;
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut transport = ProxyTransport::new(relay.endpoint(TransportKind::Tcp, "secret"), tx);
    assert!(transport.send("NICK me\r\n").is_err());
}
