use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::{lookup_host, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

use crate::link::{Link, TransportKind};
use crate::proxy::{ClientHandshake, HandshakeAction};
use crate::transport::{DisconnectReason, Transport, TransportError, TransportEvent};

/// Where the relay listens and how to authenticate to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    pub kind: TransportKind,
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

/// Open a link to the relay using the endpoint's transport kind.
pub async fn dial(kind: TransportKind, host: &str, port: u16) -> Result<Link, TransportError> {
    match kind {
        TransportKind::WebSocket => {
            let url = format!("ws://{}:{}/", host, port);
            debug!(%url, "opening websocket");
            let (ws, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
            Ok(Link::websocket(ws))
        }
        TransportKind::Framed => Ok(Link::framed(connect_tcp(host, port).await?)),
        TransportKind::Tcp => Ok(Link::raw(connect_tcp(host, port).await?)),
    }
}

/// Resolve `host` and try each address in turn.
async fn connect_tcp(host: &str, port: u16) -> Result<TcpStream, TransportError> {
    let mut last_err = None;
    for addr in lookup_host((host, port)).await? {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(e) => {
                debug!(%addr, error = %e, "connect attempt failed");
                last_err = Some(e);
            }
        }
    }
    match last_err {
        Some(e) => Err(e.into()),
        None => Err(TransportError::Resolve(format!("{}:{}", host, port))),
    }
}

/// One bridged connection at a time to an IRC server, through the relay.
#[derive(Debug)]
pub struct ProxyTransport {
    endpoint: ProxyEndpoint,
    events: mpsc::UnboundedSender<TransportEvent>,
    outbound: Option<mpsc::UnboundedSender<Bytes>>,
    open: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl ProxyTransport {
    pub fn new(endpoint: ProxyEndpoint, events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self {
            endpoint,
            events,
            outbound: None,
            open: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    pub fn endpoint(&self) -> &ProxyEndpoint {
        &self.endpoint
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Stop the link task without reporting anything. Returns whether a live
    /// link was cut.
    fn teardown(&mut self) -> bool {
        self.outbound = None;
        self.open.store(false, Ordering::Release);
        match self.task.take() {
            Some(task) => {
                let live = !task.is_finished();
                task.abort();
                live
            }
            None => false,
        }
    }
}

impl Transport for ProxyTransport {
    fn connect(&mut self, host: &str, port: u16) {
        self.teardown();
        // Each link gets its own flag so a stale task can never mark a new one open.
        self.open = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::unbounded_channel();
        self.outbound = Some(tx);

        let handshake = ClientHandshake::new(host, port, self.endpoint.password.clone());
        let span = tracing::info_span!(
            "proxy",
            relay = %format!("{}:{}", self.endpoint.host, self.endpoint.port),
            kind = %self.endpoint.kind,
        );
        self.task = Some(tokio::spawn(
            run_link(
                self.endpoint.clone(),
                handshake,
                rx,
                self.events.clone(),
                self.open.clone(),
            )
            .instrument(span),
        ));
    }

    fn disconnect(&mut self) {
        if self.teardown() {
            info!("disconnected by operator");
            let _ = self
                .events
                .send(TransportEvent::Disconnected(DisconnectReason::Operator));
        }
    }

    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotConnected);
        }
        let outbound = self.outbound.as_ref().ok_or(TransportError::NotConnected)?;
        outbound
            .send(Bytes::copy_from_slice(text.as_bytes()))
            .map_err(|_| TransportError::NotConnected)
    }
}

impl Drop for ProxyTransport {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn run_link(
    endpoint: ProxyEndpoint,
    mut handshake: ClientHandshake,
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
    events: mpsc::UnboundedSender<TransportEvent>,
    open: Arc<AtomicBool>,
) {
    let reason = match drive_link(&endpoint, &mut handshake, &mut outbound, &events, &open).await {
        Ok(reason) => reason,
        Err(e) => {
            warn!(error = %e, "proxy link failed");
            DisconnectReason::Closed(e.to_string())
        }
    };
    open.store(false, Ordering::Release);
    handshake.on_link_closed();
    info!(%reason, "proxy link closed");
    let _ = events.send(TransportEvent::Disconnected(reason));
}

async fn drive_link(
    endpoint: &ProxyEndpoint,
    handshake: &mut ClientHandshake,
    outbound: &mut mpsc::UnboundedReceiver<Bytes>,
    events: &mpsc::UnboundedSender<TransportEvent>,
    open: &AtomicBool,
) -> Result<DisconnectReason, TransportError> {
    let mut link = dial(endpoint.kind, &endpoint.host, endpoint.port).await?;
    handshake.on_link_open();

    loop {
        tokio::select! {
            chunk = link.recv() => {
                let Some(chunk) = chunk else {
                    return Ok(DisconnectReason::Closed("relay closed the connection".into()));
                };
                for action in handshake.on_chunk(&chunk?) {
                    match action {
                        HandshakeAction::Send(line) => link.send(Bytes::from(line)).await?,
                        HandshakeAction::Opened => {
                            open.store(true, Ordering::Release);
                            let _ = events.send(TransportEvent::Connected);
                        }
                        HandshakeAction::Deliver(data) => {
                            let _ = events.send(TransportEvent::Received(Bytes::from(data)));
                        }
                        HandshakeAction::Rejected(reason) => {
                            return Ok(DisconnectReason::from_rejection(reason));
                        }
                        HandshakeAction::Violation(line) => {
                            return Ok(DisconnectReason::Protocol(format!(
                                "unexpected relay line: {}",
                                line
                            )));
                        }
                    }
                }
            }
            Some(data) = outbound.recv(), if handshake.is_open() => {
                link.send(data).await?;
            }
        }
    }
}
