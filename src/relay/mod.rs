//! Relay server: accepts clients on each configured transport and bridges
//! authenticated ones to the IRC server they ask for.

mod connection;

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{error, info, warn, Instrument};

use crate::config::RelayConfig;
use crate::link::{Link, LinkError, TransportKind};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error("websocket handshake failed: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("relay password is not configured")]
    MissingPassword,
    #[error("no listener configured")]
    NoListener,
}

/// Immutable settings shared by every connection task.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub password: Arc<str>,
    pub handshake_timeout: Duration,
    pub bridge_depth: usize,
    pub version: String,
}

impl RelaySettings {
    pub fn from_config(config: &RelayConfig) -> Result<Self, RelayError> {
        let password = config
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or(RelayError::MissingPassword)?;
        Ok(Self {
            password: Arc::from(password),
            handshake_timeout: config.handshake_timeout(),
            bridge_depth: config.bridge_depth.max(1),
            version: config.version.clone(),
        })
    }
}

pub struct RelayServer {
    listeners: Vec<(TransportKind, TcpListener)>,
    settings: Arc<RelaySettings>,
}

impl RelayServer {
    pub async fn bind(config: &RelayConfig) -> Result<Self, RelayError> {
        let settings = Arc::new(RelaySettings::from_config(config)?);
        let mut listeners = Vec::new();
        for (kind, addr) in config.listen.addrs() {
            let listener = TcpListener::bind(addr).await?;
            info!(%kind, address = %listener.local_addr()?, "listener bound");
            listeners.push((kind, listener));
        }
        if listeners.is_empty() {
            return Err(RelayError::NoListener);
        }
        Ok(Self {
            listeners,
            settings,
        })
    }

    /// Actual bound address for `kind`, useful when binding port 0.
    pub fn local_addr(&self, kind: TransportKind) -> Option<SocketAddr> {
        self.listeners
            .iter()
            .find(|(k, _)| *k == kind)
            .and_then(|(_, listener)| listener.local_addr().ok())
    }

    /// Accept connections on every listener until one of them fails.
    pub async fn run(self) -> Result<(), RelayError> {
        let ids = Arc::new(AtomicU64::new(1));
        let mut accept_loops = JoinSet::new();
        for (kind, listener) in self.listeners {
            let settings = Arc::clone(&self.settings);
            let ids = Arc::clone(&ids);
            accept_loops.spawn(accept_loop(kind, listener, settings, ids));
        }
        while let Some(result) = accept_loops.join_next().await {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(e),
                Err(e) => error!(error = %e, "accept loop panicked"),
            }
        }
        Ok(())
    }
}

async fn accept_loop(
    kind: TransportKind,
    listener: TcpListener,
    settings: Arc<RelaySettings>,
    ids: Arc<AtomicU64>,
) -> Result<(), RelayError> {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(%kind, error = %e, "failed to accept connection");
                continue;
            }
        };
        let id = ids.fetch_add(1, Ordering::Relaxed);
        let settings = Arc::clone(&settings);
        let span = tracing::info_span!("conn", id, %peer, %kind);
        tokio::spawn(
            async move {
                info!("connection accepted");
                let result = match open_link(kind, stream).await {
                    Ok(link) => connection::serve(link, settings).await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(()) => info!("connection closed"),
                    Err(e) => warn!(error = %e, "connection ended with an error"),
                }
            }
            .instrument(span),
        );
    }
}

async fn open_link(kind: TransportKind, stream: TcpStream) -> Result<Link, RelayError> {
    stream.set_nodelay(true)?;
    Ok(match kind {
        TransportKind::WebSocket => Link::websocket(tokio_tungstenite::accept_async(stream).await?),
        TransportKind::Framed => Link::framed(stream),
        TransportKind::Tcp => Link::raw(stream),
    })
}
