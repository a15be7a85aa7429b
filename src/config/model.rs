//! Configuration data model.
//!
//! All structs derive `Serialize`/`Deserialize` for TOML persistence.
//! Every field has a default so both programs start without a file, except
//! that the relay refuses to run without a password.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use super::nickname::generate_nickname;
use crate::irc::SessionConfig;
use crate::link::TransportKind;
use crate::transport::ProxyEndpoint;

/// Root configuration of the chat client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ClientConfig {
    pub fn session_config(&self) -> SessionConfig {
        let server = &self.server;
        let mut session = SessionConfig::new(&server.nickname, &server.host);
        if let Some(username) = &server.username {
            session.username = username.clone();
        }
        if let Some(realname) = &server.realname {
            session.realname = realname.clone();
        }
        session.server_password = server.password.clone().filter(|p| !p.is_empty());
        session.keywords = self.notify.keywords.clone();
        session.auto_join = server.channels.clone();
        session
    }
}

/// How to reach the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_proxy_host")]
    pub host: String,
    #[serde(default = "default_proxy_port")]
    pub port: u16,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub transport: TransportKind,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: default_proxy_host(),
            port: default_proxy_port(),
            password: None,
            transport: TransportKind::default(),
            reconnect_delay_secs: default_reconnect_delay(),
        }
    }
}

impl ProxyConfig {
    pub fn endpoint(&self) -> ProxyEndpoint {
        ProxyEndpoint {
            kind: self.transport,
            host: self.host.clone(),
            port: self.port,
            password: self.password.clone(),
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

/// The IRC server the relay bridges to, and who we are there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_nickname")]
    pub nickname: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub realname: Option<String>,
    /// Joined after every successful registration.
    #[serde(default)]
    pub channels: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            password: None,
            nickname: default_nickname(),
            username: None,
            realname: None,
            channels: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Case-sensitive substrings that trigger a highlight.
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            timestamp_format: default_timestamp_format(),
        }
    }
}

/// Chat transcripts and diagnostic verbosity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_true")]
    pub log_channels: bool,
    #[serde(default)]
    pub log_queries: bool,
    /// Used when `RUST_LOG` is not set.
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_dir: default_log_dir(),
            log_channels: true,
            log_queries: false,
            level: default_level(),
        }
    }
}

/// Root configuration of the relay server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,
    /// Upstream chunks buffered per connection before the reader waits.
    #[serde(default = "default_bridge_depth")]
    pub bridge_depth: usize,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_level")]
    pub log_level: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            password: None,
            listen: ListenConfig::default(),
            handshake_timeout_secs: default_handshake_timeout(),
            bridge_depth: default_bridge_depth(),
            version: default_version(),
            log_level: default_level(),
        }
    }
}

/// One optional listener per transport kind. Without a `[listen]` table
/// only the WebSocket listener on port 3000 runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    #[serde(default)]
    pub websocket: Option<SocketAddr>,
    #[serde(default)]
    pub framed: Option<SocketAddr>,
    #[serde(default)]
    pub tcp: Option<SocketAddr>,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            websocket: default_websocket_addr(),
            framed: None,
            tcp: None,
        }
    }
}

impl ListenConfig {
    pub fn addrs(&self) -> impl Iterator<Item = (TransportKind, SocketAddr)> + '_ {
        [
            (TransportKind::WebSocket, self.websocket),
            (TransportKind::Framed, self.framed),
            (TransportKind::Tcp, self.tcp),
        ]
        .into_iter()
        .filter_map(|(kind, addr)| addr.map(|addr| (kind, addr)))
    }
}

impl RelayConfig {
    /// `PASSWORD` replaces the configured password; `PORT` moves the
    /// WebSocket listener.
    pub fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(password) = var("PASSWORD") {
            self.password = Some(password);
        }
        if let Some(port) = var("PORT") {
            let port: u16 = port
                .trim()
                .parse()
                .with_context(|| format!("PORT is not a valid port number: {}", port))?;
            let mut addr = self
                .listen
                .websocket
                .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], port)));
            addr.set_port(port);
            self.listen.websocket = Some(addr);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.password.as_deref().map_or(true, str::is_empty) {
            bail!("a relay password is required (set PASSWORD or `password` in relay.toml)");
        }
        if self.listen.addrs().next().is_none() {
            bail!("no listener configured");
        }
        if self.bridge_depth == 0 {
            bail!("bridge_depth must be at least 1");
        }
        Ok(())
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

fn default_proxy_host() -> String {
    "localhost".to_string()
}

fn default_proxy_port() -> u16 {
    3000
}

fn default_reconnect_delay() -> u64 {
    5
}

fn default_server_host() -> String {
    "irc.libera.chat".to_string()
}

fn default_server_port() -> u16 {
    6667
}

fn default_nickname() -> String {
    generate_nickname()
}

fn default_true() -> bool {
    true
}

fn default_timestamp_format() -> String {
    "%H:%M".to_string()
}

fn default_log_dir() -> String {
    "~/.local/share/ircbridge/logs".to_string()
}

fn default_level() -> String {
    "info".to_string()
}

fn default_handshake_timeout() -> u64 {
    30
}

fn default_bridge_depth() -> usize {
    64
}

fn default_version() -> String {
    crate::proxy::PROTOCOL_VERSION.to_string()
}

fn default_websocket_addr() -> Option<SocketAddr> {
    Some(SocketAddr::from(([0, 0, 0, 0], 3000)))
}
