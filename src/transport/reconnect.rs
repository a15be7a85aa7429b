//! Fixed-delay reconnect on top of any [`Transport`].

use std::future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Sleep;
use tracing::{debug, info};

use crate::transport::{Transport, TransportError, TransportEvent};

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Owns a transport and its event stream, and reconnects after unexpected
/// disconnects.
///
/// The retry timer only runs while [`Supervisor::next_event`] is being
/// polled, so a disconnect by the operator simply discards it.
pub struct Supervisor<T> {
    transport: T,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    delay: Duration,
    target: Option<(String, u16)>,
    operator_closed: bool,
    retry: Option<Pin<Box<Sleep>>>,
}

impl<T: Transport> Supervisor<T> {
    pub fn new(
        transport: T,
        events: mpsc::UnboundedReceiver<TransportEvent>,
        delay: Duration,
    ) -> Self {
        Self {
            transport,
            events,
            delay,
            target: None,
            operator_closed: false,
            retry: None,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn reconnect_pending(&self) -> bool {
        self.retry.is_some()
    }

    pub fn connect(&mut self, host: &str, port: u16) {
        self.target = Some((host.to_string(), port));
        self.operator_closed = false;
        self.retry = None;
        self.transport.connect(host, port);
    }

    pub fn disconnect(&mut self) {
        self.operator_closed = true;
        if self.retry.take().is_some() {
            debug!("pending reconnect cancelled");
        }
        self.transport.disconnect();
    }

    pub fn send(&mut self, text: &str) -> Result<(), TransportError> {
        self.transport.send(text)
    }

    /// Next transport event. Reconnects happen in here, between events.
    /// `None` once the transport's event channel is gone.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        loop {
            tokio::select! {
                event = self.events.recv() => {
                    let event = event?;
                    if let TransportEvent::Disconnected(reason) = &event {
                        if reason.should_retry() && !self.operator_closed && self.target.is_some() {
                            info!(delay = ?self.delay, %reason, "reconnect scheduled");
                            self.retry = Some(Box::pin(tokio::time::sleep(self.delay)));
                        }
                    }
                    return Some(event);
                }
                () = retry_due(&mut self.retry) => {
                    self.retry = None;
                    if self.operator_closed {
                        continue;
                    }
                    if let Some((host, port)) = self.target.clone() {
                        info!(%host, port, "reconnecting");
                        self.transport.connect(&host, port);
                    }
                }
            }
        }
    }
}

async fn retry_due(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry {
        Some(sleep) => sleep.as_mut().await,
        None => future::pending().await,
    }
}
