//! Reconnect policy of the supervisor, against a scripted transport and a
//! paused clock.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use ircbridge::transport::{
    DisconnectReason, Supervisor, Transport, TransportError, TransportEvent,
};

const DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Connect(String, u16),
    Disconnect,
}

/// Records calls; events are injected by the test through `events`.
struct FakeTransport {
    calls: Arc<Mutex<Vec<Call>>>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl Transport for FakeTransport {
    fn connect(&mut self, host: &str, port: u16) {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Connect(host.to_string(), port));
    }

    fn disconnect(&mut self) {
        self.calls.lock().unwrap().push(Call::Disconnect);
        let _ = self
            .events
            .send(TransportEvent::Disconnected(DisconnectReason::Operator));
    }

    fn send(&mut self, _text: &str) -> Result<(), TransportError> {
        Ok(())
    }
}

struct Harness {
    supervisor: Supervisor<FakeTransport>,
    calls: Arc<Mutex<Vec<Call>>>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

fn harness() -> Harness {
    let (tx, rx) = mpsc::unbounded_channel();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let transport = FakeTransport {
        calls: calls.clone(),
        events: tx.clone(),
    };
    Harness {
        supervisor: Supervisor::new(transport, rx, DELAY),
        calls,
        events: tx,
    }
}

impl Harness {
    fn connects(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, Call::Connect(..)))
            .count()
    }

    /// Poll the supervisor for `span` of virtual time, collecting events.
    async fn run_for(&mut self, span: Duration) -> Vec<TransportEvent> {
        let mut seen = Vec::new();
        let deadline = tokio::time::Instant::now() + span;
        loop {
            let left = deadline.saturating_duration_since(tokio::time::Instant::now());
            let Ok(Some(event)) = timeout(left, self.supervisor.next_event()).await else {
                break;
            };
            seen.push(event);
        }
        seen
    }
}

fn closed() -> TransportEvent {
    TransportEvent::Disconnected(DisconnectReason::Closed("eof".into()))
}

#[tokio::test(start_paused = true)]
async fn unexpected_disconnect_reconnects_once_after_delay() {
    let mut h = harness();
    h.supervisor.connect("irc.example.org", 6667);
    h.events.send(TransportEvent::Connected).unwrap();
    h.events.send(closed()).unwrap();

    assert_eq!(h.supervisor.next_event().await, Some(TransportEvent::Connected));
    assert_eq!(h.supervisor.next_event().await, Some(closed()));
    assert!(h.supervisor.reconnect_pending());
    assert_eq!(h.connects(), 1);

    // Not yet.
    h.run_for(DELAY - Duration::from_millis(10)).await;
    assert_eq!(h.connects(), 1);

    h.run_for(Duration::from_secs(60)).await;
    assert_eq!(h.connects(), 2);
    assert_eq!(
        h.calls.lock().unwrap()[1],
        Call::Connect("irc.example.org".into(), 6667)
    );
    assert!(!h.supervisor.reconnect_pending());
}

#[tokio::test(start_paused = true)]
async fn operator_disconnect_suppresses_pending_retry() {
    let mut h = harness();
    h.supervisor.connect("irc.example.org", 6667);
    h.events.send(closed()).unwrap();
    assert_eq!(h.supervisor.next_event().await, Some(closed()));
    assert!(h.supervisor.reconnect_pending());

    h.supervisor.disconnect();
    let events = h.run_for(Duration::from_secs(60)).await;
    assert_eq!(
        events,
        vec![TransportEvent::Disconnected(DisconnectReason::Operator)]
    );
    assert_eq!(h.connects(), 1);
}

#[tokio::test(start_paused = true)]
async fn auth_failure_is_not_retried() {
    let mut h = harness();
    h.supervisor.connect("irc.example.org", 6667);
    let rejected =
        TransportEvent::Disconnected(DisconnectReason::from_rejection("digest mismatch".into()));
    h.events.send(rejected.clone()).unwrap();
    assert_eq!(h.supervisor.next_event().await, Some(rejected));
    h.run_for(Duration::from_secs(60)).await;
    assert_eq!(h.connects(), 1);
}

#[tokio::test(start_paused = true)]
async fn repeated_drops_keep_retrying() {
    let mut h = harness();
    h.supervisor.connect("irc.example.org", 6667);
    for round in 1..=3 {
        h.events.send(closed()).unwrap();
        assert_eq!(h.supervisor.next_event().await, Some(closed()));
        h.run_for(DELAY + Duration::from_secs(1)).await;
        assert_eq!(h.connects(), round + 1);
    }
}
