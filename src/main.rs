use std::io::{self, Stdout};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{info, warn};

use ircbridge::app::action::Action;
use ircbridge::app::console::ConsoleView;
use ircbridge::app::event::{self, AppEvent};
use ircbridge::app::handler;
use ircbridge::app::state::ViewState;
use ircbridge::config::{self, ClientConfig};
use ircbridge::irc::IrcSession;
use ircbridge::logging::{self, ChatLogger};
use ircbridge::transport::{ProxyTransport, Supervisor, TransportEvent};

/// How long to wait for the server to close the link after QUIT.
const QUIT_GRACE: Duration = Duration::from_secs(2);

type Session = IrcSession<ConsoleView<Stdout>>;

#[tokio::main]
async fn main() -> Result<()> {
    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let cfg = config::load_client_config(path.as_deref())?;
    logging::init_tracing(&cfg.logging.level);

    // Persist the generated nickname so it stays the same across runs.
    let default_path = config::client_config_path();
    if path.is_none() && !default_path.exists() {
        if let Err(e) = config::save_config(&cfg, &default_path) {
            warn!(error = %e, "could not write default config");
        }
    }

    run(cfg).await
}

async fn run(cfg: ClientConfig) -> Result<()> {
    let (transport_tx, transport_rx) = mpsc::unbounded_channel();
    let transport = ProxyTransport::new(cfg.proxy.endpoint(), transport_tx);
    let mut supervisor = Supervisor::new(transport, transport_rx, cfg.proxy.reconnect_delay());

    let session_config = cfg.session_config();
    let view = ConsoleView::new(
        ViewState::new(&session_config.nick, &cfg.ui.timestamp_format),
        io::stdout(),
        ChatLogger::new(&cfg.logging),
    );
    let mut session = IrcSession::new(session_config, view);

    let (input_tx, mut input_rx) = mpsc::unbounded_channel();
    event::spawn_input_reader(input_tx);

    let (host, port) = (cfg.server.host.clone(), cfg.server.port);
    session.observer_mut().status(&format!(
        "connecting to {}:{} via {}:{} ({})",
        host, port, cfg.proxy.host, cfg.proxy.port, cfg.proxy.transport
    ));
    supervisor.connect(&host, port);

    loop {
        tokio::select! {
            event = supervisor.next_event() => {
                let Some(event) = event else { break };
                handler::handle_transport_event(&mut session, event);
            }
            input = input_rx.recv() => {
                let line = match input {
                    Some(AppEvent::Input(line)) => line,
                    Some(AppEvent::InputClosed) | None => {
                        session.quit(None);
                        flush_outbound(&mut session, &mut supervisor);
                        shutdown(&mut session, &mut supervisor).await;
                        break;
                    }
                };
                match handler::handle_input(&line, &mut session) {
                    Action::Continue => {}
                    Action::Connect => {
                        session.observer_mut().status("reconnecting");
                        supervisor.connect(&host, port);
                    }
                    Action::Disconnect => supervisor.disconnect(),
                    Action::Quit => {
                        flush_outbound(&mut session, &mut supervisor);
                        shutdown(&mut session, &mut supervisor).await;
                        break;
                    }
                }
            }
        }
        flush_outbound(&mut session, &mut supervisor);
    }

    info!("exiting");
    Ok(())
}

fn flush_outbound(session: &mut Session, supervisor: &mut Supervisor<ProxyTransport>) {
    for line in session.drain_outbound() {
        if let Err(e) = supervisor.send(&line) {
            session.observer_mut().status(&format!("not sent: {}", e));
            break;
        }
    }
}

/// Give the server a moment to act on QUIT, then drop the link.
async fn shutdown(session: &mut Session, supervisor: &mut Supervisor<ProxyTransport>) {
    if session.observer().state().connected {
        let closed = async {
            while let Some(event) = supervisor.next_event().await {
                if matches!(event, TransportEvent::Disconnected(_)) {
                    break;
                }
            }
        };
        let _ = tokio::time::timeout(QUIT_GRACE, closed).await;
    }
    supervisor.disconnect();
}
