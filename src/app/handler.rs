//! Turns typed lines into session commands.

use std::io::Write;

use crate::app::action::Action;
use crate::app::commands::{parse_command, ParsedCommand, HELP};
use crate::app::console::ConsoleView;
use crate::irc::session::is_channel_name;
use crate::irc::IrcSession;
use crate::transport::TransportEvent;

/// Handle one line of user input. Protocol lines are queued on the session;
/// the caller drains and sends them.
pub fn handle_input<W: Write>(line: &str, session: &mut IrcSession<ConsoleView<W>>) -> Action {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Action::Continue;
    }

    if !line.trim_start().starts_with('/') {
        let target = session.observer().state().current_target.clone();
        match target {
            Some(target) => say(session, &target, line),
            None => session
                .observer_mut()
                .status("no target: /join a channel or /query a nick first"),
        }
        return Action::Continue;
    }

    let Some(command) = parse_command(line) else {
        session
            .observer_mut()
            .status("missing argument, see /help");
        return Action::Continue;
    };

    match command {
        ParsedCommand::Join { channel } => session.join(&channel),
        ParsedCommand::Part { channel, reason } => match channel.or_else(|| current_channel(session)) {
            Some(channel) => session.part(&channel, reason.as_deref()),
            None => session.observer_mut().status("not in a channel"),
        },
        ParsedCommand::Nick { nick } => session.change_nick(&nick),
        ParsedCommand::Msg { target, text } => say(session, &target, &text),
        ParsedCommand::Query { target } => {
            let view = session.observer_mut();
            view.state_mut().set_target(&target);
            view.status(&format!("talking to {}", target));
        }
        ParsedCommand::Topic { channel, text } => match channel.or_else(|| current_channel(session)) {
            Some(channel) if text.is_empty() => session.send_raw(&format!("TOPIC {}", channel)),
            Some(channel) => session.set_topic(&channel, &text),
            None => session.observer_mut().status("not in a channel"),
        },
        ParsedCommand::Quit { message } => {
            session.quit(message.as_deref());
            return Action::Quit;
        }
        ParsedCommand::Connect => return Action::Connect,
        ParsedCommand::Disconnect => return Action::Disconnect,
        ParsedCommand::Help => {
            for line in HELP {
                session.observer_mut().status(line);
            }
        }
        ParsedCommand::Raw { command } => session.send_raw(&command),
    }
    Action::Continue
}

fn say<W: Write>(session: &mut IrcSession<ConsoleView<W>>, target: &str, text: &str) {
    session.send_message(target, text);
    session.observer_mut().echo(target, text);
}

fn current_channel<W: Write>(session: &IrcSession<ConsoleView<W>>) -> Option<String> {
    session
        .observer()
        .state()
        .current_target
        .clone()
        .filter(|target| is_channel_name(target))
}

/// Apply a transport event to the session and keep the view in step with it.
pub fn handle_transport_event<W: Write>(
    session: &mut IrcSession<ConsoleView<W>>,
    event: TransportEvent,
) {
    match event {
        TransportEvent::Connected => {
            session.on_connected();
            // Registration starts over from the configured nick.
            let nick = session.nick().to_string();
            let view = session.observer_mut();
            view.state_mut().nick = nick;
            view.state_mut().connected = true;
            view.status("connected");
        }
        TransportEvent::Received(data) => session.receive(&data),
        TransportEvent::Disconnected(reason) => {
            session.on_disconnected();
            let view = session.observer_mut();
            view.state_mut().connected = false;
            if reason.should_retry() {
                view.status(&format!("{}; reconnecting shortly", reason));
            } else {
                view.status(&reason.to_string());
            }
        }
    }
}
