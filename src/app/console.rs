//! Line-oriented rendering of session events.

use std::io::Write;

use tracing::warn;

use crate::app::state::ViewState;
use crate::irc::{EventSink, MessageTarget, SessionEvent};
use crate::logging::ChatLogger;

/// Prints session events with timestamps and feeds the chat logger.
pub struct ConsoleView<W> {
    state: ViewState,
    out: W,
    logger: ChatLogger,
}

impl<W: Write> ConsoleView<W> {
    pub fn new(state: ViewState, out: W, logger: ChatLogger) -> Self {
        Self { state, out, logger }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ViewState {
        &mut self.state
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Local notices: connection state, command errors, help.
    pub fn status(&mut self, text: &str) {
        self.print(&format!("-!- {}", text));
    }

    /// Echo of our own outgoing message.
    pub fn echo(&mut self, target: &str, text: &str) {
        let line = format!("[{}] <{}> {}", target, self.state.nick, text);
        self.print(&line);
    }

    fn print(&mut self, line: &str) {
        let stamp = chrono::Local::now().format(&self.state.timestamp_format);
        if let Err(e) = writeln!(self.out, "{} {}", stamp, line).and_then(|()| self.out.flush()) {
            warn!(error = %e, "console write failed");
        }
    }

    fn track(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Join { nick, channel } if *nick == self.state.nick => {
                self.state.set_target(channel);
            }
            SessionEvent::Part { nick, channel, .. } if *nick == self.state.nick => {
                self.state.clear_target(channel);
            }
            SessionEvent::Nick { old_nick, new_nick } if *old_nick == self.state.nick => {
                self.state.nick = new_nick.clone();
            }
            _ => {}
        }
    }
}

impl<W: Write> EventSink for ConsoleView<W> {
    fn push_event(&mut self, event: SessionEvent) {
        self.logger.log_event(&event);
        self.track(&event);
        if let SessionEvent::Highlight { from, target, .. } = &event {
            // Terminal bell.
            let _ = self.out.write_all(b"\x07");
            self.status(&format!("{} mentioned you in {}", from, target));
            return;
        }
        if let Some(line) = render_event(&event) {
            self.print(&line);
        }
    }
}

pub fn render_event(event: &SessionEvent) -> Option<String> {
    let line = match event {
        SessionEvent::Join { nick, channel } => format!("--> {} has joined {}", nick, channel),
        SessionEvent::Part {
            nick,
            channel,
            message,
        } => format!("<-- {} has left {} ({})", nick, channel, message),
        SessionEvent::Nick { old_nick, new_nick } => {
            format!("-!- {} is now known as {}", old_nick, new_nick)
        }
        SessionEvent::PrivateMessage {
            from,
            target,
            message,
            kind,
        } => match kind {
            MessageTarget::Channel => format!("[{}] <{}> {}", target, from, message),
            MessageTarget::Query => format!("*{}* {}", from, message),
        },
        SessionEvent::Quit { nick, message } => format!("<-- {} has quit ({})", nick, message),
        SessionEvent::Topic {
            actor: Some(actor),
            channel,
            topic,
        } => format!("-!- {} changed the topic of {} to: {}", actor, channel, topic),
        SessionEvent::Topic {
            actor: None,
            channel,
            topic,
        } => format!("-!- Topic for {}: {}", channel, topic),
        SessionEvent::NameList { channel, members } => {
            let names: Vec<String> = members.iter().map(|m| m.display_name()).collect();
            format!("-!- [{}] {}", channel, names.join(" "))
        }
        SessionEvent::Misc {
            prefix,
            command,
            args,
        } => match prefix {
            Some(prefix) if !prefix.nick.is_empty() => {
                format!("-{}- {} {}", prefix.nick, command, args)
            }
            _ => format!("-!- {} {}", command, args),
        },
        SessionEvent::Highlight { .. } => return None,
    };
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoggingConfig;
    use crate::irc::Member;

    fn view() -> ConsoleView<Vec<u8>> {
        ConsoleView::new(
            ViewState::new("me", "%H:%M"),
            Vec::new(),
            ChatLogger::new(&LoggingConfig::default()),
        )
    }

    fn printed(view: &ConsoleView<Vec<u8>>) -> String {
        String::from_utf8_lossy(view.output()).into_owned()
    }

    #[test]
    fn test_own_join_sets_target() {
        let mut v = view();
        v.push_event(SessionEvent::Join {
            nick: "me".into(),
            channel: "#rust".into(),
        });
        assert_eq!(v.state().current_target.as_deref(), Some("#rust"));
        v.push_event(SessionEvent::Join {
            nick: "bob".into(),
            channel: "#other".into(),
        });
        assert_eq!(v.state().current_target.as_deref(), Some("#rust"));
        v.push_event(SessionEvent::Part {
            nick: "me".into(),
            channel: "#rust".into(),
            message: String::new(),
        });
        assert_eq!(v.state().current_target, None);
        assert!(printed(&v).contains("--> bob has joined #other"));
    }

    #[test]
    fn test_own_nick_change_tracked() {
        let mut v = view();
        v.push_event(SessionEvent::Nick {
            old_nick: "me".into(),
            new_nick: "me_".into(),
        });
        assert_eq!(v.state().nick, "me_");
    }

    #[test]
    fn test_highlight_rings_bell() {
        let mut v = view();
        v.push_event(SessionEvent::Highlight {
            from: "bob".into(),
            target: "#rust".into(),
            message: "hey me".into(),
        });
        let out = printed(&v);
        assert!(out.starts_with('\x07'));
        assert!(out.contains("bob mentioned you in #rust"));
    }

    #[test]
    fn test_render_name_list_and_query() {
        let names = render_event(&SessionEvent::NameList {
            channel: "#rust".into(),
            members: vec![Member::new("alice", true), Member::new("bob", false)],
        });
        assert_eq!(names.as_deref(), Some("-!- [#rust] @alice bob"));
        let query = render_event(&SessionEvent::PrivateMessage {
            from: "bob".into(),
            target: "me".into(),
            message: "psst".into(),
            kind: MessageTarget::Query,
        });
        assert_eq!(query.as_deref(), Some("*bob* psst"));
    }
}
