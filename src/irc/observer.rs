//! Session events and the observer interface the presentation layer implements.

use crate::irc::channel::Member;
use crate::irc::message::Prefix;
use tokio::sync::mpsc;

/// Where a PRIVMSG was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageTarget {
    /// Sent to a channel the local user is in.
    Channel,
    /// Sent directly to the local nick.
    Query,
}

/// Receives session events synchronously from line dispatch.
///
/// Arguments are read views of session state; observers keep their own copies
/// of anything they need later.
pub trait SessionObserver {
    fn on_join(&mut self, nick: &str, channel: &str);
    fn on_nick(&mut self, old_nick: &str, new_nick: &str);
    fn on_part(&mut self, nick: &str, channel: &str, message: &str);
    fn on_private_message(&mut self, from: &str, target: &str, message: &str, kind: MessageTarget);
    fn on_quit(&mut self, nick: &str, message: &str);
    /// `actor` is `None` for the RPL_TOPIC reply sent on join.
    fn on_topic(&mut self, actor: Option<&str>, channel: &str, topic: &str);
    fn on_name_list(&mut self, channel: &str, members: &[Member]);
    fn on_misc(&mut self, prefix: Option<&Prefix>, command: &str, args: &str);

    /// A private message matched one of the notification keywords.
    fn on_highlight(&mut self, _from: &str, _target: &str, _message: &str) {}
}

/// Owned form of every observer callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Join {
        nick: String,
        channel: String,
    },
    Nick {
        old_nick: String,
        new_nick: String,
    },
    Part {
        nick: String,
        channel: String,
        message: String,
    },
    PrivateMessage {
        from: String,
        target: String,
        message: String,
        kind: MessageTarget,
    },
    Quit {
        nick: String,
        message: String,
    },
    Topic {
        actor: Option<String>,
        channel: String,
        topic: String,
    },
    NameList {
        channel: String,
        members: Vec<Member>,
    },
    Misc {
        prefix: Option<Prefix>,
        command: String,
        args: String,
    },
    Highlight {
        from: String,
        target: String,
        message: String,
    },
}

/// Anything that can take owned events gets the observer interface for free.
pub trait EventSink {
    fn push_event(&mut self, event: SessionEvent);
}

impl EventSink for Vec<SessionEvent> {
    fn push_event(&mut self, event: SessionEvent) {
        self.push(event);
    }
}

impl EventSink for mpsc::UnboundedSender<SessionEvent> {
    fn push_event(&mut self, event: SessionEvent) {
        // Receiver gone means the front end is shutting down.
        let _ = self.send(event);
    }
}

impl<T: EventSink> SessionObserver for T {
    fn on_join(&mut self, nick: &str, channel: &str) {
        self.push_event(SessionEvent::Join {
            nick: nick.to_string(),
            channel: channel.to_string(),
        });
    }

    fn on_nick(&mut self, old_nick: &str, new_nick: &str) {
        self.push_event(SessionEvent::Nick {
            old_nick: old_nick.to_string(),
            new_nick: new_nick.to_string(),
        });
    }

    fn on_part(&mut self, nick: &str, channel: &str, message: &str) {
        self.push_event(SessionEvent::Part {
            nick: nick.to_string(),
            channel: channel.to_string(),
            message: message.to_string(),
        });
    }

    fn on_private_message(&mut self, from: &str, target: &str, message: &str, kind: MessageTarget) {
        self.push_event(SessionEvent::PrivateMessage {
            from: from.to_string(),
            target: target.to_string(),
            message: message.to_string(),
            kind,
        });
    }

    fn on_quit(&mut self, nick: &str, message: &str) {
        self.push_event(SessionEvent::Quit {
            nick: nick.to_string(),
            message: message.to_string(),
        });
    }

    fn on_topic(&mut self, actor: Option<&str>, channel: &str, topic: &str) {
        self.push_event(SessionEvent::Topic {
            actor: actor.map(str::to_string),
            channel: channel.to_string(),
            topic: topic.to_string(),
        });
    }

    fn on_name_list(&mut self, channel: &str, members: &[Member]) {
        self.push_event(SessionEvent::NameList {
            channel: channel.to_string(),
            members: members.to_vec(),
        });
    }

    fn on_misc(&mut self, prefix: Option<&Prefix>, command: &str, args: &str) {
        self.push_event(SessionEvent::Misc {
            prefix: prefix.cloned(),
            command: command.to_string(),
            args: args.to_string(),
        });
    }

    fn on_highlight(&mut self, from: &str, target: &str, message: &str) {
        self.push_event(SessionEvent::Highlight {
            from: from.to_string(),
            target: target.to_string(),
            message: message.to_string(),
        });
    }
}
