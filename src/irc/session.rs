//! IRC session state machine.
//!
//! [`IrcSession`] turns received bytes into observer events while keeping the
//! channel/membership model consistent. It does no I/O: lines to send are
//! queued and collected with [`IrcSession::drain_outbound`], so the same
//! session runs over any transport.

use std::collections::BTreeMap;

use tracing::{debug, trace, warn};

use crate::irc::channel::{Channel, Member};
use crate::irc::framer::LineFramer;
use crate::irc::message::ParsedMessage;
use crate::irc::observer::{MessageTarget, SessionObserver};

/// Per-connection identity and preferences. Unchanged across reconnects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub nick: String,
    pub username: String,
    pub realname: String,
    /// Upstream host, sent in the USER registration line.
    pub server_host: String,
    pub server_password: Option<String>,
    /// Substrings that raise [`SessionObserver::on_highlight`].
    pub keywords: Vec<String>,
    pub auto_join: Vec<String>,
}

impl SessionConfig {
    pub fn new(nick: impl Into<String>, server_host: impl Into<String>) -> Self {
        let nick = nick.into();
        Self {
            username: nick.clone(),
            realname: "IRC over a socket relay".to_string(),
            nick,
            server_host: server_host.into(),
            server_password: None,
            keywords: Vec::new(),
            auto_join: Vec::new(),
        }
    }
}

/// RPL_NAMREPLY lines collected until the list for a channel is complete.
#[derive(Debug, Default)]
struct NamesAccumulator {
    channel: String,
    members: Vec<Member>,
}

/// Channel name prefixes from RFC 2811.
pub fn is_channel_name(target: &str) -> bool {
    target.starts_with(['#', '&', '+', '!'])
}

pub struct IrcSession<O> {
    config: SessionConfig,
    nick: String,
    channels: BTreeMap<String, Channel>,
    names: NamesAccumulator,
    framer: LineFramer,
    outbound: Vec<String>,
    observer: O,
}

impl<O: SessionObserver> IrcSession<O> {
    pub fn new(config: SessionConfig, observer: O) -> Self {
        Self {
            nick: config.nick.clone(),
            config,
            channels: BTreeMap::new(),
            names: NamesAccumulator::default(),
            framer: LineFramer::new(),
            outbound: Vec::new(),
            observer,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current local nick; follows NICK changes of the local user.
    pub fn nick(&self) -> &str {
        &self.nick
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get(name)
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    /// Forget a retained channel or query record.
    pub fn remove_channel(&mut self, name: &str) -> Option<Channel> {
        self.channels.remove(name)
    }

    /// The transport finished its handshake: start from fresh state and
    /// register with the server.
    pub fn on_connected(&mut self) {
        self.reset();
        if let Some(password) = self.config.server_password.clone() {
            if !password.is_empty() {
                self.send_raw(&format!("PASS {}", password));
            }
        }
        let nick = self.nick.clone();
        self.send_raw(&format!("NICK {}", nick));
        let user = format!(
            "USER {} localhost {} :{}",
            self.config.username, self.config.server_host, self.config.realname
        );
        self.send_raw(&user);
        for channel in self.config.auto_join.clone() {
            self.join(&channel);
        }
    }

    /// Drop a half-received line; channel records stay until the next connect.
    pub fn on_disconnected(&mut self) {
        self.framer.clear();
        self.names = NamesAccumulator::default();
    }

    fn reset(&mut self) {
        self.nick = self.config.nick.clone();
        self.channels.clear();
        self.names = NamesAccumulator::default();
        self.framer.clear();
        self.outbound.clear();
    }

    /// Feed bytes received from the transport.
    pub fn receive(&mut self, chunk: &[u8]) {
        for line in self.framer.feed(chunk) {
            self.handle_line(&line);
        }
    }

    pub fn handle_line(&mut self, line: &str) {
        trace!(%line, "irc <-");
        let message = ParsedMessage::parse(line);
        self.handle_message(&message);
    }

    pub fn handle_message(&mut self, msg: &ParsedMessage) {
        match msg.command.as_str() {
            "" => debug!(?msg, "ignoring line without a command"),
            "JOIN" => self.handle_join(msg),
            "NICK" => self.handle_nick(msg),
            "PART" => self.handle_part(msg),
            "PING" => self.handle_ping(msg),
            "PRIVMSG" => self.handle_privmsg(msg),
            "QUIT" => self.handle_quit(msg),
            "TOPIC" => {
                let Some(actor) = self.require_prefix(msg) else { return };
                self.set_topic_from(Some(actor.as_str()), msg.arg(0), msg.arg(1));
            }
            // RPL_TOPIC
            "332" => self.set_topic_from(None, msg.arg(1), msg.arg(2)),
            // RPL_TOPICWHOTIME
            "333" => {}
            // RPL_NAMREPLY
            "353" => self.handle_names(msg),
            // RPL_ENDOFNAMES
            "366" => self.handle_names_end(msg),
            _ => {
                let args = msg.params.join(" ");
                self.observer.on_misc(msg.prefix.as_ref(), &msg.command, &args);
            }
        }
    }

    fn require_prefix(&self, msg: &ParsedMessage) -> Option<String> {
        match &msg.prefix {
            Some(prefix) if !prefix.nick.is_empty() => Some(prefix.nick.clone()),
            _ => {
                warn!(command = %msg.command, "message without a source nick dropped");
                None
            }
        }
    }

    fn handle_join(&mut self, msg: &ParsedMessage) {
        let Some(nick) = self.require_prefix(msg) else { return };
        let channel = msg.arg(0);
        if nick == self.nick {
            self.channels.insert(channel.to_string(), Channel::new(channel));
        } else {
            match self.channels.get_mut(channel) {
                Some(record) => record.add_member(Member::new(nick.as_str(), false)),
                None => {
                    warn!(%nick, %channel, "JOIN for a channel we are not in");
                    return;
                }
            }
        }
        self.observer.on_join(&nick, channel);
    }

    fn handle_nick(&mut self, msg: &ParsedMessage) {
        let Some(old_nick) = self.require_prefix(msg) else { return };
        let new_nick = msg.arg(0);
        if new_nick.is_empty() {
            warn!(%old_nick, "NICK without a new nick");
            return;
        }

        let mut changed = false;
        if old_nick == self.nick {
            self.nick = new_nick.to_string();
            changed = true;
        }

        let holding: Vec<String> = self
            .channels
            .values()
            .filter(|c| c.contains(&old_nick))
            .map(|c| c.name.clone())
            .collect();
        for name in holding {
            if let Some(record) = self.channels.get_mut(&name) {
                if let Some(member) = record.remove_member(&old_nick) {
                    record.add_member(Member::new(new_nick, member.is_operator));
                    changed = true;
                }
            }
        }

        if changed {
            self.observer.on_nick(&old_nick, new_nick);
        }
    }

    fn handle_part(&mut self, msg: &ParsedMessage) {
        let Some(nick) = self.require_prefix(msg) else { return };
        let channel = msg.arg(0);
        match self.channels.get_mut(channel) {
            Some(record) => {
                record.remove_member(&nick);
            }
            None => {
                warn!(%nick, %channel, "PART for a channel we are not in");
                return;
            }
        }
        self.observer.on_part(&nick, channel, msg.arg(1));
    }

    fn handle_quit(&mut self, msg: &ParsedMessage) {
        let Some(nick) = self.require_prefix(msg) else { return };
        for record in self.channels.values_mut() {
            record.remove_member(&nick);
        }
        self.observer.on_quit(&nick, msg.arg(0));
    }

    fn handle_ping(&mut self, msg: &ParsedMessage) {
        let token = msg.arg(0);
        debug!(%token, "PING / PONG");
        if token.is_empty() || token.contains(' ') {
            self.send_raw(&format!("PONG :{}", token));
        } else {
            self.send_raw(&format!("PONG {}", token));
        }
    }

    fn handle_privmsg(&mut self, msg: &ParsedMessage) {
        let Some(from) = self.require_prefix(msg) else { return };
        let target = msg.arg(0);
        let text = msg.arg(1);

        let kind = if is_channel_name(target) {
            if !self.channels.contains_key(target) {
                warn!(%from, %target, "PRIVMSG to a channel we are not in");
                return;
            }
            MessageTarget::Channel
        } else if target == self.nick {
            if !self.channels.contains_key(&from) {
                let mut query = Channel::new(from.as_str());
                query.topic = format!("private messages from {}", from);
                query.add_member(Member::new(from.as_str(), false));
                query.add_member(Member::new(self.nick.as_str(), false));
                self.channels.insert(from.clone(), query);
            }
            MessageTarget::Query
        } else {
            warn!(%from, %target, "PRIVMSG to an unexpected target");
            return;
        };

        self.observer.on_private_message(&from, target, text, kind);

        let matched = self
            .config
            .keywords
            .iter()
            .any(|k| !k.is_empty() && text.contains(k.as_str()));
        if matched {
            self.observer.on_highlight(&from, target, text);
        }
    }

    fn set_topic_from(&mut self, actor: Option<&str>, channel: &str, topic: &str) {
        match self.channels.get_mut(channel) {
            Some(record) => record.topic = topic.to_string(),
            None => {
                warn!(%channel, "topic for a channel we are not in");
                return;
            }
        }
        self.observer.on_topic(actor, channel, topic);
    }

    fn handle_names(&mut self, msg: &ParsedMessage) {
        let (me, mode, channel, names) = (msg.arg(0), msg.arg(1), msg.arg(2), msg.arg(3));
        if me != self.nick {
            warn!(%me, "RPL_NAMREPLY not addressed to us");
            return;
        }
        if !matches!(mode, "@" | "+" | "=") {
            warn!(%mode, "RPL_NAMREPLY with an unknown channel type");
            return;
        }

        if channel != self.names.channel {
            if !self.names.members.is_empty() {
                self.flush_names();
            }
            self.names.channel = channel.to_string();
        }
        self.names.members.extend(
            names
                .split(' ')
                .filter(|entry| !entry.is_empty())
                .map(Member::from_names_entry),
        );
    }

    fn handle_names_end(&mut self, msg: &ParsedMessage) {
        let (me, channel) = (msg.arg(0), msg.arg(1));
        if me != self.nick {
            warn!(%me, "RPL_ENDOFNAMES not addressed to us");
            return;
        }
        if !self.names.channel.is_empty() && channel != self.names.channel {
            warn!(
                %channel,
                listing = %self.names.channel,
                "RPL_ENDOFNAMES does not match the channel being listed"
            );
        }
        self.flush_names();
    }

    /// Emit the accumulated list as one snapshot and clear the accumulator.
    fn flush_names(&mut self) {
        let NamesAccumulator { channel, members } = std::mem::take(&mut self.names);
        if channel.is_empty() {
            return;
        }
        let mut snapshot = Channel::new(channel.as_str());
        snapshot.set_members(members);
        if let Some(record) = self.channels.get_mut(&channel) {
            record.set_members(snapshot.members().to_vec());
        }
        self.observer.on_name_list(&channel, snapshot.members());
    }

    /// Queue one protocol line; CR/LF inside `line` are removed.
    pub fn send_raw(&mut self, line: &str) {
        let clean: String = line.chars().filter(|c| *c != '\r' && *c != '\n').collect();
        trace!(line = %clean, "irc ->");
        self.outbound.push(format!("{}\r\n", clean));
    }

    pub fn send_message(&mut self, target: &str, text: &str) {
        self.send_raw(&format!("PRIVMSG {} :{}", target, text));
    }

    pub fn join(&mut self, channel: &str) {
        self.send_raw(&format!("JOIN {}", channel));
    }

    pub fn part(&mut self, channel: &str, reason: Option<&str>) {
        match reason {
            Some(reason) => self.send_raw(&format!("PART {} :{}", channel, reason)),
            None => self.send_raw(&format!("PART {}", channel)),
        }
    }

    pub fn set_topic(&mut self, channel: &str, topic: &str) {
        self.send_raw(&format!("TOPIC {} :{}", channel, topic));
    }

    pub fn change_nick(&mut self, nick: &str) {
        self.send_raw(&format!("NICK {}", nick));
    }

    pub fn quit(&mut self, message: Option<&str>) {
        match message {
            Some(message) => self.send_raw(&format!("QUIT :{}", message)),
            None => self.send_raw("QUIT"),
        }
    }

    /// Take the queued CRLF-terminated lines in send order.
    pub fn drain_outbound(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outbound)
    }
}
