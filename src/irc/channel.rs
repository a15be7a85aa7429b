//! Channel and membership records kept by the session.

use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub nick: String,
    pub is_operator: bool,
}

impl Member {
    pub fn new(nick: impl Into<String>, is_operator: bool) -> Self {
        Self {
            nick: nick.into(),
            is_operator,
        }
    }

    /// Parse one RPL_NAMREPLY entry. `@` marks an operator; a `+` voice
    /// marker is dropped.
    pub fn from_names_entry(entry: &str) -> Self {
        match entry.strip_prefix('@') {
            Some(nick) => Self::new(nick, true),
            None => Self::new(entry.strip_prefix('+').unwrap_or(entry), false),
        }
    }

    pub fn display_name(&self) -> String {
        if self.is_operator {
            format!("@{}", self.nick)
        } else {
            self.nick.clone()
        }
    }
}

/// Operators first, then case-insensitive ascending nick.
pub fn member_order(a: &Member, b: &Member) -> Ordering {
    b.is_operator
        .cmp(&a.is_operator)
        .then_with(|| a.nick.to_lowercase().cmp(&b.nick.to_lowercase()))
        .then_with(|| a.nick.cmp(&b.nick))
}

pub fn sort_members(members: &mut [Member]) {
    members.sort_by(member_order);
}

/// A joined channel (or a private-message query) and its member list.
///
/// Members are unique by nick and always kept in [`member_order`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub name: String,
    pub topic: String,
    members: Vec<Member>,
}

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            topic: String::new(),
            members: Vec::new(),
        }
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn contains(&self, nick: &str) -> bool {
        self.members.iter().any(|m| m.nick == nick)
    }

    /// Insert or replace the member with the same nick, then re-sort.
    pub fn add_member(&mut self, member: Member) {
        self.members.retain(|m| m.nick != member.nick);
        self.members.push(member);
        sort_members(&mut self.members);
    }

    pub fn remove_member(&mut self, nick: &str) -> Option<Member> {
        let index = self.members.iter().position(|m| m.nick == nick)?;
        Some(self.members.remove(index))
    }

    /// Replace the whole member list with a NAMES snapshot.
    pub fn set_members(&mut self, members: Vec<Member>) {
        self.members.clear();
        for member in members {
            self.members.retain(|m| m.nick != member.nick);
            self.members.push(member);
        }
        sort_members(&mut self.members);
    }
}
