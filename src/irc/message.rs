//! RFC 1459 message parsing.
//!
//! ```text
//! <message> ::= [':' <prefix> <SPACE>] <command> <params>
//! <prefix>  ::= <servername> | <nick> ['!' <user>] ['@' <host>]
//! ```
//!
//! Parsing never fails. A malformed line produces a best-effort
//! [`ParsedMessage`], possibly with an empty command, which callers ignore.

use std::fmt;

/// Message source: `nick[!user][@host]` or a server name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Prefix {
    /// Nick, or the server name when the prefix has no `!`/`@` parts.
    pub nick: String,
    pub user: String,
    pub host: String,
    /// Original prefix text without the leading `:`.
    pub raw: String,
}

impl Prefix {
    /// Decompose prefix text (leading `:` already removed).
    pub fn parse(raw: &str) -> Self {
        let (nick, user, host) = match raw.split_once('!') {
            Some((nick, rest)) => match rest.split_once('@') {
                Some((user, host)) => (nick, user, host),
                None => (nick, rest, ""),
            },
            None => match raw.split_once('@') {
                Some((nick, host)) => (nick, "", host),
                None => (raw, "", ""),
            },
        };
        Self {
            nick: nick.to_string(),
            user: user.to_string(),
            host: host.to_string(),
            raw: raw.to_string(),
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// One parsed protocol line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedMessage {
    pub prefix: Option<Prefix>,
    /// `params[0]`; empty for a line with nothing after the prefix.
    pub command: String,
    /// Arguments after the command. The last one may contain spaces.
    pub params: Vec<String>,
}

impl ParsedMessage {
    pub fn parse(line: &str) -> Self {
        let mut tokens = line.split(' ').peekable();

        let prefix = match tokens.peek() {
            Some(first) if first.starts_with(':') => {
                let raw = &first[1..];
                let prefix = Prefix::parse(raw);
                tokens.next();
                Some(prefix)
            }
            _ => None,
        };

        let mut params: Vec<String> = Vec::new();
        while let Some(token) = tokens.next() {
            if let Some(trailing) = token.strip_prefix(':') {
                let mut joined = trailing.to_string();
                for rest in tokens.by_ref() {
                    joined.push(' ');
                    joined.push_str(rest);
                }
                params.push(joined);
                break;
            }
            params.push(token.to_string());
        }

        let command = if params.is_empty() {
            String::new()
        } else {
            params.remove(0)
        };

        Self {
            prefix,
            command,
            params,
        }
    }

    /// Argument `index` (0 is the first one after the command), or `""`.
    pub fn arg(&self, index: usize) -> &str {
        self.params.get(index).map(String::as_str).unwrap_or("")
    }

    /// Nick part of the prefix, or `""` when there is no prefix.
    pub fn source_nick(&self) -> &str {
        self.prefix.as_ref().map(|p| p.nick.as_str()).unwrap_or("")
    }
}

impl fmt::Display for ParsedMessage {
    /// Wire form without the line terminator.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            write!(f, ":{} ", prefix.raw)?;
        }
        f.write_str(&self.command)?;
        if let Some((last, middle)) = self.params.split_last() {
            for param in middle {
                write!(f, " {}", param)?;
            }
            if last.is_empty() || last.contains(' ') || last.starts_with(':') {
                write!(f, " :{}", last)?;
            } else {
                write!(f, " {}", last)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_prefix_with_trailing() {
        let msg = ParsedMessage::parse(":nick!user@host COMMAND p1 p2 :trailing with spaces");
        let prefix = msg.prefix.as_ref().unwrap();
        assert_eq!(prefix.nick, "nick");
        assert_eq!(prefix.user, "user");
        assert_eq!(prefix.host, "host");
        assert_eq!(prefix.raw, "nick!user@host");
        assert_eq!(msg.command, "COMMAND");
        assert_eq!(msg.params, vec!["p1", "p2", "trailing with spaces"]);
        assert_eq!(
            msg.to_string(),
            ":nick!user@host COMMAND p1 p2 :trailing with spaces"
        );
    }

    #[test]
    fn test_prefix_forms() {
        let server = Prefix::parse("irc.example.org");
        assert_eq!(server.nick, "irc.example.org");
        assert_eq!(server.user, "");
        assert_eq!(server.host, "");

        let host_only = Prefix::parse("nick@host");
        assert_eq!((host_only.nick.as_str(), host_only.user.as_str()), ("nick", ""));
        assert_eq!(host_only.host, "host");

        let user_only = Prefix::parse("nick!user");
        assert_eq!(user_only.user, "user");
        assert_eq!(user_only.host, "");
    }

    #[test]
    fn test_no_prefix() {
        let msg = ParsedMessage::parse("PING :irc.example.org");
        assert!(msg.prefix.is_none());
        assert_eq!(msg.command, "PING");
        assert_eq!(msg.arg(0), "irc.example.org");
        assert_eq!(msg.source_nick(), "");
    }

    #[test]
    fn test_empty_prefix_is_not_absent() {
        let msg = ParsedMessage::parse(": NOTICE x");
        assert_eq!(msg.prefix, Some(Prefix::default()));
        assert_eq!(msg.command, "NOTICE");
    }

    #[test]
    fn test_numeric_reply() {
        let msg = ParsedMessage::parse(":srv 353 me = #rust :@alice bob +carol");
        assert_eq!(msg.command, "353");
        assert_eq!(msg.params, vec!["me", "=", "#rust", "@alice bob +carol"]);
    }

    #[test]
    fn test_malformed_lines_do_not_fail() {
        assert_eq!(ParsedMessage::parse("").command, "");
        assert_eq!(ParsedMessage::parse(":only.prefix").command, "");
        let msg = ParsedMessage::parse(":x :trailing only");
        assert_eq!(msg.command, "trailing only");
        assert!(msg.params.is_empty());
    }

    #[test]
    fn test_empty_trailing() {
        let msg = ParsedMessage::parse(":a!b@c PART #chan :");
        assert_eq!(msg.params, vec!["#chan", ""]);
        assert_eq!(msg.arg(5), "");
    }
}
