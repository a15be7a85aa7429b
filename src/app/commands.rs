//! User slash-command parser.
//!
//! Parses `/command arg1 arg2 ...` input lines into typed [`ParsedCommand`]
//! values that the input handler can act on.

/// A parsed user command. Each variant corresponds to a `/command`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    Join { channel: String },
    Part { channel: Option<String>, reason: Option<String> },
    Nick { nick: String },
    Msg { target: String, text: String },
    /// Switch the default target for plain text.
    Query { target: String },
    Topic { channel: Option<String>, text: String },
    Quit { message: Option<String> },
    Connect,
    Disconnect,
    Help,
    /// Anything else goes to the server as typed, minus the slash.
    Raw { command: String },
}

/// Parse a slash-command string into a [`ParsedCommand`].
///
/// Returns `None` if the input does not start with `/` or a known command is
/// missing its required argument. Command names are case-insensitive; an
/// unknown name becomes [`ParsedCommand::Raw`].
pub fn parse_command(input: &str) -> Option<ParsedCommand> {
    let input = input.trim();
    let body = input.strip_prefix('/')?;
    if body.is_empty() {
        return None;
    }

    let parts: Vec<&str> = body.splitn(3, ' ').collect();
    let cmd = parts.first()?.to_lowercase();
    let rest_after_cmd = body.split_once(' ').map(|(_, rest)| rest.trim()).unwrap_or("");

    match cmd.as_str() {
        "join" | "j" => {
            let channel = parts.get(1)?.to_string();
            let channel = if !channel.starts_with('#') && !channel.starts_with('&') {
                format!("#{}", channel)
            } else {
                channel
            };
            Some(ParsedCommand::Join { channel })
        }
        "part" | "leave" => {
            let arg1 = parts.get(1).map(|s| s.to_string());
            let rest = parts.get(2).map(|s| s.to_string());
            let (channel, reason) = match arg1 {
                Some(ref a) if is_channel(a) => (Some(a.clone()), rest),
                Some(_) => (None, Some(rest_after_cmd.to_string())),
                None => (None, None),
            };
            Some(ParsedCommand::Part { channel, reason })
        }
        "nick" => {
            let nick = parts.get(1)?.to_string();
            Some(ParsedCommand::Nick { nick })
        }
        "msg" => {
            let target = parts.get(1)?.to_string();
            let text = parts.get(2).unwrap_or(&"").to_string();
            if text.is_empty() {
                return None;
            }
            Some(ParsedCommand::Msg { target, text })
        }
        "query" | "q" => {
            let target = parts.get(1)?.to_string();
            Some(ParsedCommand::Query { target })
        }
        "topic" | "t" => match parts.get(1) {
            Some(a) if is_channel(a) => Some(ParsedCommand::Topic {
                channel: Some(a.to_string()),
                text: parts.get(2).unwrap_or(&"").to_string(),
            }),
            _ => Some(ParsedCommand::Topic {
                channel: None,
                text: rest_after_cmd.to_string(),
            }),
        },
        "quit" | "exit" => {
            let message = (!rest_after_cmd.is_empty()).then(|| rest_after_cmd.to_string());
            Some(ParsedCommand::Quit { message })
        }
        "connect" | "reconnect" => Some(ParsedCommand::Connect),
        "disconnect" | "dc" => Some(ParsedCommand::Disconnect),
        "help" | "h" => Some(ParsedCommand::Help),
        "raw" | "quote" => {
            if rest_after_cmd.is_empty() {
                return None;
            }
            Some(ParsedCommand::Raw {
                command: rest_after_cmd.to_string(),
            })
        }
        _ => Some(ParsedCommand::Raw {
            command: body.to_string(),
        }),
    }
}

fn is_channel(arg: &str) -> bool {
    arg.starts_with('#') || arg.starts_with('&')
}

pub const HELP: &[&str] = &[
    "/join <#channel>          join a channel",
    "/part [#channel] [reason] leave a channel",
    "/msg <target> <text>      send a private message",
    "/query <target>           send plain text to <target> from now on",
    "/nick <nick>              change nickname",
    "/topic [#channel] <text>  set the topic",
    "/connect, /disconnect     manage the relay connection",
    "/quit [message]           leave and exit",
    "/<anything else>          sent to the server as typed",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(parse_command("hello /join"), None);
        assert_eq!(parse_command("/"), None);
    }

    #[test]
    fn test_join_adds_hash() {
        assert_eq!(
            parse_command("/join rust"),
            Some(ParsedCommand::Join { channel: "#rust".into() })
        );
        assert_eq!(
            parse_command("/J &local"),
            Some(ParsedCommand::Join { channel: "&local".into() })
        );
        assert_eq!(parse_command("/join"), None);
    }

    #[test]
    fn test_part_variants() {
        assert_eq!(
            parse_command("/part #rust see you"),
            Some(ParsedCommand::Part {
                channel: Some("#rust".into()),
                reason: Some("see you".into())
            })
        );
        assert_eq!(
            parse_command("/part gone for lunch"),
            Some(ParsedCommand::Part {
                channel: None,
                reason: Some("gone for lunch".into())
            })
        );
        assert_eq!(
            parse_command("/part"),
            Some(ParsedCommand::Part { channel: None, reason: None })
        );
    }

    #[test]
    fn test_msg_keeps_spaces() {
        assert_eq!(
            parse_command("/msg bob hi  there"),
            Some(ParsedCommand::Msg {
                target: "bob".into(),
                text: "hi  there".into()
            })
        );
        assert_eq!(parse_command("/msg bob"), None);
    }

    #[test]
    fn test_topic_with_and_without_channel() {
        assert_eq!(
            parse_command("/topic #rust new topic"),
            Some(ParsedCommand::Topic {
                channel: Some("#rust".into()),
                text: "new topic".into()
            })
        );
        assert_eq!(
            parse_command("/topic new topic"),
            Some(ParsedCommand::Topic {
                channel: None,
                text: "new topic".into()
            })
        );
    }

    #[test]
    fn test_quit_message() {
        assert_eq!(parse_command("/quit"), Some(ParsedCommand::Quit { message: None }));
        assert_eq!(
            parse_command("/quit bye all"),
            Some(ParsedCommand::Quit { message: Some("bye all".into()) })
        );
    }

    #[test]
    fn test_unknown_command_is_raw() {
        assert_eq!(
            parse_command("/whois bob"),
            Some(ParsedCommand::Raw { command: "whois bob".into() })
        );
        assert_eq!(
            parse_command("/raw MODE #rust +m"),
            Some(ParsedCommand::Raw { command: "MODE #rust +m".into() })
        );
    }
}
