//! IRC message parsing and serialization.
//!
//! Implements `FromStr` and `Display` for [`Message`] over the classic
//! grammar: `[@tags] [:prefix] VERB params [:trailing]`. Incoming IRCv3
//! tags are skipped rather than rejected; the bot never consumes them.

use std::fmt;
use std::str::FromStr;

use crate::command::Command;
use crate::error::ProtocolError;

/// The sender of a message: either a server name or a user mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prefix {
    /// `:irc.example.net`
    ServerName(String),
    /// `:nick!user@host` (user and host optional)
    Nickname {
        nick: String,
        user: Option<String>,
        host: Option<String>,
    },
}

impl Prefix {
    /// Parse a prefix without the leading `:`.
    ///
    /// A prefix containing `!` or `@` is a user mask; one containing `.`
    /// but neither is a server name; a bare word is a nickname.
    pub fn parse(raw: &str) -> Prefix {
        if !raw.contains('!') && !raw.contains('@') {
            if raw.contains('.') {
                return Prefix::ServerName(raw.to_string());
            }
            return Prefix::Nickname {
                nick: raw.to_string(),
                user: None,
                host: None,
            };
        }

        let (nick_user, host) = match raw.split_once('@') {
            Some((nu, h)) => (nu, Some(h.to_string())),
            None => (raw, None),
        };
        let (nick, user) = match nick_user.split_once('!') {
            Some((n, u)) => (n.to_string(), Some(u.to_string())),
            None => (nick_user.to_string(), None),
        };

        Prefix::Nickname { nick, user, host }
    }

    /// The nickname if this prefix is a user mask.
    pub fn nick(&self) -> Option<&str> {
        match self {
            Prefix::Nickname { nick, .. } => Some(nick),
            Prefix::ServerName(_) => None,
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prefix::ServerName(name) => write!(f, "{}", name),
            Prefix::Nickname { nick, user, host } => {
                write!(f, "{}", nick)?;
                if let Some(user) = user {
                    write!(f, "!{}", user)?;
                }
                if let Some(host) = host {
                    write!(f, "@{}", host)?;
                }
                Ok(())
            }
        }
    }
}

/// A single IRC protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub prefix: Option<Prefix>,
    pub command: Command,
}

impl Message {
    /// Create a message with no prefix (the normal client-to-server form).
    pub fn new(command: Command) -> Self {
        Self {
            prefix: None,
            command,
        }
    }

    /// Nickname of the sender, if the prefix is a user mask.
    pub fn source_nick(&self) -> Option<&str> {
        self.prefix.as_ref().and_then(Prefix::nick)
    }
}

impl From<Command> for Message {
    fn from(command: Command) -> Self {
        Message::new(command)
    }
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Message, Self::Err> {
        let mut rest = s.trim_end_matches(['\r', '\n']);

        // Skip IRCv3 tags if the server sends them.
        if rest.starts_with('@') {
            match rest.split_once(' ') {
                Some((_, after)) => rest = after.trim_start(),
                None => {
                    return Err(ProtocolError::InvalidMessage {
                        string: s.to_string(),
                        reason: "tags without a command".to_string(),
                    });
                }
            }
        }

        let prefix = if let Some(stripped) = rest.strip_prefix(':') {
            match stripped.split_once(' ') {
                Some((raw_prefix, after)) => {
                    rest = after.trim_start();
                    Some(Prefix::parse(raw_prefix))
                }
                None => {
                    return Err(ProtocolError::InvalidMessage {
                        string: s.to_string(),
                        reason: "prefix without a command".to_string(),
                    });
                }
            }
        } else {
            None
        };

        let (verb, after) = match rest.split_once(' ') {
            Some((verb, after)) => (verb, after),
            None => (rest, ""),
        };
        if verb.is_empty() {
            return Err(ProtocolError::InvalidMessage {
                string: s.to_string(),
                reason: "empty command".to_string(),
            });
        }

        // Split parameters; everything after " :" is a single trailing param.
        let mut params: Vec<String> = Vec::new();
        let mut remainder = after;
        loop {
            if remainder.is_empty() {
                break;
            }
            if let Some(trailing) = remainder.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            match remainder.split_once(' ') {
                Some((word, after)) => {
                    if !word.is_empty() {
                        params.push(word.to_string());
                    }
                    remainder = after;
                }
                None => {
                    params.push(remainder.to_string());
                    break;
                }
            }
        }

        Ok(Message {
            prefix,
            command: Command::from_parts(verb, params),
        })
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            write!(f, ":{} ", prefix)?;
        }
        write!(f, "{}", self.command.verb())?;

        let params = self.command.params();
        let len = params.len();
        for (i, param) in params.iter().enumerate() {
            let last = i + 1 == len;
            if last && (param.is_empty() || param.contains(' ') || param.starts_with(':')) {
                write!(f, " :{}", param)?;
            } else {
                write!(f, " {}", param)?;
            }
        }
        write!(f, "\r\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_ping() {
        let msg: Message = "PING :server\r\n".parse().unwrap();
        assert_eq!(msg.command, Command::PING("server".to_string()));
    }

    #[test]
    fn test_parse_privmsg() {
        let msg: Message = ":nick!user@host PRIVMSG #channel :Hello, world!\r\n"
            .parse()
            .unwrap();
        assert_eq!(
            msg.command,
            Command::PRIVMSG("#channel".to_string(), "Hello, world!".to_string())
        );
        assert_eq!(msg.source_nick(), Some("nick"));
    }

    #[test]
    fn test_parse_numeric_response() {
        let msg: Message = ":server.example 001 bot :Welcome to IRC\r\n".parse().unwrap();
        match msg.command {
            Command::Response(1, params) => {
                assert_eq!(params, vec!["bot".to_string(), "Welcome to IRC".to_string()]);
            }
            other => panic!("expected numeric, got {other:?}"),
        }
        assert_eq!(msg.prefix, Some(Prefix::ServerName("server.example".into())));
    }

    #[test]
    fn test_parse_skips_tags() {
        let msg: Message = "@time=2023-01-01T00:00:00Z :nick PRIVMSG #ch :Hi\r\n"
            .parse()
            .unwrap();
        assert!(matches!(msg.command, Command::PRIVMSG(_, _)));
    }

    #[test]
    fn test_parse_join_echo() {
        let msg: Message = ":bot!bot@host JOIN :#announce\r\n".parse().unwrap();
        assert_eq!(msg.command, Command::JOIN("#announce".to_string(), None));
        assert_eq!(msg.source_nick(), Some("bot"));
    }

    #[test]
    fn test_parse_empty_message() {
        let result: Result<Message, _> = "".parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_privmsg() {
        let msg = Message::new(Command::PRIVMSG("#chan".into(), "two words".into()));
        assert_eq!(msg.to_string(), "PRIVMSG #chan :two words\r\n");
    }

    #[test]
    fn test_serialize_user() {
        let msg = Message::new(Command::USER("bot".into(), "bot".into()));
        assert_eq!(msg.to_string(), "USER bot 0 * bot\r\n");
    }

    #[test]
    fn test_serialize_quit_without_reason() {
        let msg = Message::new(Command::QUIT(None));
        assert_eq!(msg.to_string(), "QUIT\r\n");
    }

    #[test]
    fn test_round_trip_part() {
        let msg = Message::new(Command::PART("#chan".into(), Some("bye now".into())));
        let parsed: Message = msg.to_string().parse().unwrap();
        assert_eq!(parsed.command, msg.command);
    }

    #[test]
    fn test_prefix_server_vs_nick() {
        assert_eq!(
            Prefix::parse("irc.example.net"),
            Prefix::ServerName("irc.example.net".to_string())
        );
        assert_eq!(
            Prefix::parse("Drone!drone@tracker"),
            Prefix::Nickname {
                nick: "Drone".to_string(),
                user: Some("drone".to_string()),
                host: Some("tracker".to_string()),
            }
        );
    }
}
