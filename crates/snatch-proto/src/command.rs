//! IRC command types (client subset).

/// Numeric replies the client cares about.
///
/// The full numeric catalogue is a server concern; a client driving a
/// registration handshake only needs a handful of them.
pub mod response {
    /// First message of the welcome burst; registration is complete.
    pub const RPL_WELCOME: u16 = 1;
    /// End of NAMES list, sent after a successful JOIN.
    pub const RPL_ENDOFNAMES: u16 = 366;
    /// End of MOTD.
    pub const RPL_ENDOFMOTD: u16 = 376;
    /// Server has no MOTD; still marks the end of the welcome burst.
    pub const ERR_NOMOTD: u16 = 422;
    /// Requested nickname is taken.
    pub const ERR_NICKNAMEINUSE: u16 = 433;
    /// Server password was wrong.
    pub const ERR_PASSWDMISMATCH: u16 = 464;
}

/// An IRC command with typed parameters.
///
/// Commands the bot neither sends nor inspects are preserved verbatim in
/// [`Command::Raw`] so they can still be logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// PASS password
    PASS(String),
    /// NICK nickname
    NICK(String),
    /// USER username 0 * :realname
    USER(String, String),
    /// PRIVMSG target :text
    PRIVMSG(String, String),
    /// NOTICE target :text
    NOTICE(String, String),
    /// JOIN channel [key]
    JOIN(String, Option<String>),
    /// PART channel [reason]
    PART(String, Option<String>),
    /// INVITE nickname channel
    INVITE(String, String),
    /// PING token
    PING(String),
    /// PONG token
    PONG(String),
    /// QUIT [reason]
    QUIT(Option<String>),
    /// ERROR :message (server is closing the link)
    ERROR(String),
    /// Numeric reply with its parameters.
    Response(u16, Vec<String>),
    /// Anything else, verbatim.
    Raw(String, Vec<String>),
}

impl Command {
    /// Build a command from a verb and its already-split parameters.
    pub fn from_parts(verb: &str, mut params: Vec<String>) -> Command {
        if verb.len() == 3 {
            if let Ok(code) = verb.parse::<u16>() {
                return Command::Response(code, params);
            }
        }

        fn one(params: &mut Vec<String>) -> String {
            if params.is_empty() {
                String::new()
            } else {
                params.remove(0)
            }
        }

        match verb.to_ascii_uppercase().as_str() {
            "PASS" => Command::PASS(one(&mut params)),
            "NICK" => Command::NICK(one(&mut params)),
            "USER" => {
                let user = one(&mut params);
                let realname = params.pop().unwrap_or_default();
                Command::USER(user, realname)
            }
            "PRIVMSG" => {
                let target = one(&mut params);
                Command::PRIVMSG(target, one(&mut params))
            }
            "NOTICE" => {
                let target = one(&mut params);
                Command::NOTICE(target, one(&mut params))
            }
            "JOIN" => {
                let channel = one(&mut params);
                Command::JOIN(channel, params.pop())
            }
            "PART" => {
                let channel = one(&mut params);
                Command::PART(channel, params.pop())
            }
            "INVITE" => {
                let nick = one(&mut params);
                Command::INVITE(nick, one(&mut params))
            }
            "PING" => Command::PING(one(&mut params)),
            "PONG" => Command::PONG(params.pop().unwrap_or_default()),
            "QUIT" => Command::QUIT(params.pop()),
            "ERROR" => Command::ERROR(one(&mut params)),
            _ => Command::Raw(verb.to_string(), params),
        }
    }

    /// The command verb as it appears on the wire.
    pub fn verb(&self) -> String {
        match self {
            Command::PASS(_) => "PASS".into(),
            Command::NICK(_) => "NICK".into(),
            Command::USER(_, _) => "USER".into(),
            Command::PRIVMSG(_, _) => "PRIVMSG".into(),
            Command::NOTICE(_, _) => "NOTICE".into(),
            Command::JOIN(_, _) => "JOIN".into(),
            Command::PART(_, _) => "PART".into(),
            Command::INVITE(_, _) => "INVITE".into(),
            Command::PING(_) => "PING".into(),
            Command::PONG(_) => "PONG".into(),
            Command::QUIT(_) => "QUIT".into(),
            Command::ERROR(_) => "ERROR".into(),
            Command::Response(code, _) => format!("{:03}", code),
            Command::Raw(verb, _) => verb.clone(),
        }
    }

    /// Parameters in wire order. The last one may need trailing form.
    pub fn params(&self) -> Vec<String> {
        match self {
            Command::PASS(p) => vec![p.clone()],
            Command::NICK(n) => vec![n.clone()],
            Command::USER(user, realname) => vec![
                user.clone(),
                "0".to_string(),
                "*".to_string(),
                realname.clone(),
            ],
            Command::PRIVMSG(target, text) => vec![target.clone(), text.clone()],
            Command::NOTICE(target, text) => vec![target.clone(), text.clone()],
            Command::JOIN(channel, Some(key)) => vec![channel.clone(), key.clone()],
            Command::JOIN(channel, None) => vec![channel.clone()],
            Command::PART(channel, Some(reason)) => vec![channel.clone(), reason.clone()],
            Command::PART(channel, None) => vec![channel.clone()],
            Command::INVITE(nick, channel) => vec![nick.clone(), channel.clone()],
            Command::PING(token) => vec![token.clone()],
            Command::PONG(token) => vec![token.clone()],
            Command::QUIT(Some(reason)) => vec![reason.clone()],
            Command::QUIT(None) => vec![],
            Command::ERROR(msg) => vec![msg.clone()],
            Command::Response(_, params) => params.clone(),
            Command::Raw(_, params) => params.clone(),
        }
    }
}
