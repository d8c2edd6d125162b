//! snatch-proto - IRC protocol support for announce bots.
//!
//! A deliberately small client-side subset of the IRC protocol: newline
//! framing, message parsing and serialization, and a tokio transport over
//! plain TCP or TLS. Server-side concerns (numerics catalogues, capability
//! negotiation, IRCv3 tags) are out of scope; message tags on incoming
//! lines are tolerated and discarded.

pub mod command;
pub mod error;
#[cfg(feature = "tokio")]
pub mod irc;
#[cfg(feature = "tokio")]
pub mod line;
pub mod message;
#[cfg(feature = "tokio")]
pub mod transport;

pub use command::{Command, response};
pub use error::ProtocolError;
#[cfg(feature = "tokio")]
pub use irc::IrcCodec;
pub use message::{Message, Prefix};
#[cfg(feature = "tokio")]
pub use transport::Transport;
