//! IRC session management: per-network handlers and their supervisor.

mod handler;
mod supervisor;

pub use handler::{AnnounceBinding, IrcHandler};
pub use supervisor::{NetworkSupervisor, NetworkWithHealth};

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::Network;

/// Identity of a handler: one live session per (server, account).
///
/// Both parts are lowercased so the same physical server can host several
/// logical handlers under different identities without case aliasing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerKey {
    pub server: String,
    pub account: String,
}

impl HandlerKey {
    pub fn new(server: &str, account: &str) -> Self {
        Self {
            server: server.to_lowercase(),
            account: account.to_lowercase(),
        }
    }

    pub fn from_network(network: &Network) -> Self {
        Self::new(&network.server, &network.nickserv.account)
    }
}

impl fmt::Display for HandlerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.server, self.account)
    }
}

/// Runtime health of one channel, owned exclusively by its handler.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelHealth {
    pub name: String,
    /// True once the server confirmed the join.
    pub monitoring: bool,
    pub monitoring_since: Option<DateTime<Utc>>,
    pub last_announce: Option<DateTime<Utc>>,
}

impl ChannelHealth {
    fn idle(name: &str) -> Self {
        Self {
            name: name.to_string(),
            monitoring: false,
            monitoring_since: None,
            last_announce: None,
        }
    }
}

/// Exponential reconnect backoff with jitter.
///
/// 15s initial, doubling to a 600s cap, ±20% jitter so a tracker restart
/// does not get every bot reconnecting in lockstep.
pub struct Backoff {
    attempt: u32,
}

impl Backoff {
    const INITIAL_SECS: f64 = 15.0;
    const FACTOR: f64 = 2.0;
    const CAP_SECS: f64 = 600.0;
    const JITTER: f64 = 0.2;

    pub fn new() -> Self {
        Self { attempt: 0 }
    }

    /// Delay before the next reconnect attempt.
    pub fn next_delay(&mut self) -> Duration {
        use rand::Rng;

        let base = (Self::INITIAL_SECS * Self::FACTOR.powi(self.attempt as i32))
            .min(Self::CAP_SECS);
        self.attempt = self.attempt.saturating_add(1);

        let jitter = rand::thread_rng().gen_range(1.0 - Self::JITTER..=1.0 + Self::JITTER);
        Duration::from_secs_f64(base * jitter)
    }

    /// Reset after a successful registration.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}
