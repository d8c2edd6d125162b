//! Persisted row types shared across the daemon.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// NickServ identity used for registration and identification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NickServ {
    pub account: String,
    #[serde(default)]
    pub password: Option<String>,
}

/// An IRC network the bot maintains a session on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub server: String,
    pub port: u16,
    #[serde(default)]
    pub tls: bool,
    /// Server password, sent with PASS before registration.
    #[serde(default)]
    pub pass: Option<String>,
    pub nickserv: NickServ,
    /// Invite-command template rendered with indexer settings.
    #[serde(default)]
    pub invite_command: Option<String>,
    #[serde(default)]
    pub channels: Vec<IrcChannel>,
}

impl Network {
    /// Enabled channels only, the set a live handler should be joined to.
    pub fn enabled_channels(&self) -> impl Iterator<Item = &IrcChannel> {
        self.channels.iter().filter(|ch| ch.enabled)
    }
}

/// A channel on a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrcChannel {
    #[serde(default)]
    pub id: i64,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Channel names are matched case-insensitively; stored as given.
    pub name: String,
    #[serde(default)]
    pub password: Option<String>,
    /// Joined but muted: announces on a detached channel are ignored.
    #[serde(default)]
    pub detached: bool,
}

/// A release filter: predicates plus a download action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Indexer identifiers this filter applies to; empty means all.
    #[serde(default)]
    pub indexers: Vec<String>,
    /// Comma-separated wildcard patterns matched against the release name.
    #[serde(default)]
    pub match_releases: Option<String>,
    #[serde(default)]
    pub except_releases: Option<String>,
    #[serde(default)]
    pub match_categories: Option<String>,
    #[serde(default)]
    pub except_categories: Option<String>,
    #[serde(default)]
    pub match_tags: Option<String>,
    #[serde(default)]
    pub except_tags: Option<String>,
    #[serde(default)]
    pub min_year: Option<i64>,
    #[serde(default)]
    pub max_year: Option<i64>,
    /// Size bounds in bytes; only enforced when the announce carries a size.
    #[serde(default)]
    pub min_size: Option<i64>,
    #[serde(default)]
    pub max_size: Option<i64>,
    #[serde(default)]
    pub resolutions: Option<String>,
    #[serde(default)]
    pub sources: Option<String>,
    #[serde(default)]
    pub codecs: Option<String>,
    #[serde(default)]
    pub freeleech: bool,
    /// Name of the download client block to push matches to.
    pub action_client: String,
    #[serde(default)]
    pub action_category: Option<String>,
}

/// A release parsed from an announce line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    #[serde(default)]
    pub id: i64,
    pub indexer: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub freeleech: bool,
    pub download_url: String,
    pub timestamp: DateTime<Utc>,
    /// Every variable the parser bound, verbatim, for downstream rules.
    /// In-memory only; not persisted.
    #[serde(skip)]
    pub vars: HashMap<String, String>,
}

/// Lifecycle status of a release in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleasePushStatus {
    Pending,
    Duplicate,
    FilterRejected,
    PushApproved,
    PushRejected,
    PushError,
}

impl ReleasePushStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Duplicate => "DUPLICATE",
            Self::FilterRejected => "FILTER_REJECTED",
            Self::PushApproved => "PUSH_APPROVED",
            Self::PushRejected => "PUSH_REJECTED",
            Self::PushError => "PUSH_ERROR",
        }
    }
}

impl fmt::Display for ReleasePushStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReleasePushStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "DUPLICATE" => Ok(Self::Duplicate),
            "FILTER_REJECTED" => Ok(Self::FilterRejected),
            "PUSH_APPROVED" => Ok(Self::PushApproved),
            "PUSH_REJECTED" => Ok(Self::PushRejected),
            "PUSH_ERROR" => Ok(Self::PushError),
            other => Err(format!("unknown release status: {}", other)),
        }
    }
}

/// One status event in a release's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseActionStatus {
    pub id: i64,
    pub release_id: i64,
    pub status: ReleasePushStatus,
    #[serde(default)]
    pub rejections: Option<String>,
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub filter: Option<String>,
    pub timestamp: DateTime<Utc>,
}
