//! Configuration type definitions.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use super::defaults::{
    default_base_url, default_database_path, default_dedup_window_secs, default_host,
    default_port, default_push_retries, default_push_retry_delay_secs, default_true,
};

/// Errors loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Download client blocks keyed by name, referenced from filter actions.
    #[serde(default)]
    pub clients: HashMap<String, ClientConfig>,
    /// Per-indexer user settings (passkey, authkey, ...) keyed by indexer
    /// identifier, merged into the announce parser's variable dictionary.
    #[serde(default)]
    pub indexers: HashMap<String, HashMap<String, String>>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(Path::new(path)).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

/// HTTP control-plane listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// URL prefix the API and session cookie are scoped under.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

impl ServerConfig {
    /// Base URL as a route prefix: leading slash, no trailing slash,
    /// empty string for the root.
    pub fn base_path(&self) -> String {
        let trimmed = self.base_url.trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        }
    }

    /// Cookie scoping path; the root base URL maps to `/`.
    pub fn cookie_path(&self) -> String {
        let base = self.base_path();
        if base.is_empty() { "/".to_string() } else { base }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Operator credentials for the HTTP control plane.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub username: String,
    /// Argon2 PHC-format hash of the operator password.
    pub password_hash: String,
}

/// Release pipeline tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: u64,
    #[serde(default = "default_push_retries")]
    pub push_retries: u32,
    #[serde(default = "default_push_retry_delay_secs")]
    pub push_retry_delay_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dedup_window_secs: default_dedup_window_secs(),
            push_retries: default_push_retries(),
            push_retry_delay_secs: default_push_retry_delay_secs(),
        }
    }
}

/// Download client kinds the daemon can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    /// Fetch the torrent file and drop it into a watch directory.
    Watchdir,
}

/// A download client block.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(rename = "type")]
    pub kind: ClientKind,
    /// Target directory for `watchdir` clients.
    pub directory: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let cfg: Config = toml::from_str(
            r#"
            [server]
            port = 8080

            [auth]
            username = "admin"
            password_hash = "$argon2id$v=19$m=19456,t=2,p=1$abc$def"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.database.path, "snatchd.db");
        assert_eq!(cfg.pipeline.push_retries, 3);
        assert!(cfg.clients.is_empty());
    }

    #[test]
    fn test_parse_clients_and_indexers() {
        let cfg: Config = toml::from_str(
            r#"
            [server]

            [auth]
            username = "admin"
            password_hash = "x"

            [clients.watch]
            type = "watchdir"
            directory = "/downloads/watch"

            [indexers.redacted]
            authkey = "AK"
            torrent_pass = "TP"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.clients["watch"].kind, ClientKind::Watchdir);
        assert_eq!(cfg.indexers["redacted"]["authkey"], "AK");
    }

    #[test]
    fn test_base_path_normalization() {
        let mk = |base: &str| ServerConfig {
            host: default_host(),
            port: default_port(),
            base_url: base.to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
        };

        assert_eq!(mk("/").base_path(), "");
        assert_eq!(mk("/").cookie_path(), "/");
        assert_eq!(mk("/snatchd/").base_path(), "/snatchd");
        assert_eq!(mk("snatchd").base_path(), "/snatchd");
        assert_eq!(mk("/snatchd/").cookie_path(), "/snatchd");
    }
}
