//! Configuration validation.
//!
//! Runs once at startup, after parsing and before anything binds or
//! connects. Collects every problem instead of stopping at the first.

use super::types::{ClientKind, Config};

/// Validate the configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if config.server.host.is_empty() {
        errors.push("server.host must not be empty".to_string());
    }
    if config.server.port == 0 {
        errors.push("server.port must not be 0".to_string());
    }
    if !config.server.base_url.starts_with('/') {
        errors.push(format!(
            "server.base_url must start with '/': {:?}",
            config.server.base_url
        ));
    }

    if config.auth.username.is_empty() {
        errors.push("auth.username must not be empty".to_string());
    }
    if config.auth.password_hash.is_empty() {
        errors.push("auth.password_hash must not be empty".to_string());
    } else if !config.auth.password_hash.starts_with("$argon2") {
        errors.push("auth.password_hash must be an argon2 PHC string".to_string());
    }

    if config.database.path.is_empty() {
        errors.push("database.path must not be empty".to_string());
    }

    for (name, client) in &config.clients {
        match client.kind {
            ClientKind::Watchdir => {
                if client.directory.as_deref().unwrap_or("").is_empty() {
                    errors.push(format!("clients.{}: watchdir requires a directory", name));
                }
            }
        }
    }

    if config.pipeline.dedup_window_secs == 0 {
        errors.push("pipeline.dedup_window_secs must not be 0".to_string());
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
