//! Serde defaulting functions for configuration fields.

pub fn default_true() -> bool {
    true
}

pub fn default_host() -> String {
    "127.0.0.1".to_string()
}

pub fn default_port() -> u16 {
    7474
}

pub fn default_base_url() -> String {
    "/".to_string()
}

pub fn default_database_path() -> String {
    "snatchd.db".to_string()
}

/// Window inside which a second push for the same (indexer, release) is a duplicate.
pub fn default_dedup_window_secs() -> u64 {
    6 * 3600
}

pub fn default_push_retries() -> u32 {
    3
}

pub fn default_push_retry_delay_secs() -> u64 {
    5
}
