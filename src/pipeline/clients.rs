//! Download client drivers.
//!
//! The pipeline talks to download clients through the narrow
//! [`DownloadClient`] contract. One driver ships in core: `watchdir`,
//! which fetches the torrent file and drops it into a directory watched
//! by the real client. Everything richer lives outside the core.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::config::{ClientConfig, ClientKind};
use crate::db::{Filter, Release};

/// Push failures, classified for retry behavior.
#[derive(Debug, Error)]
pub enum PushError {
    /// The client looked at the release and said no. Not retried.
    #[error("rejected by client: {0}")]
    Rejected(String),
    /// Network-ish failure worth retrying.
    #[error("transient push failure: {0}")]
    Transient(String),
    /// Auth failure or other 4xx. Retrying cannot help.
    #[error("permanent push failure: {0}")]
    Permanent(String),
}

/// A download client the pipeline can push matched releases to.
#[async_trait]
pub trait DownloadClient: Send + Sync {
    fn name(&self) -> &str;

    /// Submit a release according to the filter's action.
    async fn push(&self, release: &Release, filter: &Filter) -> Result<(), PushError>;
}

/// Fetches the torrent file and writes it into a watch directory.
pub struct WatchDirClient {
    name: String,
    directory: PathBuf,
    http: reqwest::Client,
}

impl WatchDirClient {
    const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(name: &str, directory: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Self::FETCH_TIMEOUT)
            .build()?;

        Ok(Self {
            name: name.to_string(),
            directory: PathBuf::from(directory),
            http,
        })
    }
}

#[async_trait]
impl DownloadClient for WatchDirClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn push(&self, release: &Release, filter: &Filter) -> Result<(), PushError> {
        let response = self
            .http
            .get(&release.download_url)
            .send()
            .await
            .map_err(|e| PushError::Transient(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(PushError::Permanent(format!(
                "tracker refused download: {}",
                status
            )));
        }
        if status.is_client_error() {
            return Err(PushError::Permanent(format!("tracker returned {}", status)));
        }
        if !status.is_success() {
            return Err(PushError::Transient(format!("tracker returned {}", status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| PushError::Transient(e.to_string()))?;

        let target = match &filter.action_category {
            Some(category) if !category.is_empty() => self.directory.join(category),
            _ => self.directory.clone(),
        };
        tokio::fs::create_dir_all(&target)
            .await
            .map_err(|e| PushError::Permanent(format!("cannot create {:?}: {}", target, e)))?;

        let path = target.join(format!("{}.torrent", sanitize_filename(&release.name)));
        tokio::fs::write(&path, &body)
            .await
            .map_err(|e| PushError::Permanent(format!("cannot write {:?}: {}", path, e)))?;

        debug!(client = %self.name, path = %path.display(), "wrote torrent file");
        Ok(())
    }
}

/// Build the client registry from config blocks.
pub fn build_clients(
    configs: &HashMap<String, ClientConfig>,
) -> anyhow::Result<HashMap<String, Arc<dyn DownloadClient>>> {
    let mut clients: HashMap<String, Arc<dyn DownloadClient>> = HashMap::new();
    for (name, config) in configs {
        match config.kind {
            ClientKind::Watchdir => {
                let directory = config.directory.as_deref().unwrap_or_default();
                clients.insert(name.clone(), Arc::new(WatchDirClient::new(name, directory)?));
            }
        }
    }
    Ok(clients)
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0' => '_',
            other => other,
        })
        .collect()
}
