//! Release pipeline: persist, dedup, filter, push.
//!
//! Every parsed release flows through here. The pipeline records a status
//! event for each transition so the operator can see why a release did or
//! did not reach a download client.

mod clients;

pub use clients::{DownloadClient, PushError, WatchDirClient, build_clients};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::db::{Database, DbError, Filter, Release, ReleasePushStatus};
use crate::filter;
use crate::metrics;

/// Where IRC handlers hand off parsed releases.
///
/// Deliberately narrow so handlers depend on this single capability
/// instead of the whole pipeline (or worse, the supervisor).
pub trait ReleaseSink: Send + Sync {
    /// Accept a release for processing. Must not block the caller.
    fn deliver(&self, release: Release);
}

/// The release pipeline.
#[derive(Clone)]
pub struct ReleasePipeline {
    db: Database,
    clients: Arc<HashMap<String, Arc<dyn DownloadClient>>>,
    config: PipelineConfig,
}

impl ReleasePipeline {
    pub fn new(
        db: Database,
        clients: HashMap<String, Arc<dyn DownloadClient>>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            db,
            clients: Arc::new(clients),
            config,
        }
    }

    /// Run one release through the pipeline.
    pub async fn process(&self, release: Release) -> Result<ReleasePushStatus, DbError> {
        let repo = self.db.releases();

        let mut release = release;
        release.id = repo.store(&release).await?;
        repo.append_status(release.id, ReleasePushStatus::Pending, None, None, None)
            .await?;

        // Dedup is best effort: duplicates are detected and marked, not prevented.
        if repo
            .has_recent_terminal_status(
                &release.indexer,
                &release.name,
                self.config.dedup_window_secs,
            )
            .await?
        {
            info!(
                indexer = %release.indexer,
                release = %release.name,
                "duplicate release inside dedup window"
            );
            repo.append_status(release.id, ReleasePushStatus::Duplicate, None, None, None)
                .await?;
            return Ok(ReleasePushStatus::Duplicate);
        }

        let filters = self.db.filters().list_enabled().await?;
        let result = filter::match_release(&filters, &release);
        let Some(matched) = result.matched else {
            let reasons = if result.rejections.is_empty() {
                "no enabled filters".to_string()
            } else {
                result.rejections.join("; ")
            };
            debug!(release = %release.name, reasons = %reasons, "release rejected by filters");
            metrics::RELEASES_FILTER_REJECTED.inc();
            repo.append_status(
                release.id,
                ReleasePushStatus::FilterRejected,
                Some(&reasons),
                None,
                None,
            )
            .await?;
            return Ok(ReleasePushStatus::FilterRejected);
        };

        self.push(&release, matched).await
    }

    /// Push a matched release to its filter's download client.
    async fn push(
        &self,
        release: &Release,
        matched: &Filter,
    ) -> Result<ReleasePushStatus, DbError> {
        let repo = self.db.releases();
        let client_name = matched.action_client.as_str();

        let Some(client) = self.clients.get(client_name) else {
            error!(client = client_name, filter = %matched.name, "unknown download client");
            repo.append_status(
                release.id,
                ReleasePushStatus::PushError,
                Some(&format!("unknown download client {:?}", client_name)),
                Some(client_name),
                Some(&matched.name),
            )
            .await?;
            metrics::RELEASES_PUSH_ERRORS.inc();
            return Ok(ReleasePushStatus::PushError);
        };

        let mut attempt: u32 = 0;
        loop {
            match client.push(release, matched).await {
                Ok(()) => {
                    info!(
                        release = %release.name,
                        client = client_name,
                        filter = %matched.name,
                        "release pushed"
                    );
                    metrics::RELEASES_PUSH_APPROVED.inc();
                    repo.append_status(
                        release.id,
                        ReleasePushStatus::PushApproved,
                        None,
                        Some(client_name),
                        Some(&matched.name),
                    )
                    .await?;
                    return Ok(ReleasePushStatus::PushApproved);
                }
                Err(PushError::Rejected(reason)) => {
                    info!(release = %release.name, reason = %reason, "push rejected");
                    repo.append_status(
                        release.id,
                        ReleasePushStatus::PushRejected,
                        Some(&reason),
                        Some(client_name),
                        Some(&matched.name),
                    )
                    .await?;
                    return Ok(ReleasePushStatus::PushRejected);
                }
                Err(PushError::Permanent(reason)) => {
                    error!(release = %release.name, reason = %reason, "push failed permanently");
                    metrics::RELEASES_PUSH_ERRORS.inc();
                    repo.append_status(
                        release.id,
                        ReleasePushStatus::PushError,
                        Some(&reason),
                        Some(client_name),
                        Some(&matched.name),
                    )
                    .await?;
                    return Ok(ReleasePushStatus::PushError);
                }
                Err(PushError::Transient(reason)) => {
                    attempt += 1;
                    if attempt > self.config.push_retries {
                        error!(
                            release = %release.name,
                            attempts = attempt,
                            reason = %reason,
                            "push failed after retries"
                        );
                        metrics::RELEASES_PUSH_ERRORS.inc();
                        repo.append_status(
                            release.id,
                            ReleasePushStatus::PushError,
                            Some(&reason),
                            Some(client_name),
                            Some(&matched.name),
                        )
                        .await?;
                        return Ok(ReleasePushStatus::PushError);
                    }
                    warn!(
                        release = %release.name,
                        attempt = attempt,
                        reason = %reason,
                        "transient push failure, retrying"
                    );
                    tokio::time::sleep(Duration::from_secs(
                        self.config.push_retry_delay_secs * attempt as u64,
                    ))
                    .await;
                }
            }
        }
    }
}

impl ReleaseSink for ReleasePipeline {
    fn deliver(&self, release: Release) {
        // One task per submission; repository errors end there.
        let pipeline = self.clone();
        tokio::spawn(async move {
            if let Err(e) = pipeline.process(release).await {
                error!(error = %e, "release pipeline failed");
            }
        });
    }
}
