//! Release pipeline: dedup, filter outcomes, push retry behavior.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use snatchd::config::PipelineConfig;
use snatchd::db::{Database, Filter, Release, ReleasePushStatus};
use snatchd::pipeline::{DownloadClient, PushError, ReleasePipeline};

/// A download client scripted to fail a number of times first.
struct ScriptedClient {
    attempts: AtomicU32,
    failures: u32,
    error: fn(String) -> PushError,
}

impl ScriptedClient {
    fn succeeding() -> Arc<Self> {
        Arc::new(Self {
            attempts: AtomicU32::new(0),
            failures: 0,
            error: PushError::Transient,
        })
    }

    fn failing(failures: u32, error: fn(String) -> PushError) -> Arc<Self> {
        Arc::new(Self {
            attempts: AtomicU32::new(0),
            failures,
            error,
        })
    }

    fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DownloadClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn push(&self, _release: &Release, _filter: &Filter) -> Result<(), PushError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            Err((self.error)(format!("scripted failure {}", attempt)))
        } else {
            Ok(())
        }
    }
}

fn release(name: &str) -> Release {
    Release {
        id: 0,
        indexer: "mocktracker".to_string(),
        name: name.to_string(),
        category: "Apps".to_string(),
        year: String::new(),
        tags: String::new(),
        size: None,
        freeleech: false,
        download_url: "https://mock.tracker/download/1".to_string(),
        timestamp: Utc::now(),
        vars: HashMap::new(),
    }
}

fn match_all_filter() -> Filter {
    Filter {
        id: 0,
        name: "grab everything".to_string(),
        enabled: true,
        indexers: vec![],
        match_releases: None,
        except_releases: None,
        match_categories: None,
        except_categories: None,
        match_tags: None,
        except_tags: None,
        min_year: None,
        max_year: None,
        min_size: None,
        max_size: None,
        resolutions: None,
        sources: None,
        codecs: None,
        freeleech: false,
        action_client: "scripted".to_string(),
        action_category: None,
    }
}

fn pipeline_config() -> PipelineConfig {
    PipelineConfig {
        dedup_window_secs: 3600,
        push_retries: 3,
        push_retry_delay_secs: 0,
    }
}

async fn pipeline_with(
    db: &Database,
    client: Arc<ScriptedClient>,
) -> ReleasePipeline {
    let mut clients: HashMap<String, Arc<dyn DownloadClient>> = HashMap::new();
    clients.insert("scripted".to_string(), client);
    ReleasePipeline::new(db.clone(), clients, pipeline_config())
}

async fn statuses_of(db: &Database, release_id: i64) -> Vec<ReleasePushStatus> {
    db.releases()
        .statuses(release_id)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.status)
        .collect()
}

#[tokio::test]
async fn duplicate_inside_window_is_marked_not_pushed() {
    let db = Database::new(":memory:").await.unwrap();
    db.filters().store(&match_all_filter()).await.unwrap();
    let client = ScriptedClient::succeeding();
    let pipeline = pipeline_with(&db, client.clone()).await;

    let first = pipeline.process(release("Same.Release-GRP")).await.unwrap();
    assert_eq!(first, ReleasePushStatus::PushApproved);

    let second = pipeline.process(release("Same.Release-GRP")).await.unwrap();
    assert_eq!(second, ReleasePushStatus::Duplicate);

    // Both rows persist, each with its own status history.
    let rows = db
        .releases()
        .query(&Default::default())
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);

    assert_eq!(
        statuses_of(&db, rows[1].release.id).await,
        vec![ReleasePushStatus::Pending, ReleasePushStatus::PushApproved]
    );
    assert_eq!(
        statuses_of(&db, rows[0].release.id).await,
        vec![ReleasePushStatus::Pending, ReleasePushStatus::Duplicate]
    );

    // The client only saw the first release.
    assert_eq!(client.attempts(), 1);
}

#[tokio::test]
async fn non_approved_terminal_status_still_dedups() {
    let db = Database::new(":memory:").await.unwrap();
    let mut filter = match_all_filter();
    filter.match_releases = Some("*FLAC*".to_string());
    db.filters().store(&filter).await.unwrap();

    let client = ScriptedClient::succeeding();
    let pipeline = pipeline_with(&db, client.clone()).await;

    let first = pipeline.process(release("Rejected.Twice-GRP")).await.unwrap();
    assert_eq!(first, ReleasePushStatus::FilterRejected);

    // A re-announce inside the window is a duplicate of the rejected
    // release, not a second trip through filter and push.
    let second = pipeline.process(release("Rejected.Twice-GRP")).await.unwrap();
    assert_eq!(second, ReleasePushStatus::Duplicate);

    let rows = db.releases().query(&Default::default()).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(
        statuses_of(&db, rows[0].release.id).await,
        vec![ReleasePushStatus::Pending, ReleasePushStatus::Duplicate]
    );
    assert_eq!(client.attempts(), 0);
}

#[tokio::test]
async fn different_names_are_not_duplicates() {
    let db = Database::new(":memory:").await.unwrap();
    db.filters().store(&match_all_filter()).await.unwrap();
    let client = ScriptedClient::succeeding();
    let pipeline = pipeline_with(&db, client.clone()).await;

    pipeline.process(release("First.Release-GRP")).await.unwrap();
    let second = pipeline.process(release("Second.Release-GRP")).await.unwrap();

    assert_eq!(second, ReleasePushStatus::PushApproved);
    assert_eq!(client.attempts(), 2);
}

#[tokio::test]
async fn no_matching_filter_records_rejection_reason() {
    let db = Database::new(":memory:").await.unwrap();
    let mut filter = match_all_filter();
    filter.match_releases = Some("*FLAC*".to_string());
    db.filters().store(&filter).await.unwrap();

    let pipeline = pipeline_with(&db, ScriptedClient::succeeding()).await;
    let status = pipeline.process(release("Some.Movie.x264-GRP")).await.unwrap();
    assert_eq!(status, ReleasePushStatus::FilterRejected);

    let rows = db.releases().query(&Default::default()).await.unwrap();
    let events = db.releases().statuses(rows[0].release.id).await.unwrap();
    let rejected = events
        .iter()
        .find(|e| e.status == ReleasePushStatus::FilterRejected)
        .unwrap();
    assert!(
        rejected
            .rejections
            .as_deref()
            .unwrap_or_default()
            .contains("grab everything")
    );
}

#[tokio::test]
async fn transient_errors_are_retried_until_success() {
    let db = Database::new(":memory:").await.unwrap();
    db.filters().store(&match_all_filter()).await.unwrap();

    let client = ScriptedClient::failing(2, PushError::Transient);
    let pipeline = pipeline_with(&db, client.clone()).await;

    let status = pipeline.process(release("Retry.Me-GRP")).await.unwrap();
    assert_eq!(status, ReleasePushStatus::PushApproved);
    assert_eq!(client.attempts(), 3);
}

#[tokio::test]
async fn transient_errors_exhaust_into_push_error() {
    let db = Database::new(":memory:").await.unwrap();
    db.filters().store(&match_all_filter()).await.unwrap();

    let client = ScriptedClient::failing(u32::MAX, PushError::Transient);
    let pipeline = pipeline_with(&db, client.clone()).await;

    let status = pipeline.process(release("Never.Works-GRP")).await.unwrap();
    assert_eq!(status, ReleasePushStatus::PushError);
    // Initial attempt plus the configured retries.
    assert_eq!(client.attempts(), 4);
}

#[tokio::test]
async fn permanent_errors_are_not_retried() {
    let db = Database::new(":memory:").await.unwrap();
    db.filters().store(&match_all_filter()).await.unwrap();

    let client = ScriptedClient::failing(u32::MAX, PushError::Permanent);
    let pipeline = pipeline_with(&db, client.clone()).await;

    let status = pipeline.process(release("Auth.Broken-GRP")).await.unwrap();
    assert_eq!(status, ReleasePushStatus::PushError);
    assert_eq!(client.attempts(), 1);
}

#[tokio::test]
async fn rejected_release_gets_push_rejected() {
    let db = Database::new(":memory:").await.unwrap();
    db.filters().store(&match_all_filter()).await.unwrap();

    let client = ScriptedClient::failing(u32::MAX, PushError::Rejected);
    let pipeline = pipeline_with(&db, client.clone()).await;

    let status = pipeline.process(release("Unwanted-GRP")).await.unwrap();
    assert_eq!(status, ReleasePushStatus::PushRejected);
    assert_eq!(client.attempts(), 1);
}

#[tokio::test]
async fn unknown_client_is_a_push_error() {
    let db = Database::new(":memory:").await.unwrap();
    let mut filter = match_all_filter();
    filter.action_client = "missing".to_string();
    db.filters().store(&filter).await.unwrap();

    let pipeline = ReleasePipeline::new(db.clone(), HashMap::new(), pipeline_config());
    let status = pipeline.process(release("Orphan-GRP")).await.unwrap();
    assert_eq!(status, ReleasePushStatus::PushError);
}
