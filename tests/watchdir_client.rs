//! The watchdir download client against a scripted tracker endpoint.

use std::collections::HashMap;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use chrono::Utc;
use snatchd::db::{Filter, Release};
use snatchd::pipeline::{DownloadClient, PushError, WatchDirClient};

const TORRENT_BYTES: &[u8] = b"d8:announce18:https://mock/tracke";

async fn spawn_tracker() -> std::net::SocketAddr {
    let app = Router::new()
        .route("/dl/ok", get(|| async { TORRENT_BYTES.to_vec() }))
        .route("/dl/denied", get(|| async { StatusCode::FORBIDDEN }))
        .route("/dl/gone", get(|| async { StatusCode::NOT_FOUND }))
        .route(
            "/dl/broken",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

fn release(url: String, name: &str) -> Release {
    Release {
        id: 0,
        indexer: "mocktracker".to_string(),
        name: name.to_string(),
        category: String::new(),
        year: String::new(),
        tags: String::new(),
        size: None,
        freeleech: false,
        download_url: url,
        timestamp: Utc::now(),
        vars: HashMap::new(),
    }
}

fn filter(category: Option<&str>) -> Filter {
    Filter {
        id: 0,
        name: "grab".to_string(),
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
        action_client: "watch".to_string(),
        action_category: category.map(String::from),
    }
}

#[tokio::test]
async fn writes_torrent_file_into_watch_directory() {
    let addr = spawn_tracker().await;
    let dir = tempfile::tempdir().unwrap();
    let client = WatchDirClient::new("watch", dir.path().to_str().unwrap()).unwrap();

    client
        .push(
            &release(format!("http://{}/dl/ok", addr), "Cool.Release-GRP"),
            &filter(None),
        )
        .await
        .unwrap();

    let written = std::fs::read(dir.path().join("Cool.Release-GRP.torrent")).unwrap();
    assert_eq!(written, TORRENT_BYTES);
}

#[tokio::test]
async fn action_category_becomes_a_subdirectory() {
    let addr = spawn_tracker().await;
    let dir = tempfile::tempdir().unwrap();
    let client = WatchDirClient::new("watch", dir.path().to_str().unwrap()).unwrap();

    client
        .push(
            &release(format!("http://{}/dl/ok", addr), "Sorted.Release-GRP"),
            &filter(Some("music")),
        )
        .await
        .unwrap();

    assert!(
        dir.path()
            .join("music")
            .join("Sorted.Release-GRP.torrent")
            .exists()
    );
}

#[tokio::test]
async fn auth_refusal_is_permanent() {
    let addr = spawn_tracker().await;
    let dir = tempfile::tempdir().unwrap();
    let client = WatchDirClient::new("watch", dir.path().to_str().unwrap()).unwrap();

    let err = client
        .push(
            &release(format!("http://{}/dl/denied", addr), "Denied-GRP"),
            &filter(None),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PushError::Permanent(_)));
}

#[tokio::test]
async fn missing_torrent_is_permanent() {
    let addr = spawn_tracker().await;
    let dir = tempfile::tempdir().unwrap();
    let client = WatchDirClient::new("watch", dir.path().to_str().unwrap()).unwrap();

    let err = client
        .push(
            &release(format!("http://{}/dl/gone", addr), "Gone-GRP"),
            &filter(None),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PushError::Permanent(_)));
}

#[tokio::test]
async fn server_error_is_transient() {
    let addr = spawn_tracker().await;
    let dir = tempfile::tempdir().unwrap();
    let client = WatchDirClient::new("watch", dir.path().to_str().unwrap()).unwrap();

    let err = client
        .push(
            &release(format!("http://{}/dl/broken", addr), "Broken-GRP"),
            &filter(None),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PushError::Transient(_)));
}

#[tokio::test]
async fn unreachable_tracker_is_transient() {
    let dir = tempfile::tempdir().unwrap();
    let client = WatchDirClient::new("watch", dir.path().to_str().unwrap()).unwrap();

    let err = client
        .push(
            &release("http://127.0.0.1:1/dl/ok".to_string(), "Nowhere-GRP"),
            &filter(None),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PushError::Transient(_)));
}
