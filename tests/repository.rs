//! Repository round-trips and referential integrity.

use std::collections::HashMap;

use chrono::Utc;
use snatchd::db::{
    Database, DbError, Filter, IrcChannel, Network, NickServ, Release, ReleasePushStatus,
    ReleaseQuery,
};

fn network() -> Network {
    Network {
        id: 0,
        name: "Scratch-Network".to_string(),
        enabled: true,
        server: "irc.scratch-network.net".to_string(),
        port: 6697,
        tls: true,
        pass: None,
        nickserv: NickServ {
            account: "snatchbot".to_string(),
            password: Some("secret".to_string()),
        },
        invite_command: Some("Drone enter #red-announce {{ .nick }} {{ .authkey }}".to_string()),
        channels: vec![
            IrcChannel {
                id: 0,
                enabled: true,
                name: "#red-announce".to_string(),
                password: Some("joinkey".to_string()),
                detached: false,
            },
            IrcChannel {
                id: 0,
                enabled: false,
                name: "#red-chat".to_string(),
                password: None,
                detached: true,
            },
        ],
    }
}

fn release(indexer: &str, name: &str) -> Release {
    Release {
        id: 0,
        indexer: indexer.to_string(),
        name: name.to_string(),
        category: "Album".to_string(),
        year: "2008".to_string(),
        tags: "rock".to_string(),
        size: Some(1024),
        freeleech: false,
        download_url: "https://example/dl".to_string(),
        timestamp: Utc::now(),
        vars: HashMap::new(),
    }
}

#[tokio::test]
async fn network_store_get_round_trip() {
    let db = Database::new(":memory:").await.unwrap();

    let stored = db.networks().store(&network()).await.unwrap();
    assert!(stored.id > 0);
    assert!(stored.channels.iter().all(|c| c.id > 0));

    let fetched = db.networks().get(stored.id).await.unwrap();
    assert_eq!(fetched, stored);
}

#[tokio::test]
async fn find_active_skips_disabled() {
    let db = Database::new(":memory:").await.unwrap();

    db.networks().store(&network()).await.unwrap();
    let mut disabled = network();
    disabled.enabled = false;
    disabled.name = "disabled".to_string();
    disabled.nickserv.account = "otherbot".to_string();
    db.networks().store(&disabled).await.unwrap();

    let active = db.networks().find_active().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].name, "Scratch-Network");

    assert_eq!(db.networks().list().await.unwrap().len(), 2);
}

#[tokio::test]
async fn check_existing_matches_identity_case_insensitively() {
    let db = Database::new(":memory:").await.unwrap();
    let stored = db.networks().store(&network()).await.unwrap();

    let found = db
        .networks()
        .check_existing("IRC.SCRATCH-NETWORK.NET", "SNATCHBOT", 0)
        .await
        .unwrap();
    assert_eq!(found, Some(stored.id));

    // Excluding the network's own id finds nothing.
    let found = db
        .networks()
        .check_existing("irc.scratch-network.net", "snatchbot", stored.id)
        .await
        .unwrap();
    assert_eq!(found, None);
}

#[tokio::test]
async fn update_and_replace_channels() {
    let db = Database::new(":memory:").await.unwrap();
    let mut stored = db.networks().store(&network()).await.unwrap();

    stored.port = 7000;
    db.networks().update(&stored).await.unwrap();
    db.networks()
        .store_channels(
            stored.id,
            &[IrcChannel {
                id: 0,
                enabled: true,
                name: "#new".to_string(),
                password: None,
                detached: false,
            }],
        )
        .await
        .unwrap();

    let fetched = db.networks().get(stored.id).await.unwrap();
    assert_eq!(fetched.port, 7000);
    assert_eq!(fetched.channels.len(), 1);
    assert_eq!(fetched.channels[0].name, "#new");
}

#[tokio::test]
async fn delete_cascades_to_channels() {
    let db = Database::new(":memory:").await.unwrap();
    let stored = db.networks().store(&network()).await.unwrap();

    db.networks().delete(stored.id).await.unwrap();

    assert!(matches!(
        db.networks().get(stored.id).await,
        Err(DbError::NetworkNotFound(_))
    ));
    assert!(db.networks().list_channels(stored.id).await.unwrap().is_empty());

    // Deleting again reports not-found.
    assert!(db.networks().delete(stored.id).await.is_err());
}

#[tokio::test]
async fn filter_round_trip() {
    let db = Database::new(":memory:").await.unwrap();

    let filter = Filter {
        id: 0,
        name: "music".to_string(),
        enabled: true,
        indexers: vec!["redacted".to_string(), "orpheus".to_string()],
        match_releases: Some("*FLAC*".to_string()),
        except_releases: None,
        match_categories: None,
        except_categories: None,
        match_tags: Some("rock".to_string()),
        except_tags: None,
        min_year: Some(1990),
        max_year: Some(2030),
        min_size: None,
        max_size: None,
        resolutions: None,
        sources: None,
        codecs: None,
        freeleech: false,
        action_client: "watch".to_string(),
        action_category: Some("music".to_string()),
    };

    let stored = db.filters().store(&filter).await.unwrap();
    let fetched = db.filters().get(stored.id).await.unwrap();
    assert_eq!(fetched, stored);

    let mut updated = fetched.clone();
    updated.enabled = false;
    db.filters().update(&updated).await.unwrap();
    assert!(db.filters().list_enabled().await.unwrap().is_empty());
    assert_eq!(db.filters().list().await.unwrap().len(), 1);

    db.filters().delete(stored.id).await.unwrap();
    assert!(db.filters().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn release_query_filters_and_pagination() {
    let db = Database::new(":memory:").await.unwrap();
    let repo = db.releases();

    for i in 0..5 {
        let id = repo
            .store(&release("redacted", &format!("Red.Release.{}-GRP", i)))
            .await
            .unwrap();
        repo.append_status(id, ReleasePushStatus::Pending, None, None, None)
            .await
            .unwrap();
    }
    let dc_id = repo.store(&release("digitalcore", "DC.Release-GRP")).await.unwrap();
    repo.append_status(dc_id, ReleasePushStatus::Pending, None, None, None)
        .await
        .unwrap();
    repo.append_status(
        dc_id,
        ReleasePushStatus::PushApproved,
        None,
        Some("watch"),
        Some("movies"),
    )
    .await
    .unwrap();

    let all = repo.query(&Default::default()).await.unwrap();
    assert_eq!(all.len(), 6);
    // Newest first.
    assert_eq!(all[0].release.name, "DC.Release-GRP");

    let red_only = repo
        .query(&ReleaseQuery {
            indexer: Some("redacted".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(red_only.len(), 5);

    let approved = repo
        .query(&ReleaseQuery {
            action_status: Some("PUSH_APPROVED".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(approved.len(), 1);
    assert_eq!(approved[0].release.indexer, "digitalcore");
    assert_eq!(approved[0].action_status.len(), 2);

    let page = repo
        .query(&ReleaseQuery {
            offset: 2,
            limit: Some(2),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
}

#[tokio::test]
async fn recent_terminal_status_window() {
    let db = Database::new(":memory:").await.unwrap();
    let repo = db.releases();

    let id = repo.store(&release("redacted", "Windowed-GRP")).await.unwrap();
    repo.append_status(id, ReleasePushStatus::Pending, None, None, None)
        .await
        .unwrap();

    // PENDING is not terminal.
    assert!(!repo
        .has_recent_terminal_status("redacted", "Windowed-GRP", 3600)
        .await
        .unwrap());

    repo.append_status(id, ReleasePushStatus::PushApproved, None, None, None)
        .await
        .unwrap();
    assert!(repo
        .has_recent_terminal_status("redacted", "Windowed-GRP", 3600)
        .await
        .unwrap());

    // Every terminal outcome counts, not just an approved push.
    let rejected = repo.store(&release("redacted", "Rejected-GRP")).await.unwrap();
    repo.append_status(rejected, ReleasePushStatus::FilterRejected, None, None, None)
        .await
        .unwrap();
    assert!(repo
        .has_recent_terminal_status("redacted", "Rejected-GRP", 3600)
        .await
        .unwrap());

    let errored = repo.store(&release("redacted", "Errored-GRP")).await.unwrap();
    repo.append_status(errored, ReleasePushStatus::PushError, None, None, None)
        .await
        .unwrap();
    assert!(repo
        .has_recent_terminal_status("redacted", "Errored-GRP", 3600)
        .await
        .unwrap());

    // Name and indexer both participate in the identity.
    assert!(!repo
        .has_recent_terminal_status("redacted", "Other-GRP", 3600)
        .await
        .unwrap());
    assert!(!repo
        .has_recent_terminal_status("digitalcore", "Windowed-GRP", 3600)
        .await
        .unwrap());

    // A zero-width window excludes everything.
    assert!(!repo
        .has_recent_terminal_status("redacted", "Windowed-GRP", 0)
        .await
        .unwrap());
}
