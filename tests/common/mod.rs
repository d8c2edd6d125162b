//! Shared test fixtures.
//!
//! The crate under test is an IRC *client*, so the fixture here is a
//! scripted IRC *server*: it accepts connections, walks the registration
//! handshake, echoes JOINs, records every received line, and lets tests
//! inject raw announce lines.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use snatchd::db::{IrcChannel, Network, NickServ, Release};
use snatchd::indexer::{IndexerDefinition, IndexerRegistry};
use snatchd::pipeline::ReleaseSink;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::time::sleep;

type WriterSlot = Arc<tokio::sync::Mutex<Option<OwnedWriteHalf>>>;

/// A scripted IRC server for one or more sequential client connections.
pub struct MockIrcServer {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<String>>>,
    writer: WriterSlot,
    connections: Arc<AtomicUsize>,
}

impl MockIrcServer {
    /// Bind on an ephemeral port and start accepting.
    pub async fn spawn() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let received: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let writer: WriterSlot = Arc::new(tokio::sync::Mutex::new(None));
        let connections = Arc::new(AtomicUsize::new(0));

        {
            let received = received.clone();
            let writer = writer.clone();
            let connections = connections.clone();
            tokio::spawn(async move {
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        return;
                    };
                    connections.fetch_add(1, Ordering::SeqCst);

                    let (read_half, write_half) = stream.into_split();
                    *writer.lock().await = Some(write_half);

                    let received = received.clone();
                    let writer = writer.clone();
                    tokio::spawn(async move {
                        handle_client(read_half, received, writer).await;
                    });
                }
            });
        }

        Ok(Self {
            addr,
            received,
            writer,
            connections,
        })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Snapshot of every line received so far, across all connections.
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    /// How many TCP connections have been accepted.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Lines whose first word equals the given verb.
    pub fn received_with_verb(&self, verb: &str) -> Vec<String> {
        self.received()
            .into_iter()
            .filter(|l| l.split_whitespace().next() == Some(verb))
            .collect()
    }

    /// Wait until a received line satisfies the predicate.
    pub async fn wait_for_line<F>(&self, predicate: F, timeout: Duration) -> Option<String>
    where
        F: Fn(&str) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(line) = self
                .received
                .lock()
                .unwrap()
                .iter()
                .find(|l| predicate(l))
                .cloned()
            {
                return Some(line);
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            sleep(Duration::from_millis(25)).await;
        }
    }

    /// Send a raw line to the currently connected client.
    pub async fn send_line(&self, line: &str) -> anyhow::Result<()> {
        let mut slot = self.writer.lock().await;
        let writer = slot
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("no client connected"))?;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\r\n").await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Drive one client connection: registration, JOIN echoes, recording.
async fn handle_client(
    read_half: tokio::net::tcp::OwnedReadHalf,
    received: Arc<Mutex<Vec<String>>>,
    writer: WriterSlot,
) {
    let mut lines = BufReader::new(read_half).lines();
    let mut nick = String::from("*");

    while let Ok(Some(line)) = lines.next_line().await {
        received.lock().unwrap().push(line.clone());

        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("NICK") => {
                nick = parts.next().unwrap_or("*").to_string();
            }
            Some("USER") => {
                let welcome = format!(":mock.server 001 {} :Welcome to the mock network", nick);
                if write_line(&writer, &welcome).await.is_err() {
                    return;
                }
                let motd_end = format!(":mock.server 376 {} :End of /MOTD command.", nick);
                if write_line(&writer, &motd_end).await.is_err() {
                    return;
                }
            }
            Some("JOIN") => {
                let channel = parts.next().unwrap_or("").to_string();
                let echo = format!(":{}!bot@mock JOIN :{}", nick, channel);
                if write_line(&writer, &echo).await.is_err() {
                    return;
                }
            }
            Some("PART") => {
                let channel = parts.next().unwrap_or("").to_string();
                let echo = format!(":{}!bot@mock PART :{}", nick, channel);
                if write_line(&writer, &echo).await.is_err() {
                    return;
                }
            }
            Some("QUIT") => {
                return;
            }
            _ => {}
        }
    }
}

async fn write_line(writer: &WriterSlot, line: &str) -> std::io::Result<()> {
    let mut slot = writer.lock().await;
    if let Some(w) = slot.as_mut() {
        w.write_all(line.as_bytes()).await?;
        w.write_all(b"\r\n").await?;
        w.flush().await?;
    }
    Ok(())
}

/// A release sink that records everything it is handed.
#[derive(Default)]
pub struct RecordingSink {
    releases: Mutex<Vec<Release>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn releases(&self) -> Vec<Release> {
        self.releases.lock().unwrap().clone()
    }

    /// Wait until at least `count` releases arrived.
    pub async fn wait_for_releases(&self, count: usize, timeout: Duration) -> Vec<Release> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let releases = self.releases();
            if releases.len() >= count || tokio::time::Instant::now() >= deadline {
                return releases;
            }
            sleep(Duration::from_millis(25)).await;
        }
    }
}

impl ReleaseSink for RecordingSink {
    fn deliver(&self, release: Release) {
        self.releases.lock().unwrap().push(release);
    }
}

/// A network pointed at a mock server.
pub fn test_network(port: u16, channels: &[&str]) -> Network {
    Network {
        id: 0,
        name: "mocknet".to_string(),
        enabled: true,
        server: "127.0.0.1".to_string(),
        port,
        tls: false,
        pass: None,
        nickserv: NickServ {
            account: "snatchbot".to_string(),
            password: None,
        },
        invite_command: None,
        channels: channels
            .iter()
            .map(|name| IrcChannel {
                id: 0,
                enabled: true,
                name: name.to_string(),
                password: None,
                detached: false,
            })
            .collect(),
    }
}

/// A registry with one single-line indexer announcing on the mock server.
///
/// Channels must cover every channel the test network joins.
pub fn test_registry(channels: &[&str]) -> Arc<IndexerRegistry> {
    let channel_list = channels
        .iter()
        .map(|c| format!("{:?}", c))
        .collect::<Vec<_>>()
        .join(", ");

    let raw = format!(
        r#"
        identifier = "mocktracker"
        name = "MockTracker"

        [irc]
        network = "MockNet"
        server = "127.0.0.1"
        port = 6667
        channels = [{}]
        announcers = ["announcer"]

        [parse]
        type = "single"

        [[parse.lines]]
        pattern = '^ANNOUNCE :: (.+?) :: (\d+)$'
        vars = ["torrentName", "torrentId"]

        [parse.match]
        torrenturl = "https://mock.tracker/download/{{{{ .torrentId }}}}"
        "#,
        channel_list
    );

    let def: IndexerDefinition = toml::from_str(&raw).expect("test definition parses");
    Arc::new(IndexerRegistry::from_definitions(vec![def]).expect("test definition validates"))
}

/// User settings map for the mock indexer.
pub fn test_indexer_settings() -> HashMap<String, HashMap<String, String>> {
    HashMap::new()
}
