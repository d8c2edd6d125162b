//! snatchd - IRC announce watcher and release grabber.

use std::path::Path;
use std::sync::Arc;

use snatchd::config::Config;
use snatchd::db::Database;
use snatchd::http::{self, AppState, SessionStore};
use snatchd::indexer::IndexerRegistry;
use snatchd::irc::NetworkSupervisor;
use snatchd::pipeline::{ReleasePipeline, build_clients};
use snatchd::{config, metrics};
use tracing::{error, info};

/// Resolve the configuration path from CLI arguments.
/// Supports `-c <path>`, `--config <path>`, or a bare path.
/// Falls back to `config.toml` when no argument is provided.
fn resolve_config_path() -> String {
    let mut args = std::env::args().skip(1);

    let raw_path = match args.next() {
        Some(flag) if flag == "-c" || flag == "--config" => args.next().unwrap_or_else(|| {
            eprintln!("Missing path after {}", flag);
            std::process::exit(1);
        }),
        Some(path) => path,
        None => "config.toml".to_string(),
    };

    // Canonicalize to avoid relying on the current working directory later.
    match std::fs::canonicalize(Path::new(&raw_path)) {
        Ok(p) => p.to_string_lossy().into_owned(),
        Err(_) => raw_path,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration first (before tracing, so we can use log_format)
    let config_path = resolve_config_path();

    let config = Config::load(&config_path).map_err(|e| {
        eprintln!("ERROR: Failed to load config from {}: {}", config_path, e);
        e
    })?;

    // Initialize tracing based on config
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match config.server.log_format {
        snatchd::config::LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .json()
                .init();
        }
        snatchd::config::LogFormat::Pretty => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .init();
        }
    }

    // Validate configuration
    if let Err(errors) = config::validate(&config) {
        for err in &errors {
            error!(error = %err, "Configuration validation failed");
        }
        anyhow::bail!(
            "Configuration validation failed with {} error(s)",
            errors.len()
        );
    }

    info!(
        host = %config.server.host,
        port = config.server.port,
        base_url = %config.server.base_url,
        "Starting snatchd"
    );

    // Load bundled indexer definitions and check user settings against them
    let registry = Arc::new(IndexerRegistry::load_bundled()?);
    info!(count = registry.all().len(), "Indexer definitions loaded");

    let setting_errors = registry.validate_user_settings(&config.indexers);
    if !setting_errors.is_empty() {
        for err in &setting_errors {
            error!(error = %err, "Indexer settings validation failed");
        }
        anyhow::bail!(
            "Indexer settings validation failed with {} error(s)",
            setting_errors.len()
        );
    }

    // Initialize database
    let db = Database::new(&config.database.path).await?;

    // Metrics registry
    if config.server.metrics_enabled {
        metrics::init();
        info!("Metrics initialized");
    }

    // Build download clients and the release pipeline
    let clients = build_clients(&config.clients)?;
    info!(count = clients.len(), "Download clients configured");
    let pipeline = Arc::new(ReleasePipeline::new(
        db.clone(),
        clients,
        config.pipeline.clone(),
    ));

    // The supervisor owns every IRC handler
    let supervisor = Arc::new(NetworkSupervisor::new(
        db.clone(),
        registry,
        config.indexers.clone(),
        pipeline,
    ));
    supervisor.start_handlers().await?;

    // Shutdown broadcast driven by SIGINT/SIGTERM
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);
    {
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            use tokio::signal::unix::{SignalKind, signal};
            let mut sigint =
                signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

            tokio::select! {
                _ = sigint.recv() => info!("Received SIGINT - initiating graceful shutdown"),
                _ = sigterm.recv() => info!("Received SIGTERM - initiating graceful shutdown"),
            }

            let _ = shutdown_tx.send(());
        });
    }

    // HTTP control plane
    let state = AppState {
        config: Arc::new(config.clone()),
        db,
        supervisor: supervisor.clone(),
        sessions: Arc::new(SessionStore::new()),
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    http::serve(listener, state, async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    info!("HTTP server stopped, stopping IRC handlers...");
    supervisor.stop_handlers().await;

    info!("Shutdown complete");
    Ok(())
}
