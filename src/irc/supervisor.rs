//! Network supervisor.
//!
//! Owns the dynamic set of handlers keyed by (server, account) and
//! reconciles each handler to the persisted configuration. The handlers
//! map is guarded by a single mutex held only for map mutation or
//! snapshotting; anything that touches the wire runs outside it.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::db::{Database, Network};
use crate::error::ServiceError;
use crate::indexer::IndexerRegistry;
use crate::pipeline::ReleaseSink;

use super::handler::{AnnounceBinding, IrcHandler};
use super::{ChannelHealth, HandlerKey};

struct HandlerEntry {
    handler: Arc<IrcHandler>,
    task: JoinHandle<()>,
}

/// A persisted network joined with its handler's live health.
#[derive(Debug, Serialize)]
pub struct NetworkWithHealth {
    #[serde(flatten)]
    pub network: Network,
    pub connected: bool,
    pub connected_since: Option<chrono::DateTime<chrono::Utc>>,
    pub channel_health: Vec<ChannelHealth>,
}

/// Supervises one handler per enabled network.
pub struct NetworkSupervisor {
    db: Database,
    registry: Arc<IndexerRegistry>,
    indexer_settings: HashMap<String, HashMap<String, String>>,
    sink: Arc<dyn ReleaseSink>,
    handlers: Mutex<HashMap<HandlerKey, HandlerEntry>>,
}

impl NetworkSupervisor {
    pub fn new(
        db: Database,
        registry: Arc<IndexerRegistry>,
        indexer_settings: HashMap<String, HashMap<String, String>>,
        sink: Arc<dyn ReleaseSink>,
    ) -> Self {
        Self {
            db,
            registry,
            indexer_settings,
            sink,
            handlers: Mutex::new(HashMap::new()),
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Load every enabled network and launch a handler for each.
    pub async fn start_handlers(&self) -> Result<(), ServiceError> {
        let networks = self.db.networks().find_active().await?;
        info!(count = networks.len(), "starting IRC handlers");

        for network in networks {
            self.start_network(network);
        }
        Ok(())
    }

    /// Signal every handler to disconnect, then wait for all run loops.
    pub async fn stop_handlers(&self) {
        let entries: Vec<(HandlerKey, HandlerEntry)> =
            self.handlers.lock().drain().collect();
        info!(count = entries.len(), "stopping IRC handlers");

        for (_, entry) in &entries {
            entry.handler.stop();
        }
        // Barrier on the actual run tasks, not just the stop signals.
        join_all(entries.into_iter().map(|(_, entry)| entry.task)).await;
    }

    /// Stop one handler and wait for its run loop to exit.
    pub async fn stop_network(&self, key: &HandlerKey) -> bool {
        let entry = self.handlers.lock().remove(key);
        match entry {
            Some(entry) => {
                entry.handler.stop();
                let _ = entry.task.await;
                true
            }
            None => false,
        }
    }

    /// Idempotent stop-and-remove; absent handlers are fine.
    pub async fn stop_and_remove(&self, key: &HandlerKey) {
        if !self.stop_network(key).await {
            debug!(key = %key, "no handler to remove");
        }
    }

    // ------------------------------------------------------------------
    // Configuration mutation
    // ------------------------------------------------------------------

    /// Persist a new network, then reconcile.
    pub async fn store_network(&self, network: Network) -> Result<Network, ServiceError> {
        validate_network(&network)?;
        self.check_conflict(&network, 0).await?;

        let stored = self.db.networks().store(&network).await?;
        self.reconcile(stored.clone()).await;
        Ok(stored)
    }

    /// Persist changes to a network, then reconcile the live handler.
    pub async fn update_network(&self, network: Network) -> Result<Network, ServiceError> {
        validate_network(&network)?;
        let old = self.db.networks().get(network.id).await?;
        self.check_conflict(&network, network.id).await?;

        self.db.networks().update(&network).await?;
        self.db
            .networks()
            .store_channels(network.id, &network.channels)
            .await?;
        let stored = self.db.networks().get(network.id).await?;

        // An identity change moves the handler to its new key so the
        // reconcile below can issue a live nick change instead of
        // tearing the session down.
        let old_key = HandlerKey::from_network(&old);
        let new_key = HandlerKey::from_network(&stored);
        if old_key != new_key {
            let mut handlers = self.handlers.lock();
            if let Some(entry) = handlers.remove(&old_key) {
                handlers.insert(new_key, entry);
            }
        }

        self.reconcile(stored.clone()).await;
        Ok(stored)
    }

    /// Delete a network and tear down its handler.
    pub async fn delete_network(&self, id: i64) -> Result<(), ServiceError> {
        let network = self.db.networks().get(id).await?;
        self.db.networks().delete(id).await?;
        self.stop_and_remove(&HandlerKey::from_network(&network)).await;
        Ok(())
    }

    /// Force-restart a network's session with its latest persisted state.
    pub async fn restart_network(&self, id: i64) -> Result<(), ServiceError> {
        let network = self.db.networks().get(id).await?;
        let key = HandlerKey::from_network(&network);

        let handler = self.handlers.lock().get(&key).map(|e| e.handler.clone());
        match handler {
            Some(handler) => {
                handler.set_bindings(self.build_bindings(&network));
                handler.set_network(network);
                handler.restart();
                Ok(())
            }
            None => Err(ServiceError::NotFound {
                entity: "handler",
                id,
            }),
        }
    }

    // ------------------------------------------------------------------
    // Read APIs
    // ------------------------------------------------------------------

    /// All persisted networks.
    pub async fn list(&self) -> Result<Vec<Network>, ServiceError> {
        Ok(self.db.networks().list().await?)
    }

    /// Persisted networks joined with live handler health.
    pub async fn get_with_health(&self) -> Result<Vec<NetworkWithHealth>, ServiceError> {
        let networks = self.db.networks().list().await?;

        let handlers: HashMap<HandlerKey, Arc<IrcHandler>> = self
            .handlers
            .lock()
            .iter()
            .map(|(key, entry)| (key.clone(), entry.handler.clone()))
            .collect();

        Ok(networks
            .into_iter()
            .map(|network| {
                let handler = handlers.get(&HandlerKey::from_network(&network));
                NetworkWithHealth {
                    connected: handler.map(|h| h.connected()).unwrap_or(false),
                    connected_since: handler.and_then(|h| h.connected_since()),
                    channel_health: handler
                        .map(|h| h.health_snapshot())
                        .unwrap_or_default(),
                    network,
                }
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Reconciliation
    // ------------------------------------------------------------------

    /// Align the handler set with one network's configuration.
    ///
    /// Computes the minimal transition: create/start when missing, stop
    /// when disabled, otherwise a full restart only for transport-level
    /// changes and live adjustments for everything else.
    pub async fn reconcile(&self, network: Network) {
        let key = HandlerKey::from_network(&network);

        if !network.enabled {
            self.stop_and_remove(&key).await;
            return;
        }

        let handler = self.handlers.lock().get(&key).map(|e| e.handler.clone());
        let Some(handler) = handler else {
            self.start_network(network);
            return;
        };

        let current = handler.get_network();

        // Transport-affecting changes subsume everything else: reconnect
        // with the new snapshot and rejoin from scratch.
        if transport_fields_changed(&current, &network) {
            info!(key = %key, "transport configuration changed, restarting session");
            handler.set_bindings(self.build_bindings(&network));
            handler.set_network(network);
            handler.restart();
            return;
        }

        // Identity: live nick change (re-identify follows confirmation).
        if current.nickserv.account != network.nickserv.account {
            info!(
                key = %key,
                nick = %network.nickserv.account,
                "account changed, issuing nick change"
            );
            handler.handle_nick_change(network.nickserv.account.clone());
        } else if current.nickserv.password != network.nickserv.password {
            // Credentials only: re-identify on the live session.
            if let Some(password) = network
                .nickserv
                .password
                .as_deref()
                .filter(|p| !p.is_empty())
            {
                info!(key = %key, "nickserv credentials changed, re-identifying");
                handler.handle_nickserv_identify(
                    network.nickserv.account.clone(),
                    password.to_string(),
                );
            }
        }

        // Channel delta: part what left, join what arrived.
        let (to_part, to_join) = channel_delta(&current, &network);
        for name in to_part {
            debug!(key = %key, channel = %name, "reconcile part");
            handler.handle_part_channel(name);
        }
        for channel in to_join {
            debug!(key = %key, channel = %channel.name, "reconcile join");
            handler.handle_join_channel(channel);
        }

        // Refresh definition bindings and the snapshot used by the next
        // reconcile or reconnect.
        handler.set_bindings(self.build_bindings(&network));
        handler.set_network(network);
    }

    /// Create a handler and launch its run loop.
    ///
    /// The spawn happens outside the map lock; only the insert holds it.
    fn start_network(&self, network: Network) {
        let key = HandlerKey::from_network(&network);
        info!(key = %key, network = %network.name, "starting handler");

        let bindings = self.build_bindings(&network);
        if bindings.is_empty() {
            warn!(
                key = %key,
                server = %network.server,
                "no indexer definitions announce on this server"
            );
        }

        let handler = Arc::new(IrcHandler::new(network, bindings, self.sink.clone()));
        let task = tokio::spawn({
            let handler = handler.clone();
            async move { handler.run().await }
        });

        self.handlers
            .lock()
            .insert(key, HandlerEntry { handler, task });
    }

    /// Compile announce bindings for every indexer on this server.
    fn build_bindings(&self, network: &Network) -> Vec<AnnounceBinding> {
        self.registry
            .for_server(&network.server)
            .into_iter()
            .filter_map(|def| {
                let settings = self
                    .indexer_settings
                    .get(&def.identifier)
                    .cloned()
                    .unwrap_or_default();
                match AnnounceBinding::new(def.clone(), settings) {
                    Ok(binding) => Some(binding),
                    Err(e) => {
                        error!(
                            indexer = %def.identifier,
                            error = %e,
                            "failed to bind indexer definition"
                        );
                        None
                    }
                }
            })
            .collect()
    }

    async fn check_conflict(&self, network: &Network, own_id: i64) -> Result<(), ServiceError> {
        if !network.enabled {
            return Ok(());
        }
        if let Some(existing) = self
            .db
            .networks()
            .check_existing(&network.server, &network.nickserv.account, own_id)
            .await?
        {
            return Err(ServiceError::Conflict(format!(
                "network {} already connects to {} as {}",
                existing, network.server, network.nickserv.account
            )));
        }
        Ok(())
    }
}

fn validate_network(network: &Network) -> Result<(), ServiceError> {
    if network.name.trim().is_empty() {
        return Err(ServiceError::Invalid("network name must not be empty".into()));
    }
    if network.server.trim().is_empty() {
        return Err(ServiceError::Invalid("server must not be empty".into()));
    }
    if network.port == 0 {
        return Err(ServiceError::Invalid("port must not be 0".into()));
    }
    if network.nickserv.account.trim().is_empty() {
        return Err(ServiceError::Invalid(
            "nickserv account must not be empty".into(),
        ));
    }
    for channel in &network.channels {
        if !channel.name.starts_with('#') {
            return Err(ServiceError::Invalid(format!(
                "channel name must start with '#': {:?}",
                channel.name
            )));
        }
    }
    Ok(())
}

/// Whether a change requires a full disconnect + reconnect.
fn transport_fields_changed(current: &Network, desired: &Network) -> bool {
    !current.server.eq_ignore_ascii_case(&desired.server)
        || current.port != desired.port
        || current.tls != desired.tls
        || current.pass != desired.pass
        || current.invite_command != desired.invite_command
}

/// Minimal channel transition, both sides matched lowercased.
///
/// PART takes the channel name; JOIN takes the full channel object so
/// the join key travels with it.
fn channel_delta(current: &Network, desired: &Network) -> (Vec<String>, Vec<crate::db::IrcChannel>) {
    let current_names: std::collections::HashSet<String> = current
        .enabled_channels()
        .map(|c| c.name.to_lowercase())
        .collect();
    let desired_names: std::collections::HashSet<String> = desired
        .enabled_channels()
        .map(|c| c.name.to_lowercase())
        .collect();

    let to_part = current
        .enabled_channels()
        .filter(|c| !desired_names.contains(&c.name.to_lowercase()))
        .map(|c| c.name.clone())
        .collect();

    let to_join = desired
        .enabled_channels()
        .filter(|c| !current_names.contains(&c.name.to_lowercase()))
        .cloned()
        .collect();

    (to_part, to_join)
}
