//! Network and channel repository.

use sqlx::SqlitePool;

use super::DbError;
use super::models::{IrcChannel, Network, NickServ};

/// Repository for network and channel operations.
pub struct NetworkRepository<'a> {
    pool: &'a SqlitePool,
}

type NetworkRow = (
    i64,
    String,
    bool,
    String,
    i64,
    bool,
    Option<String>,
    String,
    Option<String>,
    Option<String>,
);

const NETWORK_COLUMNS: &str = "id, name, enabled, server, port, tls, pass, \
     nickserv_account, nickserv_password, invite_command";

fn network_from_row(row: NetworkRow, channels: Vec<IrcChannel>) -> Network {
    let (id, name, enabled, server, port, tls, pass, account, password, invite_command) = row;
    Network {
        id,
        name,
        enabled,
        server,
        port: port as u16,
        tls,
        pass,
        nickserv: NickServ { account, password },
        invite_command,
        channels,
    }
}

impl<'a> NetworkRepository<'a> {
    /// Create a new network repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// All enabled networks with their channels.
    pub async fn find_active(&self) -> Result<Vec<Network>, DbError> {
        self.fetch_networks("WHERE enabled = TRUE").await
    }

    /// All networks with their channels.
    pub async fn list(&self) -> Result<Vec<Network>, DbError> {
        self.fetch_networks("").await
    }

    async fn fetch_networks(&self, where_clause: &str) -> Result<Vec<Network>, DbError> {
        let sql = format!(
            "SELECT {} FROM networks {} ORDER BY id",
            NETWORK_COLUMNS, where_clause
        );
        let rows = sqlx::query_as::<_, NetworkRow>(&sql).fetch_all(self.pool).await?;

        let mut networks = Vec::with_capacity(rows.len());
        for row in rows {
            let channels = self.list_channels(row.0).await?;
            networks.push(network_from_row(row, channels));
        }
        Ok(networks)
    }

    /// Fetch one network by id, channels included.
    pub async fn get(&self, id: i64) -> Result<Network, DbError> {
        let sql = format!("SELECT {} FROM networks WHERE id = ?", NETWORK_COLUMNS);
        let row = sqlx::query_as::<_, NetworkRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(DbError::NetworkNotFound(id))?;

        let channels = self.list_channels(id).await?;
        Ok(network_from_row(row, channels))
    }

    /// Find an enabled network claiming the same (server, account) identity.
    pub async fn check_existing(
        &self,
        server: &str,
        account: &str,
        exclude_id: i64,
    ) -> Result<Option<i64>, DbError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id FROM networks
            WHERE lower(server) = lower(?) AND lower(nickserv_account) = lower(?)
              AND enabled = TRUE AND id != ?
            "#,
        )
        .bind(server)
        .bind(account)
        .bind(exclude_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(id)
    }

    /// Insert a network and its channels, returning the stored copy with ids.
    pub async fn store(&self, network: &Network) -> Result<Network, DbError> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO networks
                (name, enabled, server, port, tls, pass,
                 nickserv_account, nickserv_password, invite_command,
                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&network.name)
        .bind(network.enabled)
        .bind(&network.server)
        .bind(network.port as i64)
        .bind(network.tls)
        .bind(&network.pass)
        .bind(&network.nickserv.account)
        .bind(&network.nickserv.password)
        .bind(&network.invite_command)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;

        let network_id = result.last_insert_rowid();
        let channels = self.store_channels(network_id, &network.channels).await?;

        let mut stored = network.clone();
        stored.id = network_id;
        stored.channels = channels;
        Ok(stored)
    }

    /// Update a network row. Channels are replaced separately via
    /// [`Self::store_channels`].
    pub async fn update(&self, network: &Network) -> Result<(), DbError> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE networks
            SET name = ?, enabled = ?, server = ?, port = ?, tls = ?, pass = ?,
                nickserv_account = ?, nickserv_password = ?, invite_command = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&network.name)
        .bind(network.enabled)
        .bind(&network.server)
        .bind(network.port as i64)
        .bind(network.tls)
        .bind(&network.pass)
        .bind(&network.nickserv.account)
        .bind(&network.nickserv.password)
        .bind(&network.invite_command)
        .bind(now)
        .bind(network.id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NetworkNotFound(network.id));
        }
        Ok(())
    }

    /// Delete a network; channels cascade.
    pub async fn delete(&self, id: i64) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM networks WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NetworkNotFound(id));
        }
        Ok(())
    }

    /// Channels of a network, insertion order.
    pub async fn list_channels(&self, network_id: i64) -> Result<Vec<IrcChannel>, DbError> {
        let rows = sqlx::query_as::<_, (i64, bool, String, Option<String>, bool)>(
            r#"
            SELECT id, enabled, name, password, detached
            FROM channels WHERE network_id = ? ORDER BY id
            "#,
        )
        .bind(network_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, enabled, name, password, detached)| IrcChannel {
                id,
                enabled,
                name,
                password,
                detached,
            })
            .collect())
    }

    /// Replace a network's channel rows with the given set.
    pub async fn store_channels(
        &self,
        network_id: i64,
        channels: &[IrcChannel],
    ) -> Result<Vec<IrcChannel>, DbError> {
        sqlx::query("DELETE FROM channels WHERE network_id = ?")
            .bind(network_id)
            .execute(self.pool)
            .await?;

        let mut stored = Vec::with_capacity(channels.len());
        for channel in channels {
            let result = sqlx::query(
                r#"
                INSERT INTO channels (network_id, enabled, name, password, detached)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(network_id)
            .bind(channel.enabled)
            .bind(&channel.name)
            .bind(&channel.password)
            .bind(channel.detached)
            .execute(self.pool)
            .await?;

            let mut ch = channel.clone();
            ch.id = result.last_insert_rowid();
            stored.push(ch);
        }
        Ok(stored)
    }
}
