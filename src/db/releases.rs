//! Release and status-event repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::DbError;
use super::models::{Release, ReleaseActionStatus, ReleasePushStatus};

/// Repository for release operations.
pub struct ReleaseRepository<'a> {
    pool: &'a SqlitePool,
}

/// Query parameters for the release listing API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReleaseQuery {
    #[serde(default)]
    pub offset: i64,
    pub limit: Option<i64>,
    pub indexer: Option<String>,
    pub action_status: Option<String>,
}

/// A release joined with its ordered status history.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseWithStatus {
    #[serde(flatten)]
    pub release: Release,
    pub action_status: Vec<ReleaseActionStatus>,
}

const DEFAULT_QUERY_LIMIT: i64 = 25;
const MAX_QUERY_LIMIT: i64 = 500;

fn datetime_from_secs(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
}

impl<'a> ReleaseRepository<'a> {
    /// Create a new release repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a release, returning its id.
    pub async fn store(&self, release: &Release) -> Result<i64, DbError> {
        let result = sqlx::query(
            r#"
            INSERT INTO releases
                (indexer, name, category, year, tags, size, freeleech,
                 download_url, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&release.indexer)
        .bind(&release.name)
        .bind(&release.category)
        .bind(&release.year)
        .bind(&release.tags)
        .bind(release.size)
        .bind(release.freeleech)
        .bind(&release.download_url)
        .bind(release.timestamp.timestamp())
        .execute(self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Append a status event to a release's history.
    pub async fn append_status(
        &self,
        release_id: i64,
        status: ReleasePushStatus,
        rejections: Option<&str>,
        client: Option<&str>,
        filter: Option<&str>,
    ) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO release_action_status
                (release_id, status, rejections, client, filter, timestamp)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(release_id)
        .bind(status.as_str())
        .bind(rejections)
        .bind(client)
        .bind(filter)
        .bind(chrono::Utc::now().timestamp())
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Whether (indexer, name) already reached a terminal status inside
    /// the window. PENDING is the only non-terminal status.
    ///
    /// Best effort: detects duplicates, does not prevent them.
    pub async fn has_recent_terminal_status(
        &self,
        indexer: &str,
        name: &str,
        window_secs: u64,
    ) -> Result<bool, DbError> {
        let cutoff = chrono::Utc::now().timestamp() - window_secs as i64;

        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM releases r
                JOIN release_action_status s ON s.release_id = r.id
                WHERE r.indexer = ? AND r.name = ?
                  AND s.status IN ('PUSH_APPROVED', 'PUSH_REJECTED', 'PUSH_ERROR',
                                   'FILTER_REJECTED', 'DUPLICATE')
                  AND r.timestamp > ?
            )
            "#,
        )
        .bind(indexer)
        .bind(name)
        .bind(cutoff)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    /// Page through releases, newest first, with optional predicates.
    pub async fn query(&self, query: &ReleaseQuery) -> Result<Vec<ReleaseWithStatus>, DbError> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_QUERY_LIMIT)
            .clamp(1, MAX_QUERY_LIMIT);

        let mut sql = String::from(
            "SELECT id, indexer, name, category, year, tags, size, freeleech, \
             download_url, timestamp FROM releases WHERE 1=1",
        );
        if query.indexer.is_some() {
            sql.push_str(" AND indexer = ?");
        }
        if query.action_status.is_some() {
            sql.push_str(
                " AND EXISTS(SELECT 1 FROM release_action_status s \
                 WHERE s.release_id = releases.id AND s.status = ?)",
            );
        }
        sql.push_str(" ORDER BY id DESC LIMIT ? OFFSET ?");

        type ReleaseRow = (
            i64,
            String,
            String,
            String,
            String,
            String,
            Option<i64>,
            bool,
            String,
            i64,
        );

        let mut q = sqlx::query_as::<_, ReleaseRow>(&sql);
        if let Some(indexer) = &query.indexer {
            q = q.bind(indexer);
        }
        if let Some(status) = &query.action_status {
            q = q.bind(status);
        }
        let rows = q
            .bind(limit)
            .bind(query.offset.max(0))
            .fetch_all(self.pool)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for (id, indexer, name, category, year, tags, size, freeleech, download_url, ts) in rows {
            let action_status = self.statuses(id).await?;
            out.push(ReleaseWithStatus {
                release: Release {
                    id,
                    indexer,
                    name,
                    category,
                    year,
                    tags,
                    size,
                    freeleech,
                    download_url,
                    timestamp: datetime_from_secs(ts),
                    vars: Default::default(),
                },
                action_status,
            });
        }
        Ok(out)
    }

    /// Ordered status history of one release.
    pub async fn statuses(&self, release_id: i64) -> Result<Vec<ReleaseActionStatus>, DbError> {
        let rows = sqlx::query_as::<
            _,
            (
                i64,
                i64,
                String,
                Option<String>,
                Option<String>,
                Option<String>,
                i64,
            ),
        >(
            r#"
            SELECT id, release_id, status, rejections, client, filter, timestamp
            FROM release_action_status WHERE release_id = ? ORDER BY id
            "#,
        )
        .bind(release_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, release_id, status, rejections, client, filter, ts)| {
                let status = status.parse::<ReleasePushStatus>().ok()?;
                Some(ReleaseActionStatus {
                    id,
                    release_id,
                    status,
                    rejections,
                    client,
                    filter,
                    timestamp: datetime_from_secs(ts),
                })
            })
            .collect())
    }
}
