//! Filter repository.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::DbError;
use super::models::Filter;

/// Repository for filter operations.
pub struct FilterRepository<'a> {
    pool: &'a SqlitePool,
}

const FILTER_COLUMNS: &str = "id, name, enabled, indexers, match_releases, except_releases, \
     match_categories, except_categories, match_tags, except_tags, \
     min_year, max_year, min_size, max_size, resolutions, sources, codecs, \
     freeleech, action_client, action_category";

fn split_indexers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn filter_from_row(row: &SqliteRow) -> Result<Filter, sqlx::Error> {
    let indexers: String = row.try_get("indexers")?;
    Ok(Filter {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        enabled: row.try_get("enabled")?,
        indexers: split_indexers(&indexers),
        match_releases: row.try_get("match_releases")?,
        except_releases: row.try_get("except_releases")?,
        match_categories: row.try_get("match_categories")?,
        except_categories: row.try_get("except_categories")?,
        match_tags: row.try_get("match_tags")?,
        except_tags: row.try_get("except_tags")?,
        min_year: row.try_get("min_year")?,
        max_year: row.try_get("max_year")?,
        min_size: row.try_get("min_size")?,
        max_size: row.try_get("max_size")?,
        resolutions: row.try_get("resolutions")?,
        sources: row.try_get("sources")?,
        codecs: row.try_get("codecs")?,
        freeleech: row.try_get("freeleech")?,
        action_client: row.try_get("action_client")?,
        action_category: row.try_get("action_category")?,
    })
}

impl<'a> FilterRepository<'a> {
    /// Create a new filter repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// All filters, evaluation order (creation order).
    pub async fn list(&self) -> Result<Vec<Filter>, DbError> {
        let sql = format!("SELECT {} FROM filters ORDER BY id", FILTER_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(self.pool).await?;
        Ok(rows
            .iter()
            .map(filter_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Enabled filters only, evaluation order.
    pub async fn list_enabled(&self) -> Result<Vec<Filter>, DbError> {
        let sql = format!(
            "SELECT {} FROM filters WHERE enabled = TRUE ORDER BY id",
            FILTER_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(self.pool).await?;
        Ok(rows
            .iter()
            .map(filter_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Fetch one filter by id.
    pub async fn get(&self, id: i64) -> Result<Filter, DbError> {
        let sql = format!("SELECT {} FROM filters WHERE id = ?", FILTER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(DbError::FilterNotFound(id))?;
        Ok(filter_from_row(&row)?)
    }

    /// Insert a filter, returning the stored copy with its id.
    pub async fn store(&self, filter: &Filter) -> Result<Filter, DbError> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO filters
                (name, enabled, indexers, match_releases, except_releases,
                 match_categories, except_categories, match_tags, except_tags,
                 min_year, max_year, min_size, max_size,
                 resolutions, sources, codecs, freeleech,
                 action_client, action_category, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&filter.name)
        .bind(filter.enabled)
        .bind(filter.indexers.join(","))
        .bind(&filter.match_releases)
        .bind(&filter.except_releases)
        .bind(&filter.match_categories)
        .bind(&filter.except_categories)
        .bind(&filter.match_tags)
        .bind(&filter.except_tags)
        .bind(filter.min_year)
        .bind(filter.max_year)
        .bind(filter.min_size)
        .bind(filter.max_size)
        .bind(&filter.resolutions)
        .bind(&filter.sources)
        .bind(&filter.codecs)
        .bind(filter.freeleech)
        .bind(&filter.action_client)
        .bind(&filter.action_category)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;

        let mut stored = filter.clone();
        stored.id = result.last_insert_rowid();
        Ok(stored)
    }

    /// Update a filter in place.
    pub async fn update(&self, filter: &Filter) -> Result<(), DbError> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE filters
            SET name = ?, enabled = ?, indexers = ?, match_releases = ?,
                except_releases = ?, match_categories = ?, except_categories = ?,
                match_tags = ?, except_tags = ?, min_year = ?, max_year = ?,
                min_size = ?, max_size = ?, resolutions = ?, sources = ?,
                codecs = ?, freeleech = ?, action_client = ?, action_category = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&filter.name)
        .bind(filter.enabled)
        .bind(filter.indexers.join(","))
        .bind(&filter.match_releases)
        .bind(&filter.except_releases)
        .bind(&filter.match_categories)
        .bind(&filter.except_categories)
        .bind(&filter.match_tags)
        .bind(&filter.except_tags)
        .bind(filter.min_year)
        .bind(filter.max_year)
        .bind(filter.min_size)
        .bind(filter.max_size)
        .bind(&filter.resolutions)
        .bind(&filter.sources)
        .bind(&filter.codecs)
        .bind(filter.freeleech)
        .bind(&filter.action_client)
        .bind(&filter.action_category)
        .bind(now)
        .bind(filter.id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::FilterNotFound(filter.id));
        }
        Ok(())
    }

    /// Delete a filter.
    pub async fn delete(&self, id: i64) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM filters WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::FilterNotFound(id));
        }
        Ok(())
    }
}
