use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use dinely_core::domain::restaurant::LastSearch;

use super::{LastSearchRepository, RepositoryError};
use crate::DbPool;

pub struct SqlLastSearchRepository {
    pool: DbPool,
}

impl SqlLastSearchRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl LastSearchRepository for SqlLastSearchRepository {
    async fn find_by_key(&self, lookup_key: &str) -> Result<Option<LastSearch>, RepositoryError> {
        let row = sqlx::query(
            "SELECT lookup_key, area, category, delivery_address, searched_at
             FROM last_search
             WHERE lookup_key = ?",
        )
        .bind(lookup_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(last_search_from_row).transpose()
    }

    async fn upsert(&self, record: LastSearch) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO last_search (lookup_key, area, category, delivery_address, searched_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(lookup_key) DO UPDATE SET
                area = excluded.area,
                category = excluded.category,
                delivery_address = excluded.delivery_address,
                searched_at = excluded.searched_at",
        )
        .bind(&record.lookup_key)
        .bind(&record.area)
        .bind(&record.category)
        .bind(&record.delivery_address)
        .bind(record.searched_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn last_search_from_row(row: SqliteRow) -> Result<LastSearch, RepositoryError> {
    let searched_at_raw = row.try_get::<String, _>("searched_at")?;
    let searched_at = DateTime::parse_from_rfc3339(&searched_at_raw)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|error| {
            RepositoryError::Decode(format!("invalid searched_at `{searched_at_raw}`: {error}"))
        })?;

    Ok(LastSearch {
        lookup_key: row.try_get("lookup_key")?,
        area: row.try_get("area")?,
        category: row.try_get("category")?,
        delivery_address: row.try_get("delivery_address")?,
        searched_at,
    })
}
