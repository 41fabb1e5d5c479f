use sqlx::{sqlite::SqliteRow, Row};

use dinely_core::domain::restaurant::{Candidate, RestaurantId};

use super::{RepositoryError, SearchIndex};
use crate::DbPool;

pub struct SqlSearchIndex {
    pool: DbPool,
}

impl SqlSearchIndex {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SearchIndex for SqlSearchIndex {
    async fn find_by_category(&self, category: &str) -> Result<Vec<Candidate>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT external_id, category
             FROM restaurant_search
             WHERE lower(category) = lower(?)
             ORDER BY external_id ASC",
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(candidate_from_row).collect()
    }

    async fn save(&self, candidate: Candidate) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO restaurant_search (external_id, category)
             VALUES (?, ?)
             ON CONFLICT(external_id) DO UPDATE SET category = excluded.category",
        )
        .bind(&candidate.id.0)
        .bind(&candidate.category)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn candidate_from_row(row: SqliteRow) -> Result<Candidate, RepositoryError> {
    Ok(Candidate {
        id: RestaurantId(row.try_get("external_id")?),
        category: row.try_get("category")?,
    })
}
