use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use dinely_core::domain::restaurant::{RestaurantDetail, RestaurantId};

use super::{DetailsStore, RepositoryError};
use crate::DbPool;

pub struct SqlDetailsStore {
    pool: DbPool,
}

impl SqlDetailsStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DetailsStore for SqlDetailsStore {
    async fn find_by_id(
        &self,
        id: &RestaurantId,
    ) -> Result<Option<RestaurantDetail>, RepositoryError> {
        let row = sqlx::query(
            "SELECT external_id, name, location_json
             FROM restaurant_detail
             WHERE external_id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(detail_from_row).transpose()
    }

    async fn save(&self, detail: RestaurantDetail) -> Result<(), RepositoryError> {
        let location_json = serde_json::to_string(&detail.location)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            "INSERT INTO restaurant_detail (external_id, name, location_json, inserted_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(external_id) DO UPDATE SET
                name = excluded.name,
                location_json = excluded.location_json",
        )
        .bind(&detail.id.0)
        .bind(&detail.name)
        .bind(&location_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn detail_from_row(row: SqliteRow) -> Result<RestaurantDetail, RepositoryError> {
    let location_raw = row.try_get::<String, _>("location_json")?;
    let location = serde_json::from_str::<Vec<String>>(&location_raw).map_err(|error| {
        RepositoryError::Decode(format!("invalid location_json `{location_raw}`: {error}"))
    })?;

    Ok(RestaurantDetail {
        id: RestaurantId(row.try_get("external_id")?),
        name: row.try_get("name")?,
        location,
    })
}
