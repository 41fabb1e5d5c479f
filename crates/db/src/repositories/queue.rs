use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::Row;
use tokio::time::Instant;
use uuid::Uuid;

use dinely_core::domain::request::SuggestionRequest;
use dinely_core::queue::{QueueError, QueueMessage, ReceiptHandle, RequestQueue};

use crate::DbPool;

const EMPTY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Durable queue backed by the `suggestion_queue_message` table. Claims are
/// optimistic: a row is owned only if the UPDATE that rotates its receipt
/// handle matched the handle observed during the scan.
pub struct SqlRequestQueue {
    pool: DbPool,
}

impl SqlRequestQueue {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn claim_batch(
        &self,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        let now = Utc::now();
        let limit = i64::try_from(max_messages).unwrap_or(i64::MAX);

        let rows = sqlx::query(
            "SELECT
                id,
                body_json,
                category,
                area,
                party_size,
                date,
                time,
                delivery_address,
                receipt_handle,
                receive_count
             FROM suggestion_queue_message
             WHERE visible_at <= ?
             ORDER BY enqueued_at ASC
             LIMIT ?",
        )
        .bind(now.to_rfc3339())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let hidden_until: DateTime<Utc> = now + visibility_timeout;
        let mut claimed = Vec::with_capacity(rows.len());

        for row in rows {
            let id = row.try_get::<String, _>("id").map_err(backend)?;
            let seen_handle = row.try_get::<String, _>("receipt_handle").map_err(backend)?;
            let new_handle = Uuid::new_v4().to_string();

            // Another consumer may have claimed the row since the scan; the
            // handle guard makes that claim lose silently here.
            let updated = sqlx::query(
                "UPDATE suggestion_queue_message
                 SET receipt_handle = ?, visible_at = ?, receive_count = receive_count + 1
                 WHERE id = ? AND receipt_handle = ?",
            )
            .bind(&new_handle)
            .bind(hidden_until.to_rfc3339())
            .bind(&id)
            .bind(&seen_handle)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

            if updated.rows_affected() == 0 {
                continue;
            }

            let receive_count =
                u32::try_from(row.try_get::<i64, _>("receive_count").map_err(backend)?)
                    .unwrap_or(0)
                    + 1;

            claimed.push(QueueMessage {
                message_id: id,
                receipt_handle: ReceiptHandle(new_handle),
                body: row.try_get("body_json").map_err(backend)?,
                attributes: attributes_from_row(&row).map_err(backend)?,
                receive_count,
            });
        }

        Ok(claimed)
    }
}

#[async_trait::async_trait]
impl RequestQueue for SqlRequestQueue {
    async fn enqueue(&self, request: &SuggestionRequest) -> Result<String, QueueError> {
        let body =
            serde_json::to_string(request).map_err(|error| QueueError::Encode(error.to_string()))?;
        let message_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let attributes = request.to_attributes();

        let attribute = |key: &str| {
            attributes
                .get(key)
                .cloned()
                .ok_or_else(|| QueueError::Encode(format!("missing attribute `{key}`")))
        };

        sqlx::query(
            "INSERT INTO suggestion_queue_message (
                id,
                body_json,
                category,
                area,
                party_size,
                date,
                time,
                delivery_address,
                receipt_handle,
                visible_at,
                receive_count,
                enqueued_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(&message_id)
        .bind(&body)
        .bind(attribute("category")?)
        .bind(attribute("area")?)
        .bind(attribute("party_size")?)
        .bind(attribute("date")?)
        .bind(attribute("time")?)
        .bind(attribute("delivery_address")?)
        .bind(Uuid::new_v4().to_string())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(message_id)
    }

    async fn receive(
        &self,
        max_messages: usize,
        visibility_timeout: Duration,
        wait: Duration,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        let deadline = Instant::now() + wait;
        loop {
            let claimed = self.claim_batch(max_messages, visibility_timeout).await?;
            if !claimed.is_empty() || Instant::now() >= deadline {
                return Ok(claimed);
            }
            tokio::time::sleep(EMPTY_POLL_INTERVAL).await;
        }
    }

    async fn acknowledge(&self, receipt: &ReceiptHandle) -> Result<(), QueueError> {
        let deleted = sqlx::query("DELETE FROM suggestion_queue_message WHERE receipt_handle = ?")
            .bind(&receipt.0)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if deleted.rows_affected() == 0 {
            return Err(QueueError::StaleReceipt(receipt.0.clone()));
        }
        Ok(())
    }
}

fn attributes_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<BTreeMap<String, String>, sqlx::Error> {
    Ok(BTreeMap::from([
        ("category".to_string(), row.try_get::<String, _>("category")?),
        ("area".to_string(), row.try_get::<String, _>("area")?),
        ("party_size".to_string(), row.try_get::<String, _>("party_size")?),
        ("date".to_string(), row.try_get::<String, _>("date")?),
        ("time".to_string(), row.try_get::<String, _>("time")?),
        ("delivery_address".to_string(), row.try_get::<String, _>("delivery_address")?),
    ]))
}

fn backend(error: sqlx::Error) -> QueueError {
    QueueError::Backend(error.to_string())
}
