use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::{error::Result, repository::WebhookEventRepository};

pub struct SqliteWebhookEventRepository {
    pool: SqlitePool,
}

impl SqliteWebhookEventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WebhookEventRepository for SqliteWebhookEventRepository {
    async fn is_processed(&self, event_id: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM webhook_events WHERE event_id = ?"
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn record(&self, event_id: &str, kind: &str, outcome: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO webhook_events (event_id, kind, outcome, received_at)
            VALUES (?, ?, ?, ?)
            "#
        )
        .bind(event_id)
        .bind(kind)
        .bind(outcome)
        .bind(Utc::now().naive_utc())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
