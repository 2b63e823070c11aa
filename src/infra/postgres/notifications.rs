//! PostgreSQL-backed notification inserts
//!
//! Settlement only inserts notification rows; delivery is another service's
//! concern.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::domain::UserId;
use crate::infra::{NotificationSink, Result};

pub struct PgNotificationSink {
    pool: PgPool,
}

impl PgNotificationSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationSink for PgNotificationSink {
    async fn notify(
        &self,
        user_id: &UserId,
        kind: &str,
        title: &str,
        body: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, kind, title, body, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id.0)
        .bind(kind)
        .bind(title)
        .bind(body)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
