use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::traits::ScratchStore;

/// Expiring key-value entries in the `scratch_entries` table.
///
/// Expiry is enforced on read; `purge_expired` reclaims the rows.
#[derive(Clone)]
pub struct PgScratchStore {
    pool: PgPool,
}

impl PgScratchStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScratchStore for PgScratchStore {
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<Option<String>> {
        let mut tx = self.pool.begin().await?;

        let previous = sqlx::query_scalar::<_, String>(
            "SELECT value FROM scratch_entries WHERE key = $1 AND expires_at > now() FOR UPDATE",
        )
        .bind(key)
        .fetch_optional(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO scratch_entries (key, value, expires_at)
            VALUES ($1, $2, now() + make_interval(secs => $3))
            ON CONFLICT (key) DO UPDATE SET
              value = EXCLUDED.value,
              expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(key)
        .bind(&value)
        .bind(ttl.as_secs_f64())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(previous)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar::<_, String>(
            "SELECT value FROM scratch_entries WHERE key = $1 AND expires_at > now()",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(value)
    }

    async fn take(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query_as::<_, (String, bool)>(
            "DELETE FROM scratch_entries WHERE key = $1 RETURNING value, expires_at > now()",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|(value, live)| live.then_some(value)))
    }

    async fn purge_expired(&self) -> Result<Vec<(String, String)>> {
        let removed = sqlx::query_as::<_, (String, String)>(
            "DELETE FROM scratch_entries WHERE expires_at <= now() RETURNING key, value",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(removed)
    }
}
