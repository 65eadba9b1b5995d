//! PostgreSQL storage backend.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, PgPool, Row};
use uuid::Uuid;

use crate::domain::context::RequestContext;
use crate::domain::entities::UserUrl;
use crate::domain::storage::{Storage, StorageKind};
use crate::error::AppError;
use crate::utils::db_error::map_sqlx_error;

/// Idempotent schema setup, run on every startup.
///
/// Columns and indexes are only ever added, never altered or dropped.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS urls (
        id UUID PRIMARY KEY,
        short_url VARCHAR(255) NOT NULL UNIQUE,
        original_url TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_short_url ON urls (short_url)",
    "ALTER TABLE urls ADD COLUMN IF NOT EXISTS owner_user_id TEXT",
    "CREATE INDEX IF NOT EXISTS idx_owner_user_id ON urls (owner_user_id)",
    "ALTER TABLE urls ADD COLUMN IF NOT EXISTS deleted BOOLEAN NOT NULL DEFAULT FALSE",
    "ALTER TABLE urls ADD COLUMN IF NOT EXISTS created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()",
];

const INSERT_URL: &str =
    "INSERT INTO urls (id, short_url, original_url, owner_user_id) VALUES ($1, $2, $3, $4)";

/// Storage backed by the `urls` table.
///
/// Key uniqueness is enforced by the table's unique constraint, so concurrent
/// writers of the same key are serialized by the database rather than by an
/// application-level check. Every call is bounded by the configured timeout.
pub struct PgStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgStore {
    /// Creates a store around an existing pool.
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Creates a store whose pool connects on first use.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Backend`] if `dsn` cannot be parsed.
    pub fn connect_lazy(
        dsn: &str,
        max_connections: u32,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(timeout)
            .connect_lazy(dsn)
            .map_err(|e| map_sqlx_error(e, None, timeout))?;

        Ok(Self::new(pool, timeout))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs `fut` under the per-call timeout.
    async fn bounded<T, F>(&self, key: Option<&str>, fut: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(|e| map_sqlx_error(e, key, self.timeout)),
            Err(_) => Err(AppError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl Storage for PgStore {
    async fn load(&self) -> Result<(), AppError> {
        let mut tx = self.bounded(None, self.pool.begin()).await?;

        for statement in SCHEMA {
            self.bounded(None, sqlx::query(statement).execute(&mut *tx))
                .await?;
        }

        self.bounded(None, tx.commit()).await?;
        tracing::info!("Database schema ready");
        Ok(())
    }

    async fn set(&self, ctx: &RequestContext, key: &str, value: &str) -> Result<(), AppError> {
        let user_id = ctx.user_id()?;

        self.bounded(
            Some(key),
            sqlx::query(INSERT_URL)
                .bind(Uuid::new_v4())
                .bind(key)
                .bind(value)
                .bind(user_id)
                .execute(&self.pool),
        )
        .await?;

        Ok(())
    }

    async fn set_batch(
        &self,
        ctx: &RequestContext,
        items: BTreeMap<String, String>,
    ) -> Result<(), AppError> {
        let user_id = ctx.user_id()?;
        let mut tx = self.bounded(None, self.pool.begin()).await?;

        for (key, value) in &items {
            let inserted = self
                .bounded(
                    Some(key),
                    sqlx::query(INSERT_URL)
                        .bind(Uuid::new_v4())
                        .bind(key)
                        .bind(value)
                        .bind(user_id)
                        .execute(&mut *tx),
                )
                .await;

            if let Err(e) = inserted {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "Batch rollback failed");
                }
                return Err(e);
            }
        }

        self.bounded(None, tx.commit()).await?;
        tracing::debug!(items = items.len(), "Batch committed");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<String, AppError> {
        let row = self
            .bounded(
                None,
                sqlx::query("SELECT original_url, deleted FROM urls WHERE short_url = $1")
                    .bind(key)
                    .fetch_optional(&self.pool),
            )
            .await?;

        let Some(row) = row else {
            return Err(AppError::NotFound {
                key: key.to_string(),
            });
        };

        let deleted: bool = row
            .try_get("deleted")
            .map_err(|e| map_sqlx_error(e, None, self.timeout))?;
        if deleted {
            return Err(AppError::Deleted {
                key: key.to_string(),
            });
        }

        row.try_get("original_url")
            .map_err(|e| map_sqlx_error(e, None, self.timeout))
    }

    async fn get_by_user_id(&self, ctx: &RequestContext) -> Result<Vec<UserUrl>, AppError> {
        let user_id = ctx.user_id()?;

        let rows = self
            .bounded(
                None,
                sqlx::query(
                    r#"
                    SELECT short_url, original_url, deleted
                    FROM urls
                    WHERE owner_user_id = $1
                    ORDER BY created_at, short_url
                    "#,
                )
                .bind(user_id)
                .fetch_all(&self.pool),
            )
            .await?;

        rows.into_iter()
            .map(|row| -> Result<UserUrl, sqlx::Error> {
                Ok(UserUrl {
                    short_key: row.try_get("short_url")?,
                    original_url: row.try_get("original_url")?,
                    deleted: row.try_get("deleted")?,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error(e, None, self.timeout))
    }

    async fn delete_batch(&self, keys: &[String], user_id: &str) -> Result<(), AppError> {
        if keys.is_empty() {
            return Ok(());
        }

        let result = self
            .bounded(
                None,
                sqlx::query(
                    r#"
                    UPDATE urls SET deleted = TRUE
                    WHERE short_url = ANY($1) AND owner_user_id = $2
                    "#,
                )
                .bind(keys)
                .bind(user_id)
                .execute(&self.pool),
            )
            .await?;

        tracing::debug!(
            user_id,
            requested = keys.len(),
            deleted = result.rows_affected(),
            "Soft-deleted keys"
        );
        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.bounded(None, async {
            let mut conn = self.pool.acquire().await?;
            conn.ping().await
        })
        .await
    }

    async fn close(&self) -> Result<(), AppError> {
        if self.pool.is_closed() {
            return Ok(());
        }

        tokio::time::timeout(self.timeout, self.pool.close())
            .await
            .map_err(|_| AppError::Timeout(self.timeout))?;
        tracing::info!("Database pool closed");
        Ok(())
    }

    fn kind(&self) -> StorageKind {
        StorageKind::Postgres
    }

    fn supports_atomic_batch(&self) -> bool {
        true
    }

    fn supports_soft_delete(&self) -> bool {
        true
    }
}
