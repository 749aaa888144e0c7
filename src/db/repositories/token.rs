//! API token repository
//!
//! One token per user, created on first request and reused afterwards.

use crate::db::DynDatabasePool;
use crate::models::ApiToken;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Return the user's token, creating it if missing
    async fn get_or_create(&self, user_id: i64) -> Result<ApiToken>;

    /// Resolve a token key to its user id
    async fn get_user_id(&self, key: &str) -> Result<Option<i64>>;

    async fn delete_for_user(&self, user_id: i64) -> Result<()>;
}

pub struct SqlxTokenRepository {
    pool: DynDatabasePool,
}

impl SqlxTokenRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TokenRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TokenRepository for SqlxTokenRepository {
    async fn get_or_create(&self, user_id: i64) -> Result<ApiToken> {
        let pool = self.pool.sqlite();
        if let Some(token) = get_token_for_user_sqlite(pool, user_id).await? {
            return Ok(token);
        }

        let token = ApiToken {
            key: generate_key(),
            user_id,
            created_at: Utc::now(),
        };

        // A concurrent request may have inserted first; keep whichever row won.
        sqlx::query("INSERT OR IGNORE INTO api_tokens (key, user_id, created_at) VALUES (?, ?, ?)")
            .bind(&token.key)
            .bind(token.user_id)
            .bind(token.created_at)
            .execute(pool)
            .await
            .context("Failed to create API token")?;

        get_token_for_user_sqlite(pool, user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("API token missing after insert"))
    }

    async fn get_user_id(&self, key: &str) -> Result<Option<i64>> {
        let user_id: Option<i64> = sqlx::query_scalar("SELECT user_id FROM api_tokens WHERE key = ?")
            .bind(key)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to look up API token")?;
        Ok(user_id)
    }

    async fn delete_for_user(&self, user_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM api_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to delete API token")?;
        Ok(())
    }
}

/// 40 hex characters
fn generate_key() -> String {
    let a = Uuid::new_v4().simple().to_string();
    let b = Uuid::new_v4().simple().to_string();
    format!("{}{}", a, &b[..8])
}

async fn get_token_for_user_sqlite(pool: &SqlitePool, user_id: i64) -> Result<Option<ApiToken>> {
    let row = sqlx::query("SELECT key, user_id, created_at FROM api_tokens WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get API token")?;

    match row {
        Some(row) => Ok(Some(ApiToken {
            key: row.try_get("key")?,
            user_id: row.try_get("user_id")?,
            created_at: row.try_get("created_at")?,
        })),
        None => Ok(None),
    }
}
