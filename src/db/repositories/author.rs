//! Author repository

use crate::db::DynDatabasePool;
use crate::models::Author;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait AuthorRepository: Send + Sync {
    /// Find an author by exact name or insert one
    async fn get_or_create(&self, name: &str) -> Result<Author>;

    async fn get_by_name(&self, name: &str) -> Result<Option<Author>>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Author>>;

    /// All authors ordered by name
    async fn list(&self) -> Result<Vec<Author>>;
}

pub struct SqlxAuthorRepository {
    pool: DynDatabasePool,
}

impl SqlxAuthorRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AuthorRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AuthorRepository for SqlxAuthorRepository {
    async fn get_or_create(&self, name: &str) -> Result<Author> {
        let pool = self.pool.sqlite();
        sqlx::query("INSERT OR IGNORE INTO authors (name) VALUES (?)")
            .bind(name)
            .execute(pool)
            .await
            .context("Failed to create author")?;

        get_author_by_name_sqlite(pool, name)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Author missing after insert"))
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Author>> {
        get_author_by_name_sqlite(self.pool.sqlite(), name).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Author>> {
        let row = sqlx::query("SELECT id, name FROM authors WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get author by ID")?;

        row.as_ref().map(row_to_author_sqlite).transpose()
    }

    async fn list(&self) -> Result<Vec<Author>> {
        let rows = sqlx::query("SELECT id, name FROM authors ORDER BY name")
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list authors")?;

        rows.iter().map(row_to_author_sqlite).collect()
    }
}

async fn get_author_by_name_sqlite(pool: &SqlitePool, name: &str) -> Result<Option<Author>> {
    let row = sqlx::query("SELECT id, name FROM authors WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("Failed to get author by name")?;

    row.as_ref().map(row_to_author_sqlite).transpose()
}

fn row_to_author_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Author> {
    Ok(Author {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
    })
}
