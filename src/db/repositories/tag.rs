//! Tag repository
//!
//! Database operations for tags and the post-tag association.

use crate::db::DynDatabasePool;
use crate::models::{Tag, TagWithCount};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Find a tag by exact name or create it with a unique slug
    async fn get_or_create(&self, name: &str) -> Result<Tag>;

    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>>;

    /// Replace the tags of a post
    async fn set_post_tags(&self, post_id: i64, tag_ids: &[i64]) -> Result<()>;

    /// Tags on a post, ordered by name
    async fn tags_for_post(&self, post_id: i64) -> Result<Vec<Tag>>;

    /// Every tag with its post count, most used first
    async fn list_with_counts(&self) -> Result<Vec<TagWithCount>>;
}

/// SQLx-based tag repository implementation
pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn get_or_create(&self, name: &str) -> Result<Tag> {
        let pool = self.pool.sqlite();
        if let Some(tag) = get_tag_by_name_sqlite(pool, name).await? {
            return Ok(tag);
        }

        let slug = unique_slug_sqlite(pool, name).await?;
        let result = sqlx::query("INSERT INTO tags (name, slug) VALUES (?, ?)")
            .bind(name)
            .bind(&slug)
            .execute(pool)
            .await
            .context("Failed to create tag")?;

        Ok(Tag {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            slug,
        })
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>> {
        get_tag_by_name_sqlite(self.pool.sqlite(), name).await
    }

    async fn set_post_tags(&self, post_id: i64, tag_ids: &[i64]) -> Result<()> {
        let mut tx = self
            .pool
            .sqlite()
            .begin()
            .await
            .context("Failed to begin transaction")?;

        sqlx::query("DELETE FROM post_tags WHERE post_id = ?")
            .bind(post_id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear post tags")?;

        for tag_id in tag_ids {
            sqlx::query("INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?, ?)")
                .bind(post_id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await
                .context("Failed to add tag to post")?;
        }

        tx.commit().await.context("Failed to commit post tags")?;
        Ok(())
    }

    async fn tags_for_post(&self, post_id: i64) -> Result<Vec<Tag>> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.name, t.slug
            FROM tags t
            JOIN post_tags pt ON pt.tag_id = t.id
            WHERE pt.post_id = ?
            ORDER BY t.name
            "#,
        )
        .bind(post_id)
        .fetch_all(self.pool.sqlite())
        .await
        .context("Failed to get tags for post")?;

        rows.iter().map(row_to_tag_sqlite).collect()
    }

    async fn list_with_counts(&self) -> Result<Vec<TagWithCount>> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.name, t.slug, COUNT(pt.post_id) AS post_count
            FROM tags t
            LEFT JOIN post_tags pt ON pt.tag_id = t.id
            GROUP BY t.id, t.name, t.slug
            ORDER BY post_count DESC, t.name ASC
            "#,
        )
        .fetch_all(self.pool.sqlite())
        .await
        .context("Failed to get tags with counts")?;

        rows.iter()
            .map(|row| {
                Ok(TagWithCount {
                    tag: row_to_tag_sqlite(row)?,
                    post_count: row.try_get("post_count")?,
                })
            })
            .collect()
    }
}

async fn get_tag_by_name_sqlite(pool: &SqlitePool, name: &str) -> Result<Option<Tag>> {
    let row = sqlx::query("SELECT id, name, slug FROM tags WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("Failed to get tag by name")?;

    row.as_ref().map(row_to_tag_sqlite).transpose()
}

/// Slug for `name`, suffixed with -2, -3, ... when another tag already has it
async fn unique_slug_sqlite(pool: &SqlitePool, name: &str) -> Result<String> {
    let mut base = generate_tag_slug(name);
    if base.is_empty() {
        base = "tag".to_string();
    }

    let mut candidate = base.clone();
    let mut suffix = 2;
    loop {
        let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tags WHERE slug = ?")
            .bind(&candidate)
            .fetch_one(pool)
            .await
            .context("Failed to check tag slug")?;
        if taken == 0 {
            return Ok(candidate);
        }
        candidate = format!("{}-{}", base, suffix);
        suffix += 1;
    }
}

/// Generate a URL-friendly slug from a tag name.
///
/// Lowercases, maps spaces and ASCII punctuation to hyphens, keeps
/// non-ASCII letters and collapses runs of hyphens.
pub fn generate_tag_slug(name: &str) -> String {
    let mut result = String::new();
    let mut prev_hyphen = false;

    for c in name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() || !c.is_ascii() {
            result.push(c);
            prev_hyphen = false;
        } else if !prev_hyphen && !result.is_empty() {
            result.push('-');
            prev_hyphen = true;
        }
    }

    result.trim_end_matches('-').to_string()
}

fn row_to_tag_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Tag> {
    Ok(Tag {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
    })
}
