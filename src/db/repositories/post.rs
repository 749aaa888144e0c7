//! Post repository
//!
//! Rows come back as `PostWithMeta` with the author username filled in and
//! `tags` left empty; tags are attached by the blog service.

use super::escape_like;
use crate::db::DynDatabasePool;
use crate::models::{ListParams, PagedResult, Post, PostWithMeta};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

const POST_SELECT: &str = r#"
    SELECT p.id, p.title, p.content, p.author_id, p.published_date, p.updated_at,
           u.username AS author
    FROM posts p
    JOIN users u ON u.id = p.author_id
"#;

const NEWEST_FIRST: &str = "ORDER BY p.published_date DESC, p.id DESC";

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, title: &str, content: &str, author_id: i64) -> Result<Post>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    async fn get_with_author(&self, id: i64) -> Result<Option<PostWithMeta>>;

    /// Returns false if the post doesn't exist
    async fn update(&self, id: i64, title: &str, content: &str) -> Result<bool>;

    /// Deletes the post and, through the foreign keys, its comments and tag links
    async fn delete(&self, id: i64) -> Result<bool>;

    /// One page of posts, newest first
    async fn list_paged(&self, params: &ListParams) -> Result<PagedResult<PostWithMeta>>;

    /// Posts carrying a tag with exactly this name, newest first
    async fn list_by_tag_name(&self, tag_name: &str) -> Result<Vec<PostWithMeta>>;

    /// Distinct posts whose title, content or any tag name contains `query`
    async fn search(&self, query: &str) -> Result<Vec<PostWithMeta>>;
}

pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, title: &str, content: &str, author_id: i64) -> Result<Post> {
        create_post_sqlite(self.pool.sqlite(), title, content, author_id).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        let row = sqlx::query(
            "SELECT id, title, content, author_id, published_date, updated_at FROM posts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool.sqlite())
        .await
        .context("Failed to get post by ID")?;

        row.as_ref().map(row_to_post_sqlite).transpose()
    }

    async fn get_with_author(&self, id: i64) -> Result<Option<PostWithMeta>> {
        let row = sqlx::query(&format!("{} WHERE p.id = ?", POST_SELECT))
            .bind(id)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get post")?;

        row.as_ref().map(row_to_post_with_meta_sqlite).transpose()
    }

    async fn update(&self, id: i64, title: &str, content: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE posts SET title = ?, content = ?, updated_at = ? WHERE id = ?")
            .bind(title)
            .bind(content)
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to update post")?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to delete post")?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_paged(&self, params: &ListParams) -> Result<PagedResult<PostWithMeta>> {
        list_posts_paged_sqlite(self.pool.sqlite(), params).await
    }

    async fn list_by_tag_name(&self, tag_name: &str) -> Result<Vec<PostWithMeta>> {
        let sql = format!(
            r#"{}
            WHERE p.id IN (
                SELECT pt.post_id FROM post_tags pt
                JOIN tags t ON t.id = pt.tag_id
                WHERE t.name = ?
            )
            {}"#,
            POST_SELECT, NEWEST_FIRST
        );
        let rows = sqlx::query(&sql)
            .bind(tag_name)
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list posts by tag")?;

        rows.iter().map(row_to_post_with_meta_sqlite).collect()
    }

    async fn search(&self, query: &str) -> Result<Vec<PostWithMeta>> {
        search_posts_sqlite(self.pool.sqlite(), query).await
    }
}

async fn create_post_sqlite(
    pool: &SqlitePool,
    title: &str,
    content: &str,
    author_id: i64,
) -> Result<Post> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO posts (title, content, author_id, published_date, updated_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(title)
    .bind(content)
    .bind(author_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_rowid(),
        title: title.to_string(),
        content: content.to_string(),
        author_id,
        published_date: now,
        updated_at: now,
    })
}

async fn list_posts_paged_sqlite(
    pool: &SqlitePool,
    params: &ListParams,
) -> Result<PagedResult<PostWithMeta>> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;

    let rows = sqlx::query(&format!("{} {} LIMIT ? OFFSET ?", POST_SELECT, NEWEST_FIRST))
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list posts")?;

    let items = rows
        .iter()
        .map(row_to_post_with_meta_sqlite)
        .collect::<Result<Vec<_>>>()?;

    Ok(PagedResult::new(items, total, params))
}

async fn search_posts_sqlite(pool: &SqlitePool, query: &str) -> Result<Vec<PostWithMeta>> {
    let pattern = format!("%{}%", escape_like(&query.to_lowercase()));
    let sql = format!(
        r#"{}
        WHERE LOWER(p.title) LIKE ? ESCAPE '\'
           OR LOWER(p.content) LIKE ? ESCAPE '\'
           OR p.id IN (
                SELECT pt.post_id FROM post_tags pt
                JOIN tags t ON t.id = pt.tag_id
                WHERE LOWER(t.name) LIKE ? ESCAPE '\'
           )
        {}"#,
        POST_SELECT, NEWEST_FIRST
    );

    let rows = sqlx::query(&sql)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .fetch_all(pool)
        .await
        .context("Failed to search posts")?;

    rows.iter().map(row_to_post_with_meta_sqlite).collect()
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Post> {
    Ok(Post {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        author_id: row.try_get("author_id")?,
        published_date: row.try_get("published_date")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_post_with_meta_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<PostWithMeta> {
    Ok(PostWithMeta {
        post: row_to_post_sqlite(row)?,
        author: row.try_get("author")?,
        tags: Vec::new(),
    })
}
