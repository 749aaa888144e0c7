//! Comment repository

use crate::db::DynDatabasePool;
use crate::models::{Comment, CommentRow};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create(
        &self,
        post_id: i64,
        author_id: i64,
        parent_id: Option<i64>,
        content: &str,
    ) -> Result<Comment>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// Returns false if the comment doesn't exist
    async fn update(&self, id: i64, content: &str) -> Result<bool>;

    /// Deletes the comment and its replies
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Every comment on the post, oldest first, joined with its author
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentRow>>;
}

pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(
        &self,
        post_id: i64,
        author_id: i64,
        parent_id: Option<i64>,
        content: &str,
    ) -> Result<Comment> {
        create_comment_sqlite(self.pool.sqlite(), post_id, author_id, parent_id, content).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        let row = sqlx::query(
            r#"
            SELECT id, post_id, author_id, parent_id, content, created_at, updated_at
            FROM comments WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.sqlite())
        .await
        .context("Failed to get comment")?;

        row.as_ref().map(row_to_comment_sqlite).transpose()
    }

    async fn update(&self, id: i64, content: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE comments SET content = ?, updated_at = ? WHERE id = ?")
            .bind(content)
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to update comment")?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to delete comment")?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentRow>> {
        list_comments_for_post_sqlite(self.pool.sqlite(), post_id).await
    }
}

async fn create_comment_sqlite(
    pool: &SqlitePool,
    post_id: i64,
    author_id: i64,
    parent_id: Option<i64>,
    content: &str,
) -> Result<Comment> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO comments (post_id, author_id, parent_id, content, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(post_id)
    .bind(author_id)
    .bind(parent_id)
    .bind(content)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create comment")?;

    Ok(Comment {
        id: result.last_insert_rowid(),
        post_id,
        author_id,
        parent_id,
        content: content.to_string(),
        created_at: now,
        updated_at: now,
    })
}

async fn list_comments_for_post_sqlite(pool: &SqlitePool, post_id: i64) -> Result<Vec<CommentRow>> {
    let rows = sqlx::query(
        r#"
        SELECT c.id, c.post_id, c.author_id, c.parent_id, c.content, c.created_at, c.updated_at,
               u.username AS author, u.email AS author_email
        FROM comments c
        JOIN users u ON u.id = c.author_id
        WHERE c.post_id = ?
        ORDER BY c.created_at ASC, c.id ASC
        "#,
    )
    .bind(post_id)
    .fetch_all(pool)
    .await
    .context("Failed to list comments")?;

    rows.iter()
        .map(|row| {
            Ok(CommentRow {
                comment: row_to_comment_sqlite(row)?,
                author: row.try_get("author")?,
                author_email: row.try_get("author_email")?,
            })
        })
        .collect()
}

fn row_to_comment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Comment> {
    Ok(Comment {
        id: row.try_get("id")?,
        post_id: row.try_get("post_id")?,
        author_id: row.try_get("author_id")?,
        parent_id: row.try_get("parent_id")?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        PostRepository, SqlxPostRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::User;

    async fn setup() -> (SqlxCommentRepository, SqlxPostRepository, i64, i64) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new("reader".into(), "Reader@Example.com".into(), "h".into()))
            .await
            .unwrap();
        let posts = SqlxPostRepository::new(pool.clone());
        let post = posts.create("Hello", "World", user.id).await.unwrap();
        (SqlxCommentRepository::new(pool), posts, post.id, user.id)
    }

    #[tokio::test]
    async fn test_list_for_post_oldest_first_with_author() {
        let (repo, _posts, post_id, user_id) = setup().await;
        let first = repo.create(post_id, user_id, None, "first").await.unwrap();
        let reply = repo.create(post_id, user_id, Some(first.id), "reply").await.unwrap();

        let rows = repo.list_for_post(post_id).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].comment.id, first.id);
        assert_eq!(rows[1].comment.parent_id, Some(first.id));
        assert_eq!(rows[1].comment.id, reply.id);
        assert_eq!(rows[0].author, "reader");
        assert_eq!(rows[0].author_email, "Reader@Example.com");
    }

    #[tokio::test]
    async fn test_delete_parent_removes_replies() {
        let (repo, _posts, post_id, user_id) = setup().await;
        let parent = repo.create(post_id, user_id, None, "parent").await.unwrap();
        let child = repo.create(post_id, user_id, Some(parent.id), "child").await.unwrap();

        assert!(repo.update(child.id, "edited").await.unwrap());
        assert_eq!(repo.get_by_id(child.id).await.unwrap().unwrap().content, "edited");

        assert!(repo.delete(parent.id).await.unwrap());
        assert!(repo.get_by_id(child.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deleting_post_cascades_to_comments() {
        let (repo, posts, post_id, user_id) = setup().await;
        let comment = repo.create(post_id, user_id, None, "bye").await.unwrap();
        posts.delete(post_id).await.unwrap();
        assert!(repo.get_by_id(comment.id).await.unwrap().is_none());
    }
}
