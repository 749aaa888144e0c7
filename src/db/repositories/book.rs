//! Book repository
//!
//! Listing queries join the author name and the creator's username so every
//! caller gets `BookWithAuthor` rows directly.

use crate::db::DynDatabasePool;
use crate::models::{Book, BookInput, BookWithAuthor};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

const BOOK_WITH_AUTHOR_SELECT: &str = r#"
    SELECT b.id, b.title, a.name AS author, b.publication_year, u.username AS owner
    FROM books b
    JOIN authors a ON a.id = b.author_id
    LEFT JOIN users u ON u.id = b.created_by
"#;

#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn create(&self, input: &BookInput, created_by: Option<i64>) -> Result<Book>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Book>>;

    /// Single book joined with author and owner
    async fn get_with_author(&self, id: i64) -> Result<Option<BookWithAuthor>>;

    /// Replace title, author and year. Returns false if the book doesn't exist.
    async fn update(&self, id: i64, input: &BookInput) -> Result<bool>;

    /// Returns false if the book doesn't exist
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Newest publication year first, then title
    async fn list_ordered(&self) -> Result<Vec<BookWithAuthor>>;

    /// Insertion order
    async fn list_all(&self) -> Result<Vec<BookWithAuthor>>;

    async fn list_by_author(&self, author_id: i64) -> Result<Vec<BookWithAuthor>>;

    /// Exact (title, author, year) match, used for idempotent seeding
    async fn find_exact(&self, title: &str, author_id: i64, year: i32) -> Result<Option<Book>>;

    async fn count(&self) -> Result<i64>;
}

pub struct SqlxBookRepository {
    pool: DynDatabasePool,
}

impl SqlxBookRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BookRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl BookRepository for SqlxBookRepository {
    async fn create(&self, input: &BookInput, created_by: Option<i64>) -> Result<Book> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO books (title, author_id, publication_year, created_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&input.title)
        .bind(input.author_id)
        .bind(input.publication_year)
        .bind(created_by)
        .bind(now)
        .bind(now)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to create book")?;

        Ok(Book {
            id: result.last_insert_rowid(),
            title: input.title.clone(),
            author_id: input.author_id,
            publication_year: input.publication_year,
            created_by,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Book>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, author_id, publication_year, created_by, created_at, updated_at
            FROM books WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.sqlite())
        .await
        .context("Failed to get book by ID")?;

        row.as_ref().map(row_to_book_sqlite).transpose()
    }

    async fn get_with_author(&self, id: i64) -> Result<Option<BookWithAuthor>> {
        let row = sqlx::query(&format!("{} WHERE b.id = ?", BOOK_WITH_AUTHOR_SELECT))
            .bind(id)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get book")?;

        row.as_ref().map(row_to_book_with_author_sqlite).transpose()
    }

    async fn update(&self, id: i64, input: &BookInput) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE books SET title = ?, author_id = ?, publication_year = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&input.title)
        .bind(input.author_id)
        .bind(input.publication_year)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to update book")?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to delete book")?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_ordered(&self) -> Result<Vec<BookWithAuthor>> {
        list_books_sqlite(
            self.pool.sqlite(),
            "ORDER BY b.publication_year DESC, b.title ASC",
            None,
        )
        .await
    }

    async fn list_all(&self) -> Result<Vec<BookWithAuthor>> {
        list_books_sqlite(self.pool.sqlite(), "ORDER BY b.id ASC", None).await
    }

    async fn list_by_author(&self, author_id: i64) -> Result<Vec<BookWithAuthor>> {
        list_books_sqlite(
            self.pool.sqlite(),
            "WHERE b.author_id = ? ORDER BY b.id ASC",
            Some(author_id),
        )
        .await
    }

    async fn find_exact(&self, title: &str, author_id: i64, year: i32) -> Result<Option<Book>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, author_id, publication_year, created_by, created_at, updated_at
            FROM books WHERE title = ? AND author_id = ? AND publication_year = ?
            LIMIT 1
            "#,
        )
        .bind(title)
        .bind(author_id)
        .bind(year)
        .fetch_optional(self.pool.sqlite())
        .await
        .context("Failed to find book")?;

        row.as_ref().map(row_to_book_sqlite).transpose()
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(self.pool.sqlite())
            .await
            .context("Failed to count books")?;
        Ok(count)
    }
}

async fn list_books_sqlite(
    pool: &SqlitePool,
    tail: &str,
    bind: Option<i64>,
) -> Result<Vec<BookWithAuthor>> {
    let sql = format!("{} {}", BOOK_WITH_AUTHOR_SELECT, tail);
    let mut query = sqlx::query(&sql);
    if let Some(value) = bind {
        query = query.bind(value);
    }

    let rows = query.fetch_all(pool).await.context("Failed to list books")?;
    rows.iter().map(row_to_book_with_author_sqlite).collect()
}

fn row_to_book_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Book> {
    Ok(Book {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        author_id: row.try_get("author_id")?,
        publication_year: row.try_get("publication_year")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub(crate) fn row_to_book_with_author_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<BookWithAuthor> {
    Ok(BookWithAuthor {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        author: row.try_get("author")?,
        publication_year: row.try_get("publication_year")?,
        owner: row.try_get("owner")?,
    })
}

pub(crate) fn book_with_author_select() -> &'static str {
    BOOK_WITH_AUTHOR_SELECT
}
