//! Library and librarian repository

use super::book::{book_with_author_select, row_to_book_with_author_sqlite};
use crate::db::DynDatabasePool;
use crate::models::{BookWithAuthor, Librarian, Library};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait LibraryRepository: Send + Sync {
    async fn create(&self, name: &str) -> Result<Library>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Library>>;

    async fn get_by_name(&self, name: &str) -> Result<Option<Library>>;

    /// Add a book to the library's holdings; adding twice is a no-op
    async fn add_book(&self, library_id: i64, book_id: i64) -> Result<()>;

    /// Holdings ordered by title
    async fn books_in_library(&self, library_id: i64) -> Result<Vec<BookWithAuthor>>;

    /// Fails if the library already has a librarian
    async fn create_librarian(&self, library_id: i64, name: &str) -> Result<Librarian>;

    async fn librarian_for_library(&self, library_id: i64) -> Result<Option<Librarian>>;
}

pub struct SqlxLibraryRepository {
    pool: DynDatabasePool,
}

impl SqlxLibraryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn LibraryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl LibraryRepository for SqlxLibraryRepository {
    async fn create(&self, name: &str) -> Result<Library> {
        let result = sqlx::query("INSERT INTO libraries (name) VALUES (?)")
            .bind(name)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to create library")?;

        Ok(Library {
            id: result.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Library>> {
        let row = sqlx::query("SELECT id, name FROM libraries WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get library by ID")?;

        row.as_ref().map(row_to_library_sqlite).transpose()
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Library>> {
        let row = sqlx::query("SELECT id, name FROM libraries WHERE name = ?")
            .bind(name)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get library by name")?;

        row.as_ref().map(row_to_library_sqlite).transpose()
    }

    async fn add_book(&self, library_id: i64, book_id: i64) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO library_books (library_id, book_id) VALUES (?, ?)")
            .bind(library_id)
            .bind(book_id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to add book to library")?;
        Ok(())
    }

    async fn books_in_library(&self, library_id: i64) -> Result<Vec<BookWithAuthor>> {
        let sql = format!(
            "{} JOIN library_books lb ON lb.book_id = b.id WHERE lb.library_id = ? ORDER BY b.title",
            book_with_author_select()
        );
        let rows = sqlx::query(&sql)
            .bind(library_id)
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list library books")?;

        rows.iter().map(row_to_book_with_author_sqlite).collect()
    }

    async fn create_librarian(&self, library_id: i64, name: &str) -> Result<Librarian> {
        let result = sqlx::query("INSERT INTO librarians (name, library_id) VALUES (?, ?)")
            .bind(name)
            .bind(library_id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to create librarian")?;

        Ok(Librarian {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            library_id,
        })
    }

    async fn librarian_for_library(&self, library_id: i64) -> Result<Option<Librarian>> {
        let row = sqlx::query("SELECT id, name, library_id FROM librarians WHERE library_id = ?")
            .bind(library_id)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get librarian")?;

        match row {
            Some(row) => Ok(Some(Librarian {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                library_id: row.try_get("library_id")?,
            })),
            None => Ok(None),
        }
    }
}

fn row_to_library_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Library> {
    Ok(Library {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        AuthorRepository, BookRepository, SqlxAuthorRepository, SqlxBookRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::BookInput;

    #[tokio::test]
    async fn test_holdings_and_librarian() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let libraries = SqlxLibraryRepository::new(pool.clone());
        let books = SqlxBookRepository::new(pool.clone());
        let author = SqlxAuthorRepository::new(pool)
            .get_or_create("Cal Newport")
            .await
            .unwrap();

        let central = libraries.create("Central").await.unwrap();
        assert!(libraries.create("Central").await.is_err());

        let book = books
            .create(
                &BookInput {
                    title: "Deep Work".to_string(),
                    author_id: author.id,
                    publication_year: 2016,
                },
                None,
            )
            .await
            .unwrap();
        libraries.add_book(central.id, book.id).await.unwrap();
        libraries.add_book(central.id, book.id).await.unwrap();

        let held = libraries.books_in_library(central.id).await.unwrap();
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].author, "Cal Newport");

        assert!(libraries.librarian_for_library(central.id).await.unwrap().is_none());
        let librarian = libraries.create_librarian(central.id, "Ada").await.unwrap();
        assert_eq!(
            libraries.librarian_for_library(central.id).await.unwrap(),
            Some(librarian)
        );
        assert!(libraries.create_librarian(central.id, "Grace").await.is_err());

        assert_eq!(libraries.get_by_name("Central").await.unwrap(), Some(central));
    }
}
