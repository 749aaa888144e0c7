//! Book catalog service
//!
//! Books, authors, libraries and librarians. Book forms carry the author by
//! name; the author row is looked up or created on save.

use crate::db::repositories::{AuthorRepository, BookRepository, LibraryRepository};
use crate::forms::{BookForm, LibrarianForm, LibraryForm};
use crate::models::{BookInput, BookWithAuthor, Librarian, Library, LibraryDetail, User};
use anyhow::Context;
use std::sync::Arc;
use validator::{Validate, ValidationErrors};

/// Sample data loaded by `seed-books`: (title, author, publication year)
pub const SAMPLE_BOOKS: [(&str, &str, i32); 20] = [
    ("The Pragmatic Programmer", "Andrew Hunt", 1999),
    ("Clean Code", "Robert C. Martin", 2008),
    ("Django for APIs", "William S. Vincent", 2020),
    ("Python Crash Course", "Eric Matthes", 2015),
    ("Atomic Habits", "James Clear", 2018),
    ("Deep Work", "Cal Newport", 2016),
    ("Refactoring", "Martin Fowler", 1999),
    ("Introduction to Algorithms", "Thomas H. Cormen", 2009),
    ("Fluent Python", "Luciano Ramalho", 2015),
    ("Effective Java", "Joshua Bloch", 2008),
    ("Design Patterns", "Erich Gamma", 1994),
    ("You Don't Know JS", "Kyle Simpson", 2015),
    ("The Clean Coder", "Robert C. Martin", 2011),
    ("Zero to One", "Peter Thiel", 2014),
    ("Start With Why", "Simon Sinek", 2009),
    ("Algorithms to Live By", "Brian Christian", 2016),
    ("Grit", "Angela Duckworth", 2016),
    ("Thinking, Fast and Slow", "Daniel Kahneman", 2011),
    ("Drive", "Daniel H. Pink", 2009),
    ("The Art of Computer Programming", "Donald Knuth", 1968),
];

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid form: {0}")]
    InvalidForm(#[from] ValidationErrors),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CatalogService {
    book_repo: Arc<dyn BookRepository>,
    author_repo: Arc<dyn AuthorRepository>,
    library_repo: Arc<dyn LibraryRepository>,
}

impl CatalogService {
    pub fn new(
        book_repo: Arc<dyn BookRepository>,
        author_repo: Arc<dyn AuthorRepository>,
        library_repo: Arc<dyn LibraryRepository>,
    ) -> Self {
        Self {
            book_repo,
            author_repo,
            library_repo,
        }
    }

    /// Every book, newest publication year first
    pub async fn list_books(&self) -> Result<Vec<BookWithAuthor>, CatalogError> {
        let books = self
            .book_repo
            .list_ordered()
            .await
            .context("Failed to list books")?;
        Ok(books)
    }

    /// Every book in insertion order
    pub async fn list_all_books(&self) -> Result<Vec<BookWithAuthor>, CatalogError> {
        let books = self.book_repo.list_all().await.context("Failed to list books")?;
        Ok(books)
    }

    pub async fn create_book(
        &self,
        form: BookForm,
        owner: Option<&User>,
    ) -> Result<BookWithAuthor, CatalogError> {
        let input = self.book_input(form).await?;
        let book = self
            .book_repo
            .create(&input, owner.map(|u| u.id))
            .await
            .context("Failed to create book")?;

        tracing::info!("Book {} created: {}", book.id, book.title);
        self.get_book(book.id).await
    }

    pub async fn get_book(&self, id: i64) -> Result<BookWithAuthor, CatalogError> {
        self.book_repo
            .get_with_author(id)
            .await
            .context("Failed to get book")?
            .ok_or(CatalogError::NotFound("Book"))
    }

    pub async fn update_book(&self, id: i64, form: BookForm) -> Result<BookWithAuthor, CatalogError> {
        // 404 before 400 so a bad form on a missing book reports the book
        self.get_book(id).await?;

        let input = self.book_input(form).await?;
        let updated = self
            .book_repo
            .update(id, &input)
            .await
            .context("Failed to update book")?;
        if !updated {
            return Err(CatalogError::NotFound("Book"));
        }
        self.get_book(id).await
    }

    pub async fn delete_book(&self, id: i64) -> Result<(), CatalogError> {
        let deleted = self
            .book_repo
            .delete(id)
            .await
            .context("Failed to delete book")?;
        if !deleted {
            return Err(CatalogError::NotFound("Book"));
        }
        tracing::info!("Book {} deleted", id);
        Ok(())
    }

    /// "title by author" for every book, joined with ", "
    pub async fn book_list_text(&self) -> Result<String, CatalogError> {
        let books = self.list_all_books().await?;
        Ok(books
            .iter()
            .map(BookWithAuthor::display)
            .collect::<Vec<_>>()
            .join(", "))
    }

    /// `None` when no author has this exact name
    pub async fn get_books_by_author(
        &self,
        name: &str,
    ) -> Result<Option<Vec<BookWithAuthor>>, CatalogError> {
        let author = match self
            .author_repo
            .get_by_name(name)
            .await
            .context("Failed to get author")?
        {
            Some(a) => a,
            None => return Ok(None),
        };

        let books = self
            .book_repo
            .list_by_author(author.id)
            .await
            .context("Failed to list books by author")?;
        Ok(Some(books))
    }

    /// `None` when no library has this exact name
    pub async fn get_books_in_library(
        &self,
        name: &str,
    ) -> Result<Option<Vec<BookWithAuthor>>, CatalogError> {
        let library = match self.library_by_name(name).await? {
            Some(l) => l,
            None => return Ok(None),
        };

        let books = self
            .library_repo
            .books_in_library(library.id)
            .await
            .context("Failed to list library books")?;
        Ok(Some(books))
    }

    /// `None` when the library is unknown or has no librarian
    pub async fn get_librarian_for_library(
        &self,
        name: &str,
    ) -> Result<Option<Librarian>, CatalogError> {
        let library = match self.library_by_name(name).await? {
            Some(l) => l,
            None => return Ok(None),
        };

        let librarian = self
            .library_repo
            .librarian_for_library(library.id)
            .await
            .context("Failed to get librarian")?;
        Ok(librarian)
    }

    pub async fn library_detail(&self, id: i64) -> Result<LibraryDetail, CatalogError> {
        let library = self.get_library(id).await?;
        let books = self
            .library_repo
            .books_in_library(id)
            .await
            .context("Failed to list library books")?;
        let librarian = self
            .library_repo
            .librarian_for_library(id)
            .await
            .context("Failed to get librarian")?;

        Ok(LibraryDetail {
            library,
            books,
            librarian,
        })
    }

    pub async fn create_library(&self, form: LibraryForm) -> Result<Library, CatalogError> {
        form.validate()?;
        let name = form.name.trim();

        if self.library_by_name(name).await?.is_some() {
            return Err(CatalogError::Validation(
                "A library with that name already exists.".to_string(),
            ));
        }

        let library = self
            .library_repo
            .create(name)
            .await
            .context("Failed to create library")?;
        tracing::info!("Library created: {}", library.name);
        Ok(library)
    }

    pub async fn add_book_to_library(
        &self,
        library_id: i64,
        book_id: i64,
    ) -> Result<LibraryDetail, CatalogError> {
        self.get_library(library_id).await?;
        self.get_book(book_id).await?;

        self.library_repo
            .add_book(library_id, book_id)
            .await
            .context("Failed to add book to library")?;
        self.library_detail(library_id).await
    }

    /// A library has at most one librarian
    pub async fn create_librarian(
        &self,
        library_id: i64,
        form: LibrarianForm,
    ) -> Result<Librarian, CatalogError> {
        self.get_library(library_id).await?;
        form.validate()?;

        if self
            .library_repo
            .librarian_for_library(library_id)
            .await
            .context("Failed to get librarian")?
            .is_some()
        {
            return Err(CatalogError::Validation(
                "This library already has a librarian.".to_string(),
            ));
        }

        let librarian = self
            .library_repo
            .create_librarian(library_id, form.name.trim())
            .await
            .context("Failed to create librarian")?;
        Ok(librarian)
    }

    /// Insert the sample books that don't exist yet. Returns how many were created.
    pub async fn seed_sample_books(&self) -> Result<usize, CatalogError> {
        let mut created = 0;

        for (title, author, year) in SAMPLE_BOOKS {
            let author = self
                .author_repo
                .get_or_create(author)
                .await
                .context("Failed to get or create author")?;

            let existing = self
                .book_repo
                .find_exact(title, author.id, year)
                .await
                .context("Failed to look up book")?;
            if existing.is_some() {
                tracing::debug!("Sample book already present: {}", title);
                continue;
            }

            let input = BookInput {
                title: title.to_string(),
                author_id: author.id,
                publication_year: year,
            };
            self.book_repo
                .create(&input, None)
                .await
                .context("Failed to insert sample book")?;
            created += 1;
        }

        tracing::info!("Seeded {} sample books", created);
        Ok(created)
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    async fn book_input(&self, form: BookForm) -> Result<BookInput, CatalogError> {
        let form = form.cleaned();
        form.validate()?;

        let author = self
            .author_repo
            .get_or_create(&form.author)
            .await
            .context("Failed to get or create author")?;

        Ok(BookInput {
            title: form.title,
            author_id: author.id,
            publication_year: form.publication_year,
        })
    }

    async fn get_library(&self, id: i64) -> Result<Library, CatalogError> {
        self.library_repo
            .get_by_id(id)
            .await
            .context("Failed to get library")?
            .ok_or(CatalogError::NotFound("Library"))
    }

    async fn library_by_name(&self, name: &str) -> Result<Option<Library>, CatalogError> {
        let library = self
            .library_repo
            .get_by_name(name)
            .await
            .context("Failed to get library")?;
        Ok(library)
    }
}
