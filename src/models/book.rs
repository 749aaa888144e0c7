//! Catalog models: authors, books, libraries and librarians

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Book author, unique by name
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Author {
    pub id: i64,
    pub name: String,
}

/// Book record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author_id: i64,
    pub publication_year: i32,
    /// User who created the record, if any
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Book joined with its author name and owner username.
///
/// This is the shape every book-listing endpoint serializes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookWithAuthor {
    pub id: i64,
    pub title: String,
    /// Author name
    pub author: String,
    pub publication_year: i32,
    /// Username of the creator, read-only
    pub owner: Option<String>,
}

impl BookWithAuthor {
    /// "title by author"
    pub fn display(&self) -> String {
        format!("{} by {}", self.title, self.author)
    }
}

/// Input for creating or replacing a book
#[derive(Debug, Clone)]
pub struct BookInput {
    pub title: String,
    pub author_id: i64,
    pub publication_year: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Library {
    pub id: i64,
    pub name: String,
}

/// Librarian, at most one per library
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Librarian {
    pub id: i64,
    pub name: String,
    pub library_id: i64,
}

/// Library with its holdings and librarian
#[derive(Debug, Clone, Serialize)]
pub struct LibraryDetail {
    pub library: Library,
    pub books: Vec<BookWithAuthor>,
    pub librarian: Option<Librarian>,
}
