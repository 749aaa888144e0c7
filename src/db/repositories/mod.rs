//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles CRUD operations for a specific entity.

pub mod admin;
pub mod author;
pub mod book;
pub mod comment;
pub mod library;
pub mod permission;
pub mod post;
pub mod profile;
pub mod session;
pub mod tag;
pub mod token;
pub mod user;

pub use admin::{AdminRepository, SqlxAdminRepository};
pub use author::{AuthorRepository, SqlxAuthorRepository};
pub use book::{BookRepository, SqlxBookRepository};
pub use comment::{CommentRepository, SqlxCommentRepository};
pub use library::{LibraryRepository, SqlxLibraryRepository};
pub use permission::{PermissionRepository, SqlxPermissionRepository};
pub use post::{PostRepository, SqlxPostRepository};
pub use profile::{ProfileRepository, SqlxProfileRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use tag::{generate_tag_slug, SqlxTagRepository, TagRepository};
pub use token::{SqlxTokenRepository, TokenRepository};
pub use user::{SqlxUserRepository, UserRepository};

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern
pub(crate) fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
