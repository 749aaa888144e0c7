//! Data models
//!
//! Database entities for accounts, the book catalog and the blog, plus the
//! pagination containers shared by list endpoints.

mod admin;
mod book;
mod comment;
mod post;
mod session;
mod tag;
mod user;

pub use admin::{
    AdminField, AdminFilter, AdminPage, AdminQuery, ColumnKind, DateRange, FilterValue, ModelAdmin,
};
pub use book::{Author, Book, BookInput, BookWithAuthor, Librarian, Library, LibraryDetail};
pub use comment::{build_comment_tree, Comment, CommentNode, CommentRow};
pub use post::{ListParams, PagedResult, Post, PostDetail, PostWithMeta};
pub use session::{ApiToken, Session};
pub use tag::{Tag, TagWithCount};
pub use user::{DefaultGroup, Group, Permission, Profile, User};
