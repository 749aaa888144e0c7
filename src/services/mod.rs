//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories. They
//! validate forms, enforce ownership and uniqueness rules and map
//! repository failures into their own error types.

pub mod admin;
pub mod blog;
pub mod catalog;
pub mod password;
pub mod permission;
pub mod rate_limiter;
pub mod user;

pub use admin::{books_admin, users_admin, AdminError, AdminService};
pub use blog::{BlogError, BlogService};
pub use catalog::{CatalogError, CatalogService, SAMPLE_BOOKS};
pub use password::{hash_password, verify_password};
pub use permission::PermissionService;
pub use rate_limiter::LoginRateLimiter;
pub use user::{UserService, UserServiceError};
