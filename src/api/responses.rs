//! Shared API response types
//!
//! Response structures used by more than one group of endpoints.

use serde::Serialize;

use crate::models::{BookWithAuthor, PagedResult, PostWithMeta, Profile, User};

// ============================================================================
// Account Response Types
// ============================================================================

/// Public view of a user; never includes the password hash
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub date_of_birth: Option<String>,
    pub profile_photo: Option<String>,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
    pub date_joined: String,
    pub last_login: Option<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            display_name: user.get_full_display_name(),
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            date_of_birth: user.date_of_birth.map(|d| d.to_string()),
            profile_photo: user.profile_photo,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            is_active: user.is_active,
            date_joined: user.date_joined.to_rfc3339(),
            last_login: user.last_login.map(|dt| dt.to_rfc3339()),
        }
    }
}

/// Response for successful login or registration
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    /// Session id, also set as the `session` cookie
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: UserResponse,
    pub profile: Profile,
}

// ============================================================================
// Catalog Response Types
// ============================================================================

/// A flash-style message with the affected book
#[derive(Debug, Serialize)]
pub struct BookMessageResponse {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book: Option<BookWithAuthor>,
}

#[derive(Debug, Serialize)]
pub struct BookListResponse {
    pub books: Vec<BookWithAuthor>,
}

// ============================================================================
// Pagination Response Types
// ============================================================================

/// One page of posts
#[derive(Debug, Serialize)]
pub struct PaginatedPostsResponse {
    pub posts: Vec<PostWithMeta>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

impl From<PagedResult<PostWithMeta>> for PaginatedPostsResponse {
    fn from(result: PagedResult<PostWithMeta>) -> Self {
        Self {
            total_pages: result.total_pages(),
            has_next: result.has_next(),
            has_previous: result.has_prev(),
            total: result.total,
            page: result.page,
            per_page: result.per_page,
            posts: result.items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ListParams;

    #[test]
    fn test_user_response_omits_password_hash() {
        let user = User::new("reader".into(), "r@example.com".into(), "secret-hash".into());
        let json = serde_json::to_value(UserResponse::from(user)).unwrap();

        assert_eq!(json["username"], "reader");
        assert_eq!(json["display_name"], "reader");
        assert!(json.get("password_hash").is_none());
        assert!(!json.to_string().contains("secret-hash"));
    }

    #[test]
    fn test_paginated_posts_flags() {
        let result: PagedResult<PostWithMeta> = PagedResult::new(vec![], 11, &ListParams::new(2, 5));
        let response = PaginatedPostsResponse::from(result);
        assert_eq!(response.total_pages, 3);
        assert!(response.has_next);
        assert!(response.has_previous);
    }
}
