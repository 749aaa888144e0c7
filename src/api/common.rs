//! Common API utilities and shared types
//!
//! This module contains shared utilities used across multiple API endpoints.

use axum::http::{header, HeaderMap, HeaderValue};
use serde::Deserialize;

use crate::api::middleware::ApiError;

// ============================================================================
// Pagination Defaults
// ============================================================================

/// Default page number (1-indexed)
pub fn default_page() -> u32 {
    1
}

/// `?page=` on list endpoints
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u32,
}

/// `?q=` on the search endpoint
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

// ============================================================================
// Session Cookie
// ============================================================================

/// `Set-Cookie` header for a session lasting `days`
pub fn session_cookie(session_id: &str, days: i64) -> Result<HeaderMap, ApiError> {
    let cookie = format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        session_id,
        days.max(0) * 24 * 60 * 60
    );
    cookie_headers(&cookie)
}

/// `Set-Cookie` header that expires the session cookie
pub fn clear_session_cookie() -> Result<HeaderMap, ApiError> {
    cookie_headers("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

fn cookie_headers(cookie: &str) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(cookie).map_err(ApiError::internal_error)?,
    );
    Ok(headers)
}
