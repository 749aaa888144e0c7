//! API middleware
//!
//! Contains middleware for:
//! - Authentication (session cookie, Bearer session token, API token)
//! - Authorization (staff check, permission strings)
//! - Request statistics
//!
//! Also home to `ApiError`, the JSON error body every handler returns.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, Request, State,
    },
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use validator::ValidationErrors;

use crate::config::{AuthConfig, Config, UploadConfig};
use crate::db::repositories::{
    SqlxAdminRepository, SqlxAuthorRepository, SqlxBookRepository, SqlxCommentRepository,
    SqlxLibraryRepository, SqlxPermissionRepository, SqlxPostRepository, SqlxProfileRepository,
    SqlxSessionRepository, SqlxTagRepository, SqlxTokenRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::forms::{field_error, validation_details};
use crate::models::{Permission, User};
use crate::services::{
    AdminError, AdminService, BlogError, BlogService, CatalogError, CatalogService,
    LoginRateLimiter, PermissionService, UserService, UserServiceError,
};

// ============================================================================
// Request Statistics
// ============================================================================

/// Lightweight request statistics using atomic operations (no locks)
pub struct RequestStats {
    /// Total number of requests processed
    total_requests: AtomicU64,
    /// Total response time in microseconds (for calculating average)
    total_response_time_us: AtomicU64,
    /// Application start time
    start_time: Instant,
}

impl RequestStats {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a request with its response time
    pub fn record(&self, duration_us: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us.fetch_add(duration_us, Ordering::Relaxed);
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Average response time in microseconds
    pub fn avg_response_time_us(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        let total_time = self.total_response_time_us.load(Ordering::Relaxed);
        total_time as f64 / total as f64
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Application State
// ============================================================================

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub user_service: Arc<UserService>,
    pub permission_service: Arc<PermissionService>,
    pub catalog_service: Arc<CatalogService>,
    pub blog_service: Arc<BlogService>,
    pub admin_service: Arc<AdminService>,
    pub rate_limiter: Arc<LoginRateLimiter>,
    pub auth_config: Arc<AuthConfig>,
    pub upload_config: Arc<UploadConfig>,
    pub request_stats: Arc<RequestStats>,
}

impl AppState {
    /// Wire repositories and services over one pool
    pub fn new(pool: DynDatabasePool, config: &Config) -> Self {
        let user_repo = SqlxUserRepository::boxed(pool.clone());

        let user_service = UserService::new(
            user_repo.clone(),
            SqlxSessionRepository::boxed(pool.clone()),
            SqlxTokenRepository::boxed(pool.clone()),
            SqlxProfileRepository::boxed(pool.clone()),
        )
        .with_session_expiration(config.auth.session_days);

        let catalog_service = CatalogService::new(
            SqlxBookRepository::boxed(pool.clone()),
            SqlxAuthorRepository::boxed(pool.clone()),
            SqlxLibraryRepository::boxed(pool.clone()),
        );

        let blog_service = BlogService::new(
            SqlxPostRepository::boxed(pool.clone()),
            SqlxCommentRepository::boxed(pool.clone()),
            SqlxTagRepository::boxed(pool.clone()),
        )
        .with_posts_per_page(config.blog.posts_per_page);

        Self {
            user_service: Arc::new(user_service),
            permission_service: Arc::new(PermissionService::new(
                SqlxPermissionRepository::boxed(pool.clone()),
            )),
            catalog_service: Arc::new(catalog_service),
            blog_service: Arc::new(blog_service),
            admin_service: Arc::new(AdminService::new(
                SqlxAdminRepository::boxed(pool.clone()),
                user_repo,
            )),
            rate_limiter: Arc::new(LoginRateLimiter::new(&config.rate_limit)),
            auth_config: Arc::new(config.auth.clone()),
            upload_config: Arc::new(config.upload.clone()),
            request_stats: Arc::new(RequestStats::new()),
            pool,
        }
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication credentials were not provided."))
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    /// Logs the cause; the client only sees a generic message
    pub fn internal_error(cause: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {:#}", cause);
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "RATE_LIMIT" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::with_details(
            "VALIDATION_ERROR",
            "Please correct the errors below.",
            validation_details(&errors),
        )
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation_error(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation_error(rejection.body_text())
    }
}

impl From<UserServiceError> for ApiError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::AuthenticationError(msg) => ApiError::unauthorized(msg),
            UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            UserServiceError::InvalidForm(errors) => errors.into(),
            UserServiceError::UserExists { field, message } => {
                ApiError::with_details("VALIDATION_ERROR", message.clone(), field_error(field, &message))
            }
            UserServiceError::InactiveUser => ApiError::forbidden("This account is inactive."),
            UserServiceError::NotFound => ApiError::not_found("User not found"),
            UserServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::NotFound(what) => ApiError::not_found(format!("{} not found", what)),
            CatalogError::Validation(msg) => ApiError::validation_error(msg),
            CatalogError::InvalidForm(errors) => errors.into(),
            CatalogError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<BlogError> for ApiError {
    fn from(e: BlogError) -> Self {
        match e {
            BlogError::NotFound(what) => ApiError::not_found(format!("{} not found", what)),
            BlogError::Forbidden(msg) => ApiError::forbidden(msg),
            BlogError::Validation(errors) => errors.into(),
            BlogError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<AdminError> for ApiError {
    fn from(e: AdminError) -> Self {
        match e {
            AdminError::UnknownModel(name) => {
                ApiError::not_found(format!("No admin registered for {}", name))
            }
            AdminError::UserNotFound => ApiError::not_found("User not found"),
            AdminError::InvalidFilter(msg) => ApiError::validation_error(msg),
            AdminError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

/// JSON body extractor whose rejections are `ApiError`s (400) instead of
/// axum's plain-text 422
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonForm<T>(pub T);

/// Query string extractor with the same `ApiError` rejections as `JsonForm`
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct QueryParams<T>(pub T);

// ============================================================================
// Authentication
// ============================================================================

/// Session id from `Authorization: Bearer` or the `session` cookie
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                if let Some(token) = cookie.trim().strip_prefix("session=") {
                    if !token.is_empty() {
                        return Some(token.to_string());
                    }
                }
            }
        }
    }

    None
}

/// API key from `Authorization: <keyword> <key>`
pub fn extract_api_token(headers: &HeaderMap, keyword: &str) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, key) = value.split_once(' ')?;
    if scheme == keyword && !key.trim().is_empty() {
        Some(key.trim().to_string())
    } else {
        None
    }
}

/// Client address from proxy headers
pub fn extract_ip_address(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            // Take the first IP in the list
            if let Some(ip) = forwarded_str.split(',').next() {
                if let Ok(ip) = ip.trim().parse() {
                    return Some(ip);
                }
            }
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

/// Session authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Authentication credentials were not provided."))?;

    let user = state
        .user_service
        .validate_session(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Token authentication for the REST endpoints. Sessions are accepted too.
pub async fn require_token_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let api_key = extract_api_token(request.headers(), &state.auth_config.token_header_keyword);
    let session = extract_session_token(request.headers());

    let user = if let Some(key) = api_key {
        state
            .user_service
            .user_for_token(&key)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Invalid token."))?
    } else if let Some(session) = session {
        state
            .user_service
            .validate_session(&session)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?
    } else {
        return Err(ApiError::unauthorized(
            "Authentication credentials were not provided.",
        ));
    };

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Staff authorization middleware; runs after `require_auth`
pub async fn require_staff(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !(user.0.is_active && user.0.is_staff) {
        return Err(ApiError::forbidden("Staff privileges required"));
    }

    Ok(next.run(request).await)
}

/// Fail with 403 unless the user holds `perm`
pub async fn check_permission(
    state: &AppState,
    user: &User,
    perm: Permission,
) -> Result<(), ApiError> {
    let allowed = state
        .permission_service
        .has_perm(user, perm)
        .await
        .map_err(ApiError::internal_error)?;

    if allowed {
        Ok(())
    } else {
        tracing::debug!("{} denied {}", user.username, perm);
        Err(ApiError::forbidden(
            "You do not have permission to perform this action.",
        ))
    }
}

/// Request statistics middleware
pub async fn request_stats_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;

    state.request_stats.record(start.elapsed().as_micros() as u64);
    response
}

// ============================================================================
// Tests
// ============================================================================
