//! Authentication API endpoints
//!
//! Handles HTTP requests for user authentication:
//! - POST /register/ - User registration, logs the new user in
//! - POST /login/ - User login (rate limited)
//! - POST /logout/ - User logout
//! - POST /api/auth/token/ - Exchange credentials for an API token

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{clear_session_cookie, session_cookie};
use crate::api::middleware::{extract_ip_address, extract_session_token, ApiError, AppState, JsonForm};
use crate::api::responses::AuthResponse;
use crate::forms::{LoginForm, RegistrationForm};
use crate::services::UserServiceError;

/// Request body for the token endpoint
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register/", post(register))
        .route("/login/", post(login))
        .route("/api/auth/token/", post(obtain_token))
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new().route("/logout/", post(logout))
}

/// POST /register/ - User registration
///
/// Creates the user with its profile, then opens a session for it.
async fn register(
    State(state): State<AppState>,
    JsonForm(form): JsonForm<RegistrationForm>,
) -> Result<impl IntoResponse, ApiError> {
    let login_form = LoginForm {
        username: form.username.trim().to_string(),
        password: form.password1.clone(),
    };

    state.user_service.register(form).await?;
    let (user, session) = state.user_service.login(login_form).await?;

    let headers = session_cookie(&session.id, state.auth_config.session_days)?;
    Ok((
        StatusCode::CREATED,
        headers,
        Json(AuthResponse {
            user: user.into(),
            token: session.id,
        }),
    ))
}

/// POST /login/ - User login
///
/// Limited per client IP and per username; failed attempts count towards
/// the username limit until a successful login clears them.
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonForm(form): JsonForm<LoginForm>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(ip) = extract_ip_address(&headers) {
        if state.rate_limiter.is_ip_limited(ip).await {
            tracing::warn!("Login rate limit hit for {}", ip);
            return Err(ApiError::with_details(
                "RATE_LIMIT",
                "Too many login requests. Please try again later.",
                serde_json::json!({ "retry_after": 60 }),
            ));
        }
        state.rate_limiter.record_ip_request(ip).await;
    }

    if state.rate_limiter.is_username_limited(&form.username).await {
        tracing::warn!("Too many failed logins for {}", form.username);
        return Err(ApiError::with_details(
            "RATE_LIMIT",
            "Too many failed login attempts. Please try again later.",
            serde_json::json!({ "retry_after": state.rate_limiter.username_window_seconds() }),
        ));
    }

    let username = form.username.clone();
    let (user, session) = match state.user_service.login(form).await {
        Ok(result) => result,
        Err(e) => {
            if matches!(
                e,
                UserServiceError::AuthenticationError(_) | UserServiceError::InactiveUser
            ) {
                tracing::warn!("Failed login for {}", username);
                state.rate_limiter.record_failed_attempt(&username).await;
            }
            return Err(e.into());
        }
    };

    state.rate_limiter.clear_username_attempts(&username).await;

    let headers = session_cookie(&session.id, state.auth_config.session_days)?;
    Ok((
        headers,
        Json(AuthResponse {
            user: user.into(),
            token: session.id,
        }),
    ))
}

/// POST /logout/ - User logout
async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = extract_session_token(&headers) {
        state.user_service.logout(&token).await?;
    }

    Ok((StatusCode::NO_CONTENT, clear_session_cookie()?))
}

/// POST /api/auth/token/ - Get or create the caller's API token
async fn obtain_token(
    State(state): State<AppState>,
    JsonForm(body): JsonForm<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let mut missing = serde_json::Map::new();
    for (field, value) in [("username", &body.username), ("password", &body.password)] {
        if value.is_empty() {
            missing.insert(field.to_string(), serde_json::json!(["This field is required."]));
        }
    }
    if !missing.is_empty() {
        return Err(ApiError::with_details(
            "VALIDATION_ERROR",
            "Please correct the errors below.",
            serde_json::Value::Object(missing),
        ));
    }

    let token = state
        .user_service
        .get_or_create_token(&body.username, &body.password)
        .await
        .map_err(|e| match e {
            UserServiceError::AuthenticationError(_) => ApiError::with_details(
                "VALIDATION_ERROR",
                "Unable to log in with provided credentials.",
                serde_json::json!({
                    "non_field_errors": ["Unable to log in with provided credentials."]
                }),
            ),
            other => other.into(),
        })?;

    Ok(Json(TokenResponse { token: token.key }))
}
