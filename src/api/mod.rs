//! API layer - HTTP handlers and routing
//!
//! This module contains all HTTP endpoints. It includes:
//! - Auth and profile endpoints
//! - Permission-gated bookshelf endpoints
//! - Public catalog views
//! - Blog posts, comments, tags and search
//! - Book REST API with token auth
//! - Admin change lists
//! - Health check
//! - Uploaded profile pictures under /uploads

pub mod admin;
pub mod auth;
pub mod books;
pub mod catalog;
pub mod comments;
pub mod common;
pub mod health;
pub mod middleware;
pub mod posts;
pub mod profile;
pub mod responses;
pub mod rest;

#[cfg(test)]
mod tests;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};

pub use middleware::{ApiError, AppState, AuthenticatedUser, RequestStats};

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; script-src 'self'; \
style-src 'self' 'unsafe-inline'; img-src 'self' data:; font-src 'self';";

/// Build the application routes
pub fn build_app_router(state: AppState) -> Router<AppState> {
    // Admin routes (need staff)
    let admin_routes = admin::router()
        .route_layer(axum_middleware::from_fn(middleware::require_staff))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need a session)
    let protected_routes = Router::new()
        .merge(auth::protected_router())
        .merge(profile::router(state.upload_config.max_file_size))
        .merge(books::router())
        .merge(posts::protected_router())
        .merge(comments::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // REST routes (API token or session)
    let token_routes = rest::protected_router().route_layer(axum_middleware::from_fn_with_state(
        state.clone(),
        middleware::require_token_auth,
    ));

    // Public routes
    Router::new()
        .nest_service("/uploads", ServeDir::new(&state.upload_config.path))
        .merge(auth::public_router())
        .merge(posts::public_router())
        .merge(catalog::router())
        .merge(rest::public_router())
        .merge(health::router())
        .merge(admin_routes)
        .merge(protected_routes)
        .merge(token_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> anyhow::Result<Router> {
    // CORS configuration, with cookie credentials
    let cors = CorsLayer::new()
        .allow_origin(
            cors_origin
                .parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?,
        )
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    Ok(build_app_router(state.clone())
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(CONTENT_SECURITY_POLICY),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        // Request stats middleware (outermost layer, runs for all requests)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::request_stats_middleware,
        ))
        .with_state(state))
}
