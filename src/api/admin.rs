//! Admin API endpoints
//!
//! All routes require a staff account.
//! - GET /admin/{model}/ - Change list with `q`, field filters and `page`
//! - PATCH /admin/users/{id}/ - Toggle `is_active`
//! - POST /admin/libraries/ - Create a library
//! - POST /admin/libraries/{id}/books/ - Add a book to a library
//! - POST /admin/libraries/{id}/librarian/ - Assign the library's librarian

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use std::collections::HashMap;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, JsonForm};
use crate::api::responses::UserResponse;
use crate::forms::{LibrarianForm, LibraryForm};
use crate::models::{AdminPage, AdminQuery, Librarian, Library, LibraryDetail};

#[derive(Debug, Deserialize)]
pub struct UserActiveRequest {
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct AddBookRequest {
    pub book_id: i64,
}

/// Build admin router (requires auth and staff middleware)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/libraries/", post(create_library))
        .route("/admin/libraries/{id}/books/", post(add_library_book))
        .route("/admin/libraries/{id}/librarian/", post(create_librarian))
        .route("/admin/users/{id}/", patch(set_user_active))
        .route("/admin/{model}/", get(change_list))
}

async fn change_list(
    State(state): State<AppState>,
    Path(model): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<AdminPage>, ApiError> {
    let query = AdminQuery::from_params(params);
    let page = state.admin_service.list(&model, &query).await?;
    Ok(Json(page))
}

/// PATCH /admin/users/{id}/ - The list-editable `is_active` column
async fn set_user_active(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    Path(id): Path<i64>,
    JsonForm(body): JsonForm<UserActiveRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.admin_service.set_user_active(id, body.is_active).await?;
    if !user.is_active {
        state.user_service.revoke_credentials(user.id).await?;
    }
    tracing::info!(
        "{} set is_active={} on {}",
        admin.0.username,
        body.is_active,
        user.username
    );
    Ok(Json(user.into()))
}

async fn create_library(
    State(state): State<AppState>,
    JsonForm(form): JsonForm<LibraryForm>,
) -> Result<(StatusCode, Json<Library>), ApiError> {
    let library = state.catalog_service.create_library(form).await?;
    Ok((StatusCode::CREATED, Json(library)))
}

async fn add_library_book(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    JsonForm(body): JsonForm<AddBookRequest>,
) -> Result<Json<LibraryDetail>, ApiError> {
    let detail = state
        .catalog_service
        .add_book_to_library(id, body.book_id)
        .await?;
    Ok(Json(detail))
}

async fn create_librarian(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    JsonForm(form): JsonForm<LibrarianForm>,
) -> Result<(StatusCode, Json<Librarian>), ApiError> {
    let librarian = state.catalog_service.create_librarian(id, form).await?;
    Ok((StatusCode::CREATED, Json(librarian)))
}
