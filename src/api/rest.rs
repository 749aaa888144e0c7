//! Book REST API
//!
//! - GET /api/books/ - Public read-only list
//! - GET, POST /api/books_all/ - List / create (token auth)
//! - GET, PUT, PATCH, DELETE /api/books_all/{id}/ - Retrieve / replace / merge / destroy (token auth)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, JsonForm};
use crate::forms::BookForm;
use crate::models::BookWithAuthor;

/// PATCH body; absent fields keep their current value
#[derive(Debug, Default, Deserialize)]
pub struct BookPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub publication_year: Option<i32>,
}

impl BookPatch {
    /// Merge into the current record, giving a full form to validate
    pub fn merge(self, current: &BookWithAuthor) -> BookForm {
        BookForm {
            title: self.title.unwrap_or_else(|| current.title.clone()),
            author: self.author.unwrap_or_else(|| current.author.clone()),
            publication_year: self.publication_year.unwrap_or(current.publication_year),
        }
    }
}

/// Build public REST routes
pub fn public_router() -> Router<AppState> {
    Router::new().route("/api/books/", get(list_books))
}

/// Build token-authenticated REST routes (requires token auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/api/books_all/", get(list_books).post(create_book))
        .route(
            "/api/books_all/{id}/",
            get(retrieve_book)
                .put(replace_book)
                .patch(patch_book)
                .delete(destroy_book),
        )
}

async fn list_books(State(state): State<AppState>) -> Result<Json<Vec<BookWithAuthor>>, ApiError> {
    let books = state.catalog_service.list_all_books().await?;
    Ok(Json(books))
}

async fn create_book(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    JsonForm(form): JsonForm<BookForm>,
) -> Result<(StatusCode, Json<BookWithAuthor>), ApiError> {
    let book = state.catalog_service.create_book(form, Some(&user.0)).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

async fn retrieve_book(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<BookWithAuthor>, ApiError> {
    let book = state.catalog_service.get_book(id).await?;
    Ok(Json(book))
}

async fn replace_book(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    JsonForm(form): JsonForm<BookForm>,
) -> Result<Json<BookWithAuthor>, ApiError> {
    let book = state.catalog_service.update_book(id, form).await?;
    Ok(Json(book))
}

async fn patch_book(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    JsonForm(patch): JsonForm<BookPatch>,
) -> Result<Json<BookWithAuthor>, ApiError> {
    let current = state.catalog_service.get_book(id).await?;
    let book = state
        .catalog_service
        .update_book(id, patch.merge(&current))
        .await?;
    Ok(Json(book))
}

async fn destroy_book(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.catalog_service.delete_book(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
