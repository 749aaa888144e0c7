//! Bookshelf endpoints, gated by catalog permissions
//!
//! - GET /books/ - List books (can_view)
//! - POST /books/create/ - Create a book (can_create)
//! - GET/POST /books/{id}/edit/ - Current values / save changes (can_edit)
//! - GET/POST /books/{id}/delete/ - Confirmation / delete (can_delete)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::api::middleware::{check_permission, ApiError, AppState, AuthenticatedUser, JsonForm};
use crate::api::responses::{BookListResponse, BookMessageResponse};
use crate::forms::BookForm;
use crate::models::{BookWithAuthor, Permission};

/// Build the bookshelf router (requires auth middleware)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/books/", get(list_books))
        .route("/books/create/", post(create_book))
        .route("/books/{id}/edit/", get(edit_book_form).post(edit_book))
        .route("/books/{id}/delete/", get(confirm_delete).post(delete_book))
}

async fn list_books(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<BookListResponse>, ApiError> {
    check_permission(&state, &user.0, Permission::View).await?;

    let books = state.catalog_service.list_books().await?;
    Ok(Json(BookListResponse { books }))
}

async fn create_book(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    JsonForm(form): JsonForm<BookForm>,
) -> Result<(StatusCode, Json<BookMessageResponse>), ApiError> {
    check_permission(&state, &user.0, Permission::Create).await?;

    let book = state.catalog_service.create_book(form, Some(&user.0)).await?;
    Ok((
        StatusCode::CREATED,
        Json(BookMessageResponse {
            message: "Book created successfully!",
            book: Some(book),
        }),
    ))
}

/// GET /books/{id}/edit/ - Current values to pre-fill the form
async fn edit_book_form(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<BookWithAuthor>, ApiError> {
    check_permission(&state, &user.0, Permission::Edit).await?;

    let book = state.catalog_service.get_book(id).await?;
    Ok(Json(book))
}

async fn edit_book(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    JsonForm(form): JsonForm<BookForm>,
) -> Result<Json<BookMessageResponse>, ApiError> {
    check_permission(&state, &user.0, Permission::Edit).await?;

    let book = state.catalog_service.update_book(id, form).await?;
    Ok(Json(BookMessageResponse {
        message: "Book updated successfully!",
        book: Some(book),
    }))
}

/// GET /books/{id}/delete/ - The book about to be deleted
async fn confirm_delete(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<BookWithAuthor>, ApiError> {
    check_permission(&state, &user.0, Permission::Delete).await?;

    let book = state.catalog_service.get_book(id).await?;
    Ok(Json(book))
}

async fn delete_book(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<BookMessageResponse>, ApiError> {
    check_permission(&state, &user.0, Permission::Delete).await?;

    state.catalog_service.delete_book(id).await?;
    tracing::info!("Book {} deleted by {}", id, user.0.username);
    Ok(Json(BookMessageResponse {
        message: "Book deleted successfully!",
        book: None,
    }))
}
