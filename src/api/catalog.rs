//! Public catalog views over authors, books and libraries

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::BookListResponse;
use crate::models::{BookWithAuthor, LibraryDetail};

#[derive(Debug, Serialize)]
pub struct CatalogBooksResponse {
    pub books: Vec<BookWithAuthor>,
    /// "title by author, ..."
    pub text: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/catalog/books/", get(catalog_books))
        .route("/libraries/{id}/", get(library_detail))
        .route("/authors/{name}/books/", get(books_by_author))
}

async fn catalog_books(
    State(state): State<AppState>,
) -> Result<Json<CatalogBooksResponse>, ApiError> {
    let books = state.catalog_service.list_all_books().await?;
    let text = state.catalog_service.book_list_text().await?;
    Ok(Json(CatalogBooksResponse { books, text }))
}

async fn library_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<LibraryDetail>, ApiError> {
    let detail = state.catalog_service.library_detail(id).await?;
    Ok(Json(detail))
}

async fn books_by_author(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<BookListResponse>, ApiError> {
    let books = state
        .catalog_service
        .get_books_by_author(&name)
        .await?
        .ok_or_else(|| ApiError::not_found("Author not found"))?;
    Ok(Json(BookListResponse { books }))
}
