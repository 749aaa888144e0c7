//! Comment endpoints (all require auth)
//!
//! - POST /posts/{id}/comments/new/ - Comment on a post
//! - POST /comments/{id}/reply/ - Reply to a comment
//! - POST /comments/{id}/edit/ - Edit own comment
//! - GET /comments/{id}/delete/ - Confirm deleting own comment
//! - POST /comments/{id}/delete/ - Delete own comment

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, JsonForm};
use crate::forms::CommentForm;
use crate::models::Comment;

#[derive(Debug, Serialize)]
pub struct DeletedCommentResponse {
    /// Post to return to
    pub post_id: i64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts/{id}/comments/new/", post(create_comment))
        .route("/comments/{id}/reply/", post(reply))
        .route("/comments/{id}/edit/", post(update_comment))
        .route(
            "/comments/{id}/delete/",
            get(confirm_delete_comment).post(delete_comment),
        )
}

async fn create_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(post_id): Path<i64>,
    JsonForm(form): JsonForm<CommentForm>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let comment = state.blog_service.add_comment(&user.0, post_id, form).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn reply(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(parent_id): Path<i64>,
    JsonForm(form): JsonForm<CommentForm>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let comment = state.blog_service.reply(&user.0, parent_id, form).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn update_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    JsonForm(form): JsonForm<CommentForm>,
) -> Result<Json<Comment>, ApiError> {
    let comment = state.blog_service.update_comment(&user.0, id, form).await?;
    Ok(Json(comment))
}

async fn confirm_delete_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Comment>, ApiError> {
    let comment = state.blog_service.comment_for_author(&user.0, id).await?;
    Ok(Json(comment))
}

async fn delete_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<DeletedCommentResponse>, ApiError> {
    let post_id = state.blog_service.delete_comment(&user.0, id).await?;
    Ok(Json(DeletedCommentResponse { post_id }))
}
