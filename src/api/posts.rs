//! Blog post endpoints
//!
//! Public:
//! - GET / and /posts/?page= - Paginated post list
//! - GET /posts/{id}/ - Post with tags and comment tree
//! - GET /tags/ - Tags with post counts
//! - GET /tags/{tag_name}/ - Posts carrying a tag
//! - GET /search/?q= - Search titles, content and tags
//!
//! Protected:
//! - POST /posts/new/
//! - POST /posts/{id}/edit/
//! - GET/POST /posts/{id}/delete/

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::common::{PageQuery, SearchQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, JsonForm, QueryParams};
use crate::api::responses::PaginatedPostsResponse;
use crate::forms::PostForm;
use crate::models::{PostDetail, PostWithMeta, TagWithCount};

#[derive(Debug, Serialize)]
pub struct TaggedPostsResponse {
    pub tag: String,
    pub posts: Vec<PostWithMeta>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub posts: Vec<PostWithMeta>,
}

#[derive(Debug, Serialize)]
pub struct TagListResponse {
    pub tags: Vec<TagWithCount>,
}

/// Build public blog routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_posts))
        .route("/posts/", get(list_posts))
        .route("/posts/{id}/", get(get_post))
        .route("/tags/", get(list_tags))
        .route("/tags/{tag_name}/", get(posts_by_tag))
        .route("/search/", get(search))
}

/// Build protected blog routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/posts/new/", post(create_post))
        .route("/posts/{id}/edit/", post(update_post))
        .route("/posts/{id}/delete/", get(confirm_delete).post(delete_post))
}

/// GET /posts/?page= - Pages past the end are 404, except an empty first page
async fn list_posts(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<PageQuery>,
) -> Result<Json<PaginatedPostsResponse>, ApiError> {
    let result = state.blog_service.list_posts(query.page).await?;

    if result.page > 1 && result.page > result.total_pages() {
        return Err(ApiError::not_found("Invalid page."));
    }
    Ok(Json(result.into()))
}

async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PostDetail>, ApiError> {
    let detail = state.blog_service.get_post_detail(id).await?;
    Ok(Json(detail))
}

async fn create_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    JsonForm(form): JsonForm<PostForm>,
) -> Result<(StatusCode, Json<PostWithMeta>), ApiError> {
    let post = state.blog_service.create_post(&user.0, form).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn update_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    JsonForm(form): JsonForm<PostForm>,
) -> Result<Json<PostWithMeta>, ApiError> {
    let post = state.blog_service.update_post(&user.0, id, form).await?;
    Ok(Json(post))
}

/// GET /posts/{id}/delete/ - The post about to be deleted
async fn confirm_delete(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<PostWithMeta>, ApiError> {
    let post = state.blog_service.post_for_author(&user.0, id).await?;
    Ok(Json(post))
}

async fn delete_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.blog_service.delete_post(&user.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_tags(State(state): State<AppState>) -> Result<Json<TagListResponse>, ApiError> {
    let tags = state.blog_service.list_tags().await?;
    Ok(Json(TagListResponse { tags }))
}

async fn posts_by_tag(
    State(state): State<AppState>,
    Path(tag_name): Path<String>,
) -> Result<Json<TaggedPostsResponse>, ApiError> {
    let posts = state.blog_service.posts_by_tag(&tag_name).await?;
    Ok(Json(TaggedPostsResponse {
        tag: tag_name,
        posts,
    }))
}

async fn search(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    let posts = state.blog_service.search(&query.q).await?;
    Ok(Json(SearchResponse {
        query: query.q,
        posts,
    }))
}
