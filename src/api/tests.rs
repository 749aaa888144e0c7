//! HTTP tests over the full router

use axum::body::Bytes;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::api::{build_router, AppState};
use crate::config::Config;
use crate::db::{create_test_pool, migrations::run_migrations};
use crate::models::DefaultGroup;

struct TestApp {
    server: TestServer,
    state: AppState,
    _uploads: TempDir,
}

async fn setup() -> TestApp {
    let pool = create_test_pool().await.unwrap();
    run_migrations(&pool).await.unwrap();

    let uploads = TempDir::new().unwrap();
    let mut config = Config::default();
    config.upload.path = uploads.path().to_path_buf();

    let state = AppState::new(pool, &config);
    let app = build_router(state.clone(), &config.server.cors_origin).unwrap();

    TestApp {
        server: TestServer::new(app).unwrap(),
        state,
        _uploads: uploads,
    }
}

fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    )
}

fn api_token(key: &str) -> (HeaderName, HeaderValue) {
    (
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Token {}", key)).unwrap(),
    )
}

/// Register a user and return its session token
async fn register(app: &TestApp, username: &str) -> String {
    let response = app
        .server
        .post("/register/")
        .json(&json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password1": "correct-horse-42",
            "password2": "correct-horse-42",
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["token"].as_str().unwrap().to_string()
}

async fn user_id(app: &TestApp, username: &str) -> i64 {
    app.state
        .user_service
        .get_by_username(username)
        .await
        .unwrap()
        .unwrap()
        .id
}

/// Login as a fresh superuser and return the session token
async fn login_superuser(app: &TestApp) -> String {
    app.state
        .user_service
        .create_superuser("boss", "boss@example.com", "correct-horse-42")
        .await
        .unwrap();

    let response = app
        .server
        .post("/login/")
        .json(&json!({ "username": "boss", "password": "correct-horse-42" }))
        .await;
    response.assert_status_ok();
    response.json::<Value>()["token"].as_str().unwrap().to_string()
}

// ============================================================================
// Auth and profile
// ============================================================================

#[tokio::test]
async fn test_register_sets_cookie_and_creates_profile() {
    let app = setup().await;

    let response = app
        .server
        .post("/register/")
        .json(&json!({
            "username": "reader",
            "email": "reader@Example.COM",
            "password1": "correct-horse-42",
            "password2": "correct-horse-42",
        }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let cookie = response.header(header::SET_COOKIE);
    assert!(cookie.to_str().unwrap().starts_with("session="));

    let body = response.json::<Value>();
    assert_eq!(body["user"]["email"], "reader@example.com");
    assert!(body["user"].get("password_hash").is_none());

    let (name, value) = bearer(body["token"].as_str().unwrap());
    let profile = app.server.get("/profile/").add_header(name, value).await;
    profile.assert_status_ok();
    assert_eq!(profile.json::<Value>()["user"]["username"], "reader");
}

#[tokio::test]
async fn test_register_rejects_mismatched_passwords() {
    let app = setup().await;

    let response = app
        .server
        .post("/register/")
        .json(&json!({
            "username": "reader",
            "email": "reader@example.com",
            "password1": "correct-horse-42",
            "password2": "correct-horse-43",
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.json::<Value>()["error"]["details"]["password2"].is_array());
}

#[tokio::test]
async fn test_duplicate_username_is_rejected() {
    let app = setup().await;
    register(&app, "reader").await;

    let response = app
        .server
        .post("/register/")
        .json(&json!({
            "username": "reader",
            "email": "other@example.com",
            "password1": "correct-horse-42",
            "password2": "correct-horse-42",
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["error"]["details"]["username"][0],
        "A user with that username already exists."
    );
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = setup().await;

    let response = app
        .server
        .post("/login/")
        .bytes(Bytes::from_static(b"{not json"))
        .content_type("application/json")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_login_failures_are_rate_limited_per_username() {
    let app = setup().await;
    register(&app, "reader").await;

    for _ in 0..5 {
        app.server
            .post("/login/")
            .json(&json!({ "username": "reader", "password": "wrong-password" }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    // Even the right password is refused while limited
    let response = app
        .server
        .post("/login/")
        .json(&json!({ "username": "reader", "password": "correct-horse-42" }))
        .await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.json::<Value>()["error"]["details"]["retry_after"], 900);
}

#[tokio::test]
async fn test_logout_invalidates_session() {
    let app = setup().await;
    let token = register(&app, "reader").await;

    let (name, value) = bearer(&token);
    app.server
        .post("/logout/")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let (name, value) = bearer(&token);
    app.server
        .get("/profile/")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_profile_update_validates_before_saving() {
    let app = setup().await;
    let token = register(&app, "reader").await;

    let (name, value) = bearer(&token);
    app.server
        .post("/profile/")
        .add_header(name, value)
        .json(&json!({ "email": "not-an-email", "bio": "Reads a lot" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let (name, value) = bearer(&token);
    let profile = app.server.get("/profile/").add_header(name, value).await;
    assert_eq!(profile.json::<Value>()["profile"]["bio"], "");

    let (name, value) = bearer(&token);
    let response = app
        .server
        .post("/profile/")
        .add_header(name, value)
        .json(&json!({ "email": "new@example.com", "bio": "Reads a lot" }))
        .await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["user"]["email"], "new@example.com");
    assert_eq!(body["profile"]["bio"], "Reads a lot");
}

#[tokio::test]
async fn test_profile_photo_upload() {
    let app = setup().await;
    let token = register(&app, "reader").await;

    let form = MultipartForm::new().add_part(
        "profile_pic",
        Part::bytes(vec![0x89, b'P', b'N', b'G'])
            .file_name("me.png")
            .mime_type("image/png"),
    );
    let (name, value) = bearer(&token);
    let response = app
        .server
        .post("/profile/photo/")
        .add_header(name, value)
        .multipart(form)
        .await;
    response.assert_status_ok();

    let pic = response.json::<Value>()["profile"]["profile_pic"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(pic.starts_with("/uploads/"));
    assert!(pic.ends_with(".png"));

    let served = app.server.get(&pic).await;
    served.assert_status_ok();
    assert_eq!(served.as_bytes().as_ref(), &[0x89, b'P', b'N', b'G']);
}

#[tokio::test]
async fn test_profile_photo_rejects_other_types() {
    let app = setup().await;
    let token = register(&app, "reader").await;

    let form = MultipartForm::new().add_part(
        "profile_pic",
        Part::bytes(b"GIF89a".to_vec())
            .file_name("me.gif")
            .mime_type("image/gif"),
    );
    let (name, value) = bearer(&token);
    app.server
        .post("/profile/photo/")
        .add_header(name, value)
        .multipart(form)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

// ============================================================================
// Bookshelf
// ============================================================================

#[tokio::test]
async fn test_bookshelf_requires_permissions() {
    let app = setup().await;
    let token = register(&app, "reader").await;

    let (name, value) = bearer(&token);
    app.server
        .get("/books/")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    app.server.get("/books/").await.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_editor_can_create_and_edit_but_not_delete() {
    let app = setup().await;
    let token = register(&app, "editor").await;
    let id = user_id(&app, "editor").await;
    app.state
        .permission_service
        .add_user_to_group(id, DefaultGroup::Editors)
        .await
        .unwrap();

    let (name, value) = bearer(&token);
    let response = app
        .server
        .post("/books/create/")
        .add_header(name, value)
        .json(&json!({ "title": "Dune", "author": "Frank Herbert", "publication_year": 1965 }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body = response.json::<Value>();
    assert_eq!(body["message"], "Book created successfully!");
    assert_eq!(body["book"]["owner"], "editor");
    let book_id = body["book"]["id"].as_i64().unwrap();

    let (name, value) = bearer(&token);
    let response = app
        .server
        .post(&format!("/books/{}/edit/", book_id))
        .add_header(name, value)
        .json(&json!({ "title": "Dune Messiah", "author": "Frank Herbert", "publication_year": 1969 }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["message"], "Book updated successfully!");

    let (name, value) = bearer(&token);
    app.server
        .post(&format!("/books/{}/delete/", book_id))
        .add_header(name, value)
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_book_form_year_bounds() {
    let app = setup().await;
    let token = register(&app, "editor").await;
    let id = user_id(&app, "editor").await;
    app.state
        .permission_service
        .add_user_to_group(id, DefaultGroup::Admins)
        .await
        .unwrap();

    let (name, value) = bearer(&token);
    let response = app
        .server
        .post("/books/create/")
        .add_header(name, value)
        .json(&json!({ "title": "Future", "author": "Someone", "publication_year": 2101 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.json::<Value>()["error"]["details"]["publication_year"].is_array());
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
async fn test_catalog_text_and_unknown_author() {
    let app = setup().await;
    app.state.catalog_service.seed_sample_books().await.unwrap();

    let response = app.server.get("/catalog/books/").await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["books"].as_array().unwrap().len(), 20);
    assert!(body["text"].as_str().unwrap().contains(" by "));

    app.server
        .get("/authors/Nobody%20Known/books/")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

// ============================================================================
// Blog
// ============================================================================

async fn create_post(app: &TestApp, token: &str, title: &str, tags: &[&str]) -> i64 {
    let (name, value) = bearer(token);
    let response = app
        .server
        .post("/posts/new/")
        .add_header(name, value)
        .json(&json!({ "title": title, "content": "Some words", "tags": tags }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_post_list_pagination() {
    let app = setup().await;
    let token = register(&app, "writer").await;
    for i in 0..6 {
        create_post(&app, &token, &format!("Post {}", i), &[]).await;
    }

    let page1 = app.server.get("/").await;
    page1.assert_status_ok();
    let body = page1.json::<Value>();
    assert_eq!(body["posts"].as_array().unwrap().len(), 5);
    assert_eq!(body["posts"][0]["title"], "Post 5");
    assert_eq!(body["has_next"], true);

    let page2 = app.server.get("/posts/").add_query_param("page", 2).await;
    assert_eq!(page2.json::<Value>()["posts"].as_array().unwrap().len(), 1);

    app.server
        .get("/posts/")
        .add_query_param("page", 3)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let bad = app.server.get("/posts/").add_query_param("page", "abc").await;
    bad.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(bad.json::<Value>()["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_only_author_may_edit_post() {
    let app = setup().await;
    let author = register(&app, "writer").await;
    let other = register(&app, "critic").await;
    let post_id = create_post(&app, &author, "Mine", &["rust"]).await;

    let (name, value) = bearer(&other);
    app.server
        .post(&format!("/posts/{}/edit/", post_id))
        .add_header(name, value)
        .json(&json!({ "title": "Stolen", "content": "Nope" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let (name, value) = bearer(&other);
    app.server
        .post("/posts/9999/edit/")
        .add_header(name, value)
        .json(&json!({ "title": "Missing", "content": "Nope" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let (name, value) = bearer(&author);
    let response = app
        .server
        .post(&format!("/posts/{}/edit/", post_id))
        .add_header(name, value)
        .json(&json!({ "title": "Still mine", "content": "Edited" }))
        .await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["title"], "Still mine");
    // Tags untouched when the form omits them
    assert_eq!(body["tags"][0]["name"], "rust");
}

#[tokio::test]
async fn test_threaded_comments_on_post_detail() {
    let app = setup().await;
    let token = register(&app, "writer").await;
    let post_id = create_post(&app, &token, "Threads", &[]).await;

    let (name, value) = bearer(&token);
    let comment = app
        .server
        .post(&format!("/posts/{}/comments/new/", post_id))
        .add_header(name, value)
        .json(&json!({ "content": "First!" }))
        .await;
    comment.assert_status(StatusCode::CREATED);
    let comment_id = comment.json::<Value>()["id"].as_i64().unwrap();

    let (name, value) = bearer(&token);
    app.server
        .post(&format!("/comments/{}/reply/", comment_id))
        .add_header(name, value)
        .json(&json!({ "content": "A reply" }))
        .await
        .assert_status(StatusCode::CREATED);

    let detail = app.server.get(&format!("/posts/{}/", post_id)).await;
    detail.assert_status_ok();
    let body = detail.json::<Value>();
    assert_eq!(body["comment_count"], 2);
    assert_eq!(body["comments"][0]["content"], "First!");
    assert_eq!(body["comments"][0]["replies"][0]["content"], "A reply");

    let (name, value) = bearer(&token);
    app.server
        .post(&format!("/posts/{}/comments/new/", post_id))
        .add_header(name, value)
        .json(&json!({ "content": "   " }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_only_author_may_delete_comment() {
    let app = setup().await;
    let writer = register(&app, "writer").await;
    let other = register(&app, "other").await;
    let post_id = create_post(&app, &writer, "Threads", &[]).await;

    let (name, value) = bearer(&writer);
    let comment = app
        .server
        .post(&format!("/posts/{}/comments/new/", post_id))
        .add_header(name, value)
        .json(&json!({ "content": "Mine" }))
        .await;
    let comment_id = comment.json::<Value>()["id"].as_i64().unwrap();
    let delete_url = format!("/comments/{}/delete/", comment_id);

    let (name, value) = bearer(&other);
    app.server
        .post(&delete_url)
        .add_header(name, value)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let (name, value) = bearer(&other);
    app.server
        .get(&delete_url)
        .add_header(name, value)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    // Unknown comments are 404 even for non-authors
    let (name, value) = bearer(&other);
    app.server
        .post("/comments/9999/delete/")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let (name, value) = bearer(&writer);
    let confirm = app.server.get(&delete_url).add_header(name, value).await;
    confirm.assert_status_ok();
    assert_eq!(confirm.json::<Value>()["content"], "Mine");

    let (name, value) = bearer(&writer);
    let deleted = app.server.post(&delete_url).add_header(name, value).await;
    deleted.assert_status_ok();
    assert_eq!(deleted.json::<Value>()["post_id"], post_id);

    let detail = app.server.get(&format!("/posts/{}/", post_id)).await;
    assert_eq!(detail.json::<Value>()["comment_count"], 0);
}

#[tokio::test]
async fn test_tags_and_search() {
    let app = setup().await;
    let token = register(&app, "writer").await;
    create_post(&app, &token, "Learning Rust", &["rust", "learning"]).await;
    create_post(&app, &token, "Gardening", &["outdoors"]).await;

    let tagged = app.server.get("/tags/rust/").await;
    tagged.assert_status_ok();
    assert_eq!(tagged.json::<Value>()["posts"].as_array().unwrap().len(), 1);

    let unknown = app.server.get("/tags/nothing/").await;
    unknown.assert_status_ok();
    assert!(unknown.json::<Value>()["posts"].as_array().unwrap().is_empty());

    let search = app.server.get("/search/").add_query_param("q", "OUTDOORS").await;
    search.assert_status_ok();
    let posts = search.json::<Value>()["posts"].clone();
    assert_eq!(posts.as_array().unwrap().len(), 1);
    assert_eq!(posts[0]["title"], "Gardening");
}

// ============================================================================
// REST
// ============================================================================

#[tokio::test]
async fn test_rest_token_flow() {
    let app = setup().await;
    register(&app, "client").await;

    app.server
        .get("/api/books_all/")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let response = app
        .server
        .post("/api/auth/token/")
        .json(&json!({ "username": "client", "password": "correct-horse-42" }))
        .await;
    response.assert_status_ok();
    let key = response.json::<Value>()["token"].as_str().unwrap().to_string();

    let (name, value) = api_token(&key);
    let created = app
        .server
        .post("/api/books_all/")
        .add_header(name, value)
        .json(&json!({ "title": "Dune", "author": "Frank Herbert", "publication_year": 1965 }))
        .await;
    created.assert_status(StatusCode::CREATED);
    let book = created.json::<Value>();
    assert_eq!(book["owner"], "client");
    let id = book["id"].as_i64().unwrap();

    let (name, value) = api_token(&key);
    let patched = app
        .server
        .patch(&format!("/api/books_all/{}/", id))
        .add_header(name, value)
        .json(&json!({ "publication_year": 1966 }))
        .await;
    patched.assert_status_ok();
    let book = patched.json::<Value>();
    assert_eq!(book["title"], "Dune");
    assert_eq!(book["publication_year"], 1966);

    let public = app.server.get("/api/books/").await;
    public.assert_status_ok();
    assert_eq!(public.json::<Value>().as_array().unwrap().len(), 1);

    let (name, value) = api_token(&key);
    app.server
        .delete(&format!("/api/books_all/{}/", id))
        .add_header(name, value)
        .await
        .assert_status(StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_token_endpoint_errors() {
    let app = setup().await;
    register(&app, "client").await;

    let missing = app.server.post("/api/auth/token/").json(&json!({})).await;
    missing.assert_status(StatusCode::BAD_REQUEST);
    let details = missing.json::<Value>()["error"]["details"].clone();
    assert_eq!(details["username"][0], "This field is required.");
    assert_eq!(details["password"][0], "This field is required.");

    let wrong = app
        .server
        .post("/api/auth/token/")
        .json(&json!({ "username": "client", "password": "nope-nope-nope" }))
        .await;
    wrong.assert_status(StatusCode::BAD_REQUEST);
    assert!(wrong.json::<Value>()["error"]["details"]["non_field_errors"].is_array());
}

// ============================================================================
// Admin and health
// ============================================================================

#[tokio::test]
async fn test_admin_requires_staff() {
    let app = setup().await;
    let token = register(&app, "reader").await;

    let (name, value) = bearer(&token);
    app.server
        .get("/admin/books/")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_book_filters_and_search() {
    let app = setup().await;
    app.state.catalog_service.seed_sample_books().await.unwrap();
    let token = login_superuser(&app).await;

    let (name, value) = bearer(&token);
    let all = app.server.get("/admin/books/").add_header(name, value).await;
    all.assert_status_ok();
    assert_eq!(all.json::<Value>()["count"], 20);

    let (name, value) = bearer(&token);
    let filtered = app
        .server
        .get("/admin/books/")
        .add_header(name, value)
        .add_query_param("publication_year", 2015)
        .await;
    filtered.assert_status_ok();
    let body = filtered.json::<Value>();
    assert_eq!(body["count"], 3);
    assert_eq!(body["full_count"], 20);
    for row in body["rows"].as_array().unwrap() {
        assert_eq!(row["publication_year"], 2015);
    }

    let (name, value) = bearer(&token);
    let searched = app
        .server
        .get("/admin/books/")
        .add_header(name, value)
        .add_query_param("q", "robert martin")
        .await;
    assert_eq!(searched.json::<Value>()["count"], 2);

    let (name, value) = bearer(&token);
    app.server
        .get("/admin/books/")
        .add_header(name, value)
        .add_query_param("owner", "x")
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let (name, value) = bearer(&token);
    app.server
        .get("/admin/widgets/")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_deactivates_user() {
    let app = setup().await;
    let reader = register(&app, "reader").await;
    let reader_id = user_id(&app, "reader").await;
    let token = login_superuser(&app).await;

    let key = app
        .server
        .post("/api/auth/token/")
        .json(&json!({ "username": "reader", "password": "correct-horse-42" }))
        .await
        .json::<Value>()["token"]
        .as_str()
        .unwrap()
        .to_string();

    let (name, value) = bearer(&token);
    let response = app
        .server
        .patch(&format!("/admin/users/{}/", reader_id))
        .add_header(name, value)
        .json(&json!({ "is_active": false }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["is_active"], false);

    // Sessions of inactive users no longer authenticate
    let (name, value) = bearer(&reader);
    app.server
        .get("/profile/")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    // Reactivating doesn't bring back the old session or token
    let (name, value) = bearer(&token);
    app.server
        .patch(&format!("/admin/users/{}/", reader_id))
        .add_header(name, value)
        .json(&json!({ "is_active": true }))
        .await
        .assert_status_ok();

    let (name, value) = bearer(&reader);
    app.server
        .get("/profile/")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let (name, value) = api_token(&key);
    app.server
        .get("/api/books_all/")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_library_management() {
    let app = setup().await;
    let token = login_superuser(&app).await;

    let (name, value) = bearer(&token);
    let library = app
        .server
        .post("/admin/libraries/")
        .add_header(name, value)
        .json(&json!({ "name": "Central" }))
        .await;
    library.assert_status(StatusCode::CREATED);
    let library_id = library.json::<Value>()["id"].as_i64().unwrap();

    let book = app
        .state
        .catalog_service
        .create_book(
            crate::forms::BookForm {
                title: "Dune".to_string(),
                author: "Frank Herbert".to_string(),
                publication_year: 1965,
            },
            None,
        )
        .await
        .unwrap();

    let (name, value) = bearer(&token);
    app.server
        .post(&format!("/admin/libraries/{}/books/", library_id))
        .add_header(name, value)
        .json(&json!({ "book_id": book.id }))
        .await
        .assert_status_ok();

    let (name, value) = bearer(&token);
    app.server
        .post(&format!("/admin/libraries/{}/librarian/", library_id))
        .add_header(name, value)
        .json(&json!({ "name": "Ada" }))
        .await
        .assert_status(StatusCode::CREATED);

    let (name, value) = bearer(&token);
    app.server
        .post(&format!("/admin/libraries/{}/librarian/", library_id))
        .add_header(name, value)
        .json(&json!({ "name": "Grace" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let detail = app.server.get(&format!("/libraries/{}/", library_id)).await;
    detail.assert_status_ok();
    let body = detail.json::<Value>();
    assert_eq!(body["books"][0]["title"], "Dune");
    assert_eq!(body["librarian"]["name"], "Ada");
}

#[tokio::test]
async fn test_health_and_security_headers() {
    let app = setup().await;

    let response = app.server.get("/health").await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "ok");
    assert_eq!(body["migrations"], "current");

    assert_eq!(response.header(header::X_CONTENT_TYPE_OPTIONS), "nosniff");
    assert_eq!(response.header(header::X_FRAME_OPTIONS), "DENY");
    assert!(response
        .header(header::CONTENT_SECURITY_POLICY)
        .to_str()
        .unwrap()
        .starts_with("default-src 'self'"));
}
