//! Profile endpoints
//!
//! - GET /profile/ - Current user with profile
//! - POST /profile/ - Update email and bio
//! - POST /profile/photo/ - Upload a profile picture (multipart field `profile_pic`)

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;
use uuid::Uuid;
use validator::Validate;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, JsonForm};
use crate::api::responses::ProfileResponse;
use crate::forms::{ProfileForm, UserUpdateForm};

/// Multipart overhead allowed on top of the file size limit
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Request body for POST /profile/; absent fields are left unchanged
#[derive(Debug, Deserialize)]
pub struct ProfileUpdateRequest {
    pub email: Option<String>,
    pub bio: Option<String>,
}

/// Build the profile router (requires auth middleware)
pub fn router(max_file_size: u64) -> Router<AppState> {
    let body_limit = usize::try_from(max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/profile/", get(get_profile).post(update_profile))
        .route(
            "/profile/photo/",
            post(upload_profile_pic).layer(DefaultBodyLimit::max(body_limit)),
        )
}

async fn get_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = state.user_service.get_profile(user.0.id).await?;
    Ok(Json(ProfileResponse {
        user: user.0.into(),
        profile,
    }))
}

/// POST /profile/ - Both forms are validated before anything is saved
async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    JsonForm(body): JsonForm<ProfileUpdateRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user_form = body.email.map(|email| UserUpdateForm { email });
    let profile_form = body.bio.map(|bio| ProfileForm { bio });

    if let Some(form) = &user_form {
        form.validate()?;
    }
    if let Some(form) = &profile_form {
        form.validate()?;
    }

    let mut current = user.0;
    if let Some(form) = user_form {
        current = state.user_service.update_email(&current, form).await?;
    }
    let profile = match profile_form {
        Some(form) => state.user_service.update_profile(current.id, form).await?,
        None => state.user_service.get_profile(current.id).await?,
    };

    Ok(Json(ProfileResponse {
        user: current.into(),
        profile,
    }))
}

/// POST /profile/photo/ - Upload a profile picture
///
/// Accepts multipart/form-data with a single file field named "profile_pic".
async fn upload_profile_pic(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<Json<ProfileResponse>, ApiError> {
    let config = &state.upload_config;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ApiError::validation_error(format!("Failed to read upload: {}", e.body_text()))
    })? {
        if field.name() != Some("profile_pic") {
            continue;
        }

        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        if !config.is_type_allowed(&content_type) {
            return Err(ApiError::with_details(
                "VALIDATION_ERROR",
                "Unsupported image type.",
                crate::forms::field_error(
                    "profile_pic",
                    &format!("Allowed types: {}", config.allowed_types.join(", ")),
                ),
            ));
        }

        let data = field.bytes().await.map_err(|e| {
            ApiError::validation_error(format!("Failed to read upload: {}", e.body_text()))
        })?;

        if data.len() as u64 > config.max_file_size {
            return Err(ApiError::with_details(
                "VALIDATION_ERROR",
                "File too large.",
                crate::forms::field_error(
                    "profile_pic",
                    &format!(
                        "Maximum size is {} MB.",
                        config.max_file_size / 1024 / 1024
                    ),
                ),
            ));
        }

        ensure_upload_dir(&config.path).await?;

        let new_filename = format!("{}.{}", Uuid::new_v4(), config.get_extension(&content_type));
        fs::write(config.path.join(&new_filename), &data)
            .await
            .map_err(|e| ApiError::internal_error(format!("Failed to save file: {}", e)))?;

        let profile = state
            .user_service
            .set_profile_pic(user.0.id, format!("/uploads/{}", new_filename))
            .await?;
        tracing::info!("Profile picture stored for {}", user.0.username);

        return Ok(Json(ProfileResponse {
            user: user.0.into(),
            profile,
        }));
    }

    Err(ApiError::with_details(
        "VALIDATION_ERROR",
        "No file provided",
        crate::forms::field_error("profile_pic", "This field is required."),
    ))
}

/// Ensure upload directory exists
async fn ensure_upload_dir(path: &Path) -> Result<(), ApiError> {
    fs::create_dir_all(path)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to create upload dir: {}", e)))
}
