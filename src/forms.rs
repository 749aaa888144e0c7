//! Request forms
//!
//! Each form is a `validator` derive over the submitted fields. Call
//! `cleaned()` first to strip surrounding whitespace the way the forms are
//! stored, then `validate()`.

use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::borrow::Cow;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

pub const MIN_PUBLICATION_YEAR: i32 = 0;
pub const MAX_PUBLICATION_YEAR: i32 = 2100;
pub const MIN_PASSWORD_LENGTH: usize = 8;

fn error(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

fn validate_username(username: &str) -> Result<(), ValidationError> {
    let allowed = |c: char| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_');
    if !username.is_empty() && username.chars().all(allowed) {
        Ok(())
    } else {
        Err(error(
            "invalid_username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ))
    }
}

fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(error(
            "password_too_short",
            "This password is too short. It must contain at least 8 characters.",
        ));
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(error("password_entirely_numeric", "This password is entirely numeric."));
    }
    Ok(())
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(error("blank", "This field may not be blank."))
    } else {
        Ok(())
    }
}

fn validate_tag_names(tags: &[String]) -> Result<(), ValidationError> {
    for tag in tags {
        let len = tag.trim().chars().count();
        if len == 0 || len > 50 {
            return Err(error("invalid_tag", "Each tag must be 1-50 characters."));
        }
    }
    Ok(())
}

/// Book create/edit form
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BookForm {
    #[validate(length(min = 2, max = 200, message = "Title must be 2-200 characters."))]
    pub title: String,
    /// Author name
    #[validate(length(min = 1, max = 100, message = "Author must be 1-100 characters."))]
    pub author: String,
    #[validate(range(
        min = MIN_PUBLICATION_YEAR,
        max = MAX_PUBLICATION_YEAR,
        message = "Publication year must be between 0 and 2100."
    ))]
    pub publication_year: i32,
}

impl BookForm {
    pub fn cleaned(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self.author = self.author.trim().to_string();
        self
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LibraryForm {
    #[validate(
        length(max = 100, message = "Name must be at most 100 characters."),
        custom(function = "validate_not_blank")
    )]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LibrarianForm {
    #[validate(
        length(max = 100, message = "Name must be at most 100 characters."),
        custom(function = "validate_not_blank")
    )]
    pub name: String,
}

/// Sign-up form
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegistrationForm {
    #[validate(
        length(min = 1, max = 150, message = "Username must be 1-150 characters."),
        custom(function = "validate_username")
    )]
    pub username: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(custom(function = "validate_password_strength"))]
    pub password1: String,
    #[validate(must_match(other = "password1", message = "The two password fields didn't match."))]
    pub password2: String,
}

impl RegistrationForm {
    pub fn cleaned(mut self) -> Self {
        self.username = self.username.trim().to_string();
        self.email = self.email.trim().to_string();
        self
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginForm {
    #[validate(length(min = 1, message = "This field is required."))]
    pub username: String,
    #[validate(length(min = 1, message = "This field is required."))]
    pub password: String,
}

/// Account email change
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UserUpdateForm {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProfileForm {
    #[validate(length(max = 500, message = "Bio must be at most 500 characters."))]
    #[serde(default)]
    pub bio: String,
}

/// Blog post create/edit form
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PostForm {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters."))]
    pub title: String,
    #[validate(custom(function = "validate_not_blank"))]
    pub content: String,
    /// Tag names; `None` leaves existing tags untouched on edit
    #[validate(custom(function = "validate_tag_names"))]
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl PostForm {
    pub fn cleaned(mut self) -> Self {
        self.title = self.title.trim().to_string();
        if let Some(tags) = self.tags.as_mut() {
            for tag in tags.iter_mut() {
                *tag = tag.trim().to_string();
            }
        }
        self
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CommentForm {
    #[validate(
        length(max = 2000, message = "Comment must be at most 2000 characters."),
        custom(function = "validate_not_blank")
    )]
    pub content: String,
}

impl CommentForm {
    pub fn cleaned(mut self) -> Self {
        self.content = self.content.trim().to_string();
        self
    }
}

/// Render validation errors as `{ "<field>": ["message", ...] }`
pub fn validation_details(errors: &ValidationErrors) -> Value {
    let mut details = Map::new();
    for (field, kind) in errors.errors() {
        if let ValidationErrorsKind::Field(field_errors) = kind {
            let messages: Vec<Value> = field_errors
                .iter()
                .map(|e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value ({})", e.code));
                    Value::String(message)
                })
                .collect();
            details.insert(field.to_string(), Value::Array(messages));
        }
    }
    Value::Object(details)
}

/// Single-field error details in the same shape as `validation_details`
pub fn field_error(field: &str, message: &str) -> Value {
    json!({ field: [message] })
}
