//! User service
//!
//! Registration, login/logout, sessions, API tokens and the per-user profile.
//! Every user is created together with its profile in one transaction (see
//! `UserRepository::create`).

use crate::db::repositories::{ProfileRepository, SessionRepository, TokenRepository, UserRepository};
use crate::forms::{LoginForm, ProfileForm, RegistrationForm, UserUpdateForm};
use crate::models::{ApiToken, Profile, Session, User};
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

/// Default session expiration time in days
const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 7;

/// Shown for any duplicate-email registration so the response doesn't reveal
/// which addresses are registered.
pub const REGISTRATION_FAILED: &str =
    "Registration failed. Please check your details and try again.";

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Authentication failed (invalid credentials)
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Form fields failed validation
    #[error("Invalid form: {0}")]
    InvalidForm(#[from] ValidationErrors),

    /// Username or email already taken
    #[error("{message}")]
    UserExists { field: &'static str, message: String },

    #[error("This account is inactive.")]
    InactiveUser,

    #[error("User not found")]
    NotFound,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// User service for managing users and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    token_repo: Arc<dyn TokenRepository>,
    profile_repo: Arc<dyn ProfileRepository>,
    session_expiration_days: i64,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        token_repo: Arc<dyn TokenRepository>,
        profile_repo: Arc<dyn ProfileRepository>,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            token_repo,
            profile_repo,
            session_expiration_days: DEFAULT_SESSION_EXPIRATION_DAYS,
        }
    }

    /// Override the session lifetime
    pub fn with_session_expiration(mut self, days: i64) -> Self {
        self.session_expiration_days = days;
        self
    }

    /// Register a new user.
    ///
    /// The username must be unused and the email must not belong to another
    /// account (compared case-insensitively). The domain part of the email
    /// is lowercased before storing.
    pub async fn register(&self, form: RegistrationForm) -> Result<User, UserServiceError> {
        let form = form.cleaned();
        form.validate()?;

        if self
            .user_repo
            .get_by_username(&form.username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists {
                field: "username",
                message: "A user with that username already exists.".to_string(),
            });
        }

        let email = normalize_email(&form.email);
        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            tracing::warn!("Registration rejected for duplicate email");
            return Err(UserServiceError::UserExists {
                field: "email",
                message: REGISTRATION_FAILED.to_string(),
            });
        }

        let password_hash = hash_password(&form.password1).context("Failed to hash password")?;
        let created = self
            .user_repo
            .create(&User::new(form.username, email, password_hash))
            .await
            .context("Failed to create user")?;

        tracing::info!("User registered: {}", created.username);
        Ok(created)
    }

    /// Create a staff superuser, bypassing the password strength rules
    pub async fn create_superuser(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, UserServiceError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(UserServiceError::ValidationError(
                "Username and password are required".to_string(),
            ));
        }
        if self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists {
                field: "username",
                message: "A user with that username already exists.".to_string(),
            });
        }

        let password_hash = hash_password(password).context("Failed to hash password")?;
        let mut user = User::new(username.to_string(), normalize_email(email), password_hash);
        user.is_staff = true;
        user.is_superuser = true;

        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create superuser")?;

        tracing::info!("Superuser created: {}", created.username);
        Ok(created)
    }

    /// Check credentials and open a session
    pub async fn login(&self, form: LoginForm) -> Result<(User, Session), UserServiceError> {
        form.validate()?;
        let user = self.authenticate(&form.username, &form.password).await?;

        self.user_repo
            .touch_last_login(user.id)
            .await
            .context("Failed to record login")?;
        let session = self.create_session(user.id).await?;

        tracing::info!("Session created for user {}", user.username);
        Ok((user, session))
    }

    /// Invalidate a session. Unknown sessions are ignored.
    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its active user.
    ///
    /// Expired sessions are deleted and treated as missing.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            let _ = self.session_repo.delete(token).await;
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user.filter(|u| u.is_active))
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<i64, UserServiceError> {
        let count = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?;
        Ok(count)
    }

    /// Exchange credentials for the user's API token
    pub async fn get_or_create_token(
        &self,
        username: &str,
        password: &str,
    ) -> Result<ApiToken, UserServiceError> {
        let user = match self.authenticate(username, password).await {
            Ok(user) => user,
            Err(UserServiceError::InactiveUser) => {
                return Err(UserServiceError::AuthenticationError(
                    "Unable to log in with provided credentials.".to_string(),
                ))
            }
            Err(e) => return Err(e),
        };

        let token = self
            .token_repo
            .get_or_create(user.id)
            .await
            .context("Failed to get API token")?;
        Ok(token)
    }

    /// Resolve an API token to its active user
    pub async fn user_for_token(&self, key: &str) -> Result<Option<User>, UserServiceError> {
        let user_id = match self
            .token_repo
            .get_user_id(key)
            .await
            .context("Failed to look up token")?
        {
            Some(id) => id,
            None => return Ok(None),
        };

        let user = self
            .user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to get user")?;
        Ok(user.filter(|u| u.is_active))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        let user = self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?;
        Ok(user)
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, UserServiceError> {
        let user = self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to get user by username")?;
        Ok(user)
    }

    /// Change the user's email; the new address must not belong to anyone else
    pub async fn update_email(
        &self,
        user: &User,
        form: UserUpdateForm,
    ) -> Result<User, UserServiceError> {
        form.validate()?;
        let email = normalize_email(form.email.trim());

        if let Some(existing) = self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
        {
            if existing.id != user.id {
                return Err(UserServiceError::UserExists {
                    field: "email",
                    message: "A user with that email already exists.".to_string(),
                });
            }
        }

        let mut updated = user.clone();
        updated.email = email;
        let updated = self
            .user_repo
            .update(&updated)
            .await
            .context("Failed to update user")?;
        Ok(updated)
    }

    /// Drop every session and the API token of a user
    pub async fn revoke_credentials(&self, user_id: i64) -> Result<(), UserServiceError> {
        self.session_repo
            .delete_by_user(user_id)
            .await
            .context("Failed to delete sessions")?;
        self.token_repo
            .delete_for_user(user_id)
            .await
            .context("Failed to delete API token")?;
        Ok(())
    }

    pub async fn get_profile(&self, user_id: i64) -> Result<Profile, UserServiceError> {
        self.profile_repo
            .get_by_user(user_id)
            .await
            .context("Failed to get profile")?
            .ok_or(UserServiceError::NotFound)
    }

    pub async fn update_profile(
        &self,
        user_id: i64,
        form: ProfileForm,
    ) -> Result<Profile, UserServiceError> {
        form.validate()?;
        let mut profile = self.get_profile(user_id).await?;
        profile.bio = form.bio;

        let profile = self
            .profile_repo
            .update(&profile)
            .await
            .context("Failed to update profile")?;
        Ok(profile)
    }

    /// Store the path of a freshly uploaded profile picture
    pub async fn set_profile_pic(
        &self,
        user_id: i64,
        path: String,
    ) -> Result<Profile, UserServiceError> {
        let mut profile = self.get_profile(user_id).await?;
        profile.profile_pic = Some(path);

        let profile = self
            .profile_repo
            .update(&profile)
            .await
            .context("Failed to update profile picture")?;
        Ok(profile)
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    /// Verify username and password of an active user
    async fn authenticate(&self, username: &str, password: &str) -> Result<User, UserServiceError> {
        let invalid = || {
            UserServiceError::AuthenticationError("Invalid username or password".to_string())
        };

        let user = self
            .user_repo
            .get_by_username(username.trim())
            .await
            .context("Failed to get user by username")?
            .ok_or_else(invalid)?;

        let valid = verify_password(password, &user.password_hash)
            .context("Failed to verify password")?;
        if !valid {
            return Err(invalid());
        }

        if !user.is_active {
            return Err(UserServiceError::InactiveUser);
        }

        Ok(user)
    }

    async fn create_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id,
            expires_at: now + Duration::days(self.session_expiration_days),
            created_at: now,
        };

        let created = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;
        Ok(created)
    }
}

/// Lowercase the domain part of an email address
pub fn normalize_email(email: &str) -> String {
    match email.trim().rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxProfileRepository, SqlxSessionRepository, SqlxTokenRepository, SqlxUserRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use proptest::prelude::*;

    async fn setup_test_service() -> (DynDatabasePool, UserService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let service = UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            SqlxTokenRepository::boxed(pool.clone()),
            SqlxProfileRepository::boxed(pool.clone()),
        );
        (pool, service)
    }

    fn registration(username: &str, email: &str) -> RegistrationForm {
        RegistrationForm {
            username: username.to_string(),
            email: email.to_string(),
            password1: "long-enough-pw".to_string(),
            password2: "long-enough-pw".to_string(),
        }
    }

    fn login(username: &str, password: &str) -> LoginForm {
        LoginForm {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email(" Jane.Doe@EXAMPLE.Com "), "Jane.Doe@example.com");
        assert_eq!(normalize_email("no-at-sign"), "no-at-sign");
    }

    #[tokio::test]
    async fn test_register_creates_user_with_one_profile() {
        let (pool, service) = setup_test_service().await;
        let user = service
            .register(registration("reader", "reader@Example.COM"))
            .await
            .unwrap();

        assert_eq!(user.email, "reader@example.com");
        assert!(!user.is_staff);
        assert_ne!(user.password_hash, "long-enough-pw");

        let profiles: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profiles WHERE user_id = ?")
            .bind(user.id)
            .fetch_one(pool.sqlite())
            .await
            .unwrap();
        assert_eq!(profiles, 1);
    }

    #[tokio::test]
    async fn test_register_duplicate_username_fails() {
        let (_pool, service) = setup_test_service().await;
        service.register(registration("dup", "one@example.com")).await.unwrap();

        let err = service
            .register(registration("dup", "two@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, UserServiceError::UserExists { field: "username", .. }));
    }

    #[tokio::test]
    async fn test_register_duplicate_email_fails_with_generic_message() {
        let (_pool, service) = setup_test_service().await;
        service.register(registration("first", "same@example.com")).await.unwrap();

        let err = service
            .register(registration("second", "SAME@example.com"))
            .await
            .unwrap_err();
        match err {
            UserServiceError::UserExists { field, message } => {
                assert_eq!(field, "email");
                assert_eq!(message, REGISTRATION_FAILED);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_register_invalid_form_fails() {
        let (_pool, service) = setup_test_service().await;
        let mut form = registration("weak", "weak@example.com");
        form.password1 = "12345678".to_string();
        form.password2 = "12345678".to_string();

        let err = service.register(form).await.unwrap_err();
        assert!(matches!(err, UserServiceError::InvalidForm(_)));
    }

    #[tokio::test]
    async fn test_login_validates_and_touches_last_login() {
        let (_pool, service) = setup_test_service().await;
        service.register(registration("loginer", "l@example.com")).await.unwrap();

        let (user, session) = service.login(login("loginer", "long-enough-pw")).await.unwrap();
        let validated = service.validate_session(&session.id).await.unwrap().unwrap();
        assert_eq!(validated.id, user.id);
        assert!(validated.last_login.is_some());

        service.logout(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_wrong_password_and_unknown_user_fail() {
        let (_pool, service) = setup_test_service().await;
        service.register(registration("someone", "s@example.com")).await.unwrap();

        assert!(matches!(
            service.login(login("someone", "wrong-password")).await,
            Err(UserServiceError::AuthenticationError(_))
        ));
        assert!(matches!(
            service.login(login("nobody", "long-enough-pw")).await,
            Err(UserServiceError::AuthenticationError(_))
        ));
    }

    #[tokio::test]
    async fn test_inactive_user_cannot_log_in() {
        let (pool, service) = setup_test_service().await;
        let user = service.register(registration("idle", "idle@example.com")).await.unwrap();
        SqlxUserRepository::new(pool).set_active(user.id, false).await.unwrap();

        assert!(matches!(
            service.login(login("idle", "long-enough-pw")).await,
            Err(UserServiceError::InactiveUser)
        ));
        assert!(matches!(
            service.get_or_create_token("idle", "long-enough-pw").await,
            Err(UserServiceError::AuthenticationError(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_session_is_removed() {
        let (_pool, service) = setup_test_service().await;
        let service = service.with_session_expiration(-1);
        service.register(registration("late", "late@example.com")).await.unwrap();

        let (_, session) = service.login(login("late", "long-enough-pw")).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
        assert_eq!(service.cleanup_expired_sessions().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_token_roundtrip() {
        let (_pool, service) = setup_test_service().await;
        let user = service.register(registration("api", "api@example.com")).await.unwrap();

        let token = service.get_or_create_token("api", "long-enough-pw").await.unwrap();
        let again = service.get_or_create_token("api", "long-enough-pw").await.unwrap();
        assert_eq!(token.key, again.key);

        let resolved = service.user_for_token(&token.key).await.unwrap().unwrap();
        assert_eq!(resolved.id, user.id);
        assert!(service.user_for_token("bogus").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoke_credentials() {
        let (_pool, service) = setup_test_service().await;
        let user = service.register(registration("gone", "gone@example.com")).await.unwrap();
        let (_, first) = service.login(login("gone", "long-enough-pw")).await.unwrap();
        let (_, second) = service.login(login("gone", "long-enough-pw")).await.unwrap();
        let token = service.get_or_create_token("gone", "long-enough-pw").await.unwrap();

        service.revoke_credentials(user.id).await.unwrap();

        assert!(service.validate_session(&first.id).await.unwrap().is_none());
        assert!(service.validate_session(&second.id).await.unwrap().is_none());
        assert!(service.user_for_token(&token.key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_email_rejects_other_users_address() {
        let (_pool, service) = setup_test_service().await;
        let alice = service.register(registration("alice", "alice@example.com")).await.unwrap();
        service.register(registration("bob", "bob@example.com")).await.unwrap();

        let err = service
            .update_email(&alice, UserUpdateForm { email: "BOB@example.com".to_string() })
            .await
            .unwrap_err();
        assert!(matches!(err, UserServiceError::UserExists { field: "email", .. }));

        let same = service
            .update_email(&alice, UserUpdateForm { email: "alice@EXAMPLE.com".to_string() })
            .await
            .unwrap();
        assert_eq!(same.email, "alice@example.com");
    }

    #[tokio::test]
    async fn test_profile_update_and_picture() {
        let (_pool, service) = setup_test_service().await;
        let user = service.register(registration("pic", "pic@example.com")).await.unwrap();

        let profile = service
            .update_profile(user.id, ProfileForm { bio: "Hello".to_string() })
            .await
            .unwrap();
        assert_eq!(profile.bio, "Hello");

        let long_bio = ProfileForm { bio: "x".repeat(501) };
        assert!(matches!(
            service.update_profile(user.id, long_bio).await,
            Err(UserServiceError::InvalidForm(_))
        ));

        let profile = service
            .set_profile_pic(user.id, "uploads/a.png".to_string())
            .await
            .unwrap();
        assert_eq!(profile.profile_pic.as_deref(), Some("uploads/a.png"));
        assert_eq!(profile.bio, "Hello");
    }

    #[tokio::test]
    async fn test_create_superuser() {
        let (_pool, service) = setup_test_service().await;
        let admin = service
            .create_superuser("root", "root@example.com", "pw")
            .await
            .unwrap();
        assert!(admin.is_staff && admin.is_superuser);
        assert!(service.create_superuser("root", "x@example.com", "pw").await.is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn login_roundtrip_returns_registered_user(
            username in "[a-z]{3,10}",
            password in "[a-zA-Z!@#$%^&*]{8,20}"
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result: Result<(), TestCaseError> = rt.block_on(async {
                let (_pool, service) = setup_test_service().await;
                let form = RegistrationForm {
                    username: username.clone(),
                    email: format!("{}@example.com", username),
                    password1: password.clone(),
                    password2: password.clone(),
                };
                let registered = service.register(form).await.unwrap();
                let (user, session) = service.login(login(&username, &password)).await.unwrap();
                let validated = service.validate_session(&session.id).await.unwrap().unwrap();

                prop_assert_eq!(user.id, registered.id);
                prop_assert_eq!(validated.username, registered.username);
                Ok(())
            });
            result?;
        }
    }
}
