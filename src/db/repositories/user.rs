//! User repository
//!
//! Database operations for users. Creating a user also creates its profile in
//! the same transaction, so every stored user has exactly one profile.

use crate::db::DynDatabasePool;
use crate::models::User;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

const USER_COLUMNS: &str = "id, username, email, password_hash, first_name, last_name, \
    date_of_birth, profile_photo, is_staff, is_superuser, is_active, date_joined, last_login";

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user together with an empty profile
    async fn create(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Case-insensitive email lookup
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Update all mutable fields of a user
    async fn update(&self, user: &User) -> Result<User>;

    /// Set the active flag, returns false if the user doesn't exist
    async fn set_active(&self, id: i64, active: bool) -> Result<bool>;

    /// Record a successful login
    async fn touch_last_login(&self, id: i64) -> Result<()>;

    async fn count(&self) -> Result<i64>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }

    fn sqlite(&self) -> &SqlitePool {
        self.pool.sqlite()
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        let mut tx = self.sqlite().begin().await.context("Failed to begin transaction")?;

        let result = sqlx::query(
            r#"
            INSERT INTO users (username, email, password_hash, first_name, last_name,
                date_of_birth, profile_photo, is_staff, is_superuser, is_active, date_joined)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.date_of_birth)
        .bind(&user.profile_photo)
        .bind(user.is_staff)
        .bind(user.is_superuser)
        .bind(user.is_active)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create user")?;

        let id = result.last_insert_rowid();

        sqlx::query("INSERT INTO profiles (user_id, bio) VALUES (?, '')")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to create profile")?;

        tx.commit().await.context("Failed to commit user creation")?;

        Ok(User {
            id,
            date_joined: now,
            last_login: None,
            ..user.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(self.sqlite())
            .await
            .context("Failed to get user by ID")?;

        row.as_ref().map(row_to_user_sqlite).transpose()
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE username = ?",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(self.sqlite())
        .await
        .context("Failed to get user by username")?;

        row.as_ref().map(row_to_user_sqlite).transpose()
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE email != '' AND LOWER(email) = LOWER(?) LIMIT 1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(self.sqlite())
        .await
        .context("Failed to get user by email")?;

        row.as_ref().map(row_to_user_sqlite).transpose()
    }

    async fn update(&self, user: &User) -> Result<User> {
        sqlx::query(
            r#"
            UPDATE users
            SET username = ?, email = ?, password_hash = ?, first_name = ?, last_name = ?,
                date_of_birth = ?, profile_photo = ?, is_staff = ?, is_superuser = ?, is_active = ?
            WHERE id = ?
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.date_of_birth)
        .bind(&user.profile_photo)
        .bind(user.is_staff)
        .bind(user.is_superuser)
        .bind(user.is_active)
        .bind(user.id)
        .execute(self.sqlite())
        .await
        .context("Failed to update user")?;

        self.get_by_id(user.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found after update"))
    }

    async fn set_active(&self, id: i64, active: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
            .bind(active)
            .bind(id)
            .execute(self.sqlite())
            .await
            .context("Failed to update active flag")?;

        Ok(result.rows_affected() > 0)
    }

    async fn touch_last_login(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(self.sqlite())
            .await
            .context("Failed to update last login")?;
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.sqlite())
            .await
            .context("Failed to count users")?;
        Ok(count)
    }
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        date_of_birth: row.try_get("date_of_birth")?,
        profile_photo: row.try_get("profile_photo")?,
        is_staff: row.try_get("is_staff")?,
        is_superuser: row.try_get("is_superuser")?,
        is_active: row.try_get("is_active")?,
        date_joined: row.try_get("date_joined")?,
        last_login: row.try_get("last_login")?,
    })
}
