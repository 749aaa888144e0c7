//! Profile repository
//!
//! Profiles are inserted by `UserRepository::create`; this repository only
//! reads and updates them.

use crate::db::DynDatabasePool;
use crate::models::Profile;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get_by_user(&self, user_id: i64) -> Result<Option<Profile>>;

    /// Update bio and picture of an existing profile
    async fn update(&self, profile: &Profile) -> Result<Profile>;

    async fn count_for_user(&self, user_id: i64) -> Result<i64>;
}

pub struct SqlxProfileRepository {
    pool: DynDatabasePool,
}

impl SqlxProfileRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ProfileRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ProfileRepository for SqlxProfileRepository {
    async fn get_by_user(&self, user_id: i64) -> Result<Option<Profile>> {
        let row = sqlx::query("SELECT id, user_id, bio, profile_pic FROM profiles WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get profile")?;

        match row {
            Some(row) => Ok(Some(Profile {
                id: row.try_get("id")?,
                user_id: row.try_get("user_id")?,
                bio: row.try_get("bio")?,
                profile_pic: row.try_get("profile_pic")?,
            })),
            None => Ok(None),
        }
    }

    async fn update(&self, profile: &Profile) -> Result<Profile> {
        sqlx::query("UPDATE profiles SET bio = ?, profile_pic = ? WHERE user_id = ?")
            .bind(&profile.bio)
            .bind(&profile.profile_pic)
            .bind(profile.user_id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to update profile")?;

        self.get_by_user(profile.user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Profile not found after update"))
    }

    async fn count_for_user(&self, user_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profiles WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(self.pool.sqlite())
            .await
            .context("Failed to count profiles")?;
        Ok(count)
    }
}
