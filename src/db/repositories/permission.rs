//! Permission and group repository
//!
//! A user's effective permissions are the union of direct grants and the
//! grants of every group the user belongs to.

use crate::db::DynDatabasePool;
use crate::models::Group;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use std::sync::Arc;

#[async_trait]
pub trait PermissionRepository: Send + Sync {
    /// Get the group id, creating the group if needed
    async fn ensure_group(&self, name: &str) -> Result<i64>;

    /// Replace the permission set of a group
    async fn set_group_permissions(&self, group_id: i64, codenames: &[&str]) -> Result<()>;

    async fn add_user_to_group(&self, user_id: i64, group_id: i64) -> Result<()>;

    async fn get_group_id(&self, name: &str) -> Result<Option<i64>>;

    /// Grant a permission directly to a user
    async fn grant_user_permission(&self, user_id: i64, codename: &str) -> Result<()>;

    /// Codenames granted to the user, directly or through groups
    async fn user_permission_codenames(&self, user_id: i64) -> Result<Vec<String>>;

    /// All groups with their permission codenames, ordered by name
    async fn list_groups(&self) -> Result<Vec<Group>>;
}

pub struct SqlxPermissionRepository {
    pool: DynDatabasePool,
}

impl SqlxPermissionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PermissionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PermissionRepository for SqlxPermissionRepository {
    async fn ensure_group(&self, name: &str) -> Result<i64> {
        let pool = self.pool.sqlite();
        sqlx::query("INSERT OR IGNORE INTO groups (name) VALUES (?)")
            .bind(name)
            .execute(pool)
            .await
            .context("Failed to create group")?;

        get_group_id_sqlite(pool, name)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Group {} missing after insert", name))
    }

    async fn set_group_permissions(&self, group_id: i64, codenames: &[&str]) -> Result<()> {
        let mut tx = self
            .pool
            .sqlite()
            .begin()
            .await
            .context("Failed to begin transaction")?;

        sqlx::query("DELETE FROM group_permissions WHERE group_id = ?")
            .bind(group_id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear group permissions")?;

        for codename in codenames {
            let inserted = sqlx::query(
                r#"
                INSERT INTO group_permissions (group_id, permission_id)
                SELECT ?, id FROM permissions WHERE codename = ?
                "#,
            )
            .bind(group_id)
            .bind(codename)
            .execute(&mut *tx)
            .await
            .context("Failed to add group permission")?;

            if inserted.rows_affected() == 0 {
                anyhow::bail!("Unknown permission: {}", codename);
            }
        }

        tx.commit().await.context("Failed to commit group permissions")?;
        Ok(())
    }

    async fn add_user_to_group(&self, user_id: i64, group_id: i64) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO user_groups (user_id, group_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(group_id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to add user to group")?;
        Ok(())
    }

    async fn get_group_id(&self, name: &str) -> Result<Option<i64>> {
        get_group_id_sqlite(self.pool.sqlite(), name).await
    }

    async fn grant_user_permission(&self, user_id: i64, codename: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO user_permissions (user_id, permission_id)
            SELECT ?, id FROM permissions WHERE codename = ?
            "#,
        )
        .bind(user_id)
        .bind(codename)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to grant permission")?;

        // rows_affected is 0 both for unknown codenames and repeated grants
        if result.rows_affected() == 0 && !permission_exists_sqlite(self.pool.sqlite(), codename).await? {
            anyhow::bail!("Unknown permission: {}", codename);
        }
        Ok(())
    }

    async fn user_permission_codenames(&self, user_id: i64) -> Result<Vec<String>> {
        let codenames: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT p.codename FROM permissions p
            JOIN user_permissions up ON up.permission_id = p.id
            WHERE up.user_id = ?
            UNION
            SELECT p.codename FROM permissions p
            JOIN group_permissions gp ON gp.permission_id = p.id
            JOIN user_groups ug ON ug.group_id = gp.group_id
            WHERE ug.user_id = ?
            ORDER BY 1
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(self.pool.sqlite())
        .await
        .context("Failed to load user permissions")?;

        Ok(codenames)
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        let rows = sqlx::query(
            r#"
            SELECT g.id, g.name, p.codename
            FROM groups g
            LEFT JOIN group_permissions gp ON gp.group_id = g.id
            LEFT JOIN permissions p ON p.id = gp.permission_id
            ORDER BY g.name, p.codename
            "#,
        )
        .fetch_all(self.pool.sqlite())
        .await
        .context("Failed to list groups")?;

        let mut groups: BTreeMap<String, Group> = BTreeMap::new();
        for row in rows {
            let id: i64 = row.try_get("id")?;
            let name: String = row.try_get("name")?;
            let codename: Option<String> = row.try_get("codename")?;
            let group = groups.entry(name.clone()).or_insert_with(|| Group {
                id,
                name,
                permissions: Vec::new(),
            });
            if let Some(codename) = codename {
                group.permissions.push(codename);
            }
        }

        Ok(groups.into_values().collect())
    }
}

async fn get_group_id_sqlite(pool: &SqlitePool, name: &str) -> Result<Option<i64>> {
    let id: Option<i64> = sqlx::query_scalar("SELECT id FROM groups WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("Failed to get group")?;
    Ok(id)
}

async fn permission_exists_sqlite(pool: &SqlitePool, codename: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM permissions WHERE codename = ?")
        .bind(codename)
        .fetch_one(pool)
        .await
        .context("Failed to check permission")?;
    Ok(count > 0)
}
