//! Permission checks
//!
//! Permissions are granted to users directly or through groups. Superusers
//! implicitly hold every permission and inactive users hold none.

use crate::db::repositories::PermissionRepository;
use crate::models::{DefaultGroup, Group, Permission, User};
use anyhow::{Context, Result};
use std::sync::Arc;

pub struct PermissionService {
    repo: Arc<dyn PermissionRepository>,
}

impl PermissionService {
    pub fn new(repo: Arc<dyn PermissionRepository>) -> Self {
        Self { repo }
    }

    pub async fn has_perm(&self, user: &User, perm: Permission) -> Result<bool> {
        if !user.is_active {
            return Ok(false);
        }
        if user.is_superuser {
            return Ok(true);
        }

        let granted = self.user_permissions(user).await?;
        Ok(granted.contains(&perm))
    }

    /// Effective permissions of the user
    pub async fn user_permissions(&self, user: &User) -> Result<Vec<Permission>> {
        if !user.is_active {
            return Ok(Vec::new());
        }
        if user.is_superuser {
            return Ok(Permission::ALL.to_vec());
        }

        let codenames = self
            .repo
            .user_permission_codenames(user.id)
            .await
            .context("Failed to load user permissions")?;

        // Codenames outside the known set can't gate anything
        Ok(codenames.iter().filter_map(|c| c.parse().ok()).collect())
    }

    /// Create the default groups with their permission sets.
    ///
    /// Running it again resets each group to its default permissions.
    pub async fn setup_groups(&self) -> Result<Vec<Group>> {
        for group in DefaultGroup::ALL {
            let group_id = self
                .repo
                .ensure_group(group.name())
                .await
                .with_context(|| format!("Failed to create group {}", group.name()))?;

            let codenames: Vec<&str> = group.permissions().iter().map(|p| p.codename()).collect();
            self.repo
                .set_group_permissions(group_id, &codenames)
                .await
                .with_context(|| format!("Failed to set permissions for {}", group.name()))?;

            tracing::info!("Group {} ready with {:?}", group.name(), codenames);
        }

        self.repo.list_groups().await.context("Failed to list groups")
    }

    /// Add a user to a default group.
    ///
    /// A group that doesn't exist yet is created with its default permissions.
    /// An existing group keeps whatever permissions it has.
    pub async fn add_user_to_group(&self, user_id: i64, group: DefaultGroup) -> Result<()> {
        let group_id = match self
            .repo
            .get_group_id(group.name())
            .await
            .context("Failed to get group")?
        {
            Some(id) => id,
            None => {
                let id = self
                    .repo
                    .ensure_group(group.name())
                    .await
                    .with_context(|| format!("Failed to create group {}", group.name()))?;
                let codenames: Vec<&str> =
                    group.permissions().iter().map(|p| p.codename()).collect();
                self.repo
                    .set_group_permissions(id, &codenames)
                    .await
                    .with_context(|| format!("Failed to set permissions for {}", group.name()))?;
                id
            }
        };
        self.repo
            .add_user_to_group(user_id, group_id)
            .await
            .context("Failed to add user to group")
    }

    /// Grant a single permission directly to a user
    pub async fn grant(&self, user_id: i64, perm: Permission) -> Result<()> {
        self.repo
            .grant_user_permission(user_id, perm.codename())
            .await
            .context("Failed to grant permission")
    }
}
