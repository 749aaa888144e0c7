//! User, profile and permission models
//!
//! The user record carries the staff/superuser/active flags used by the admin
//! and the permission checks. Every user owns exactly one `Profile`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User entity representing a registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Email address
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    /// Stored path of the uploaded profile photo
    pub profile_photo: Option<String>,
    /// Can reach the admin endpoints
    pub is_staff: bool,
    /// Implicitly holds every permission
    pub is_superuser: bool,
    /// Inactive accounts cannot log in and hold no permissions
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// Create a new active, unprivileged user.
    ///
    /// The password must already be hashed; see `services::password::hash_password()`.
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        Self {
            id: 0, // Will be set by the database
            username,
            email,
            password_hash,
            first_name: String::new(),
            last_name: String::new(),
            date_of_birth: None,
            profile_photo: None,
            is_staff: false,
            is_superuser: false,
            is_active: true,
            date_joined: Utc::now(),
            last_login: None,
        }
    }

    /// Age in whole years, counted as elapsed days / 365.
    pub fn get_age(&self, today: NaiveDate) -> Option<i64> {
        self.date_of_birth
            .map(|dob| (today - dob).num_days() / 365)
    }

    /// "First Last (@username)", or just the username when no name is set.
    pub fn get_full_display_name(&self) -> String {
        let full_name = format!("{} {}", self.first_name, self.last_name);
        let full_name = full_name.trim();
        if full_name.is_empty() {
            self.username.clone()
        } else {
            format!("{} (@{})", full_name, self.username)
        }
    }

    /// Check whether this user authored the object
    pub fn owns(&self, author_id: i64) -> bool {
        self.id == author_id
    }
}

/// Profile attached one-to-one to a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: i64,
    pub user_id: i64,
    pub bio: String,
    pub profile_pic: Option<String>,
}

/// Book permissions that gate the bookshelf views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    View,
    Create,
    Edit,
    Delete,
}

impl Permission {
    pub const ALL: [Permission; 4] = [
        Permission::View,
        Permission::Create,
        Permission::Edit,
        Permission::Delete,
    ];

    /// Codename stored in the `permissions` table
    pub fn codename(&self) -> &'static str {
        match self {
            Permission::View => "can_view",
            Permission::Create => "can_create",
            Permission::Edit => "can_edit",
            Permission::Delete => "can_delete",
        }
    }

    /// Human-readable name
    pub fn label(&self) -> &'static str {
        match self {
            Permission::View => "Can view book",
            Permission::Create => "Can create book",
            Permission::Edit => "Can edit book",
            Permission::Delete => "Can delete book",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.codename())
    }
}

impl FromStr for Permission {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "can_view" => Ok(Permission::View),
            "can_create" => Ok(Permission::Create),
            "can_edit" => Ok(Permission::Edit),
            "can_delete" => Ok(Permission::Delete),
            _ => Err(anyhow::anyhow!("Unknown permission: {}", s)),
        }
    }
}

/// The groups created by `setup-groups`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultGroup {
    Viewers,
    Editors,
    Admins,
}

impl DefaultGroup {
    pub const ALL: [DefaultGroup; 3] = [
        DefaultGroup::Viewers,
        DefaultGroup::Editors,
        DefaultGroup::Admins,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DefaultGroup::Viewers => "Viewers",
            DefaultGroup::Editors => "Editors",
            DefaultGroup::Admins => "Admins",
        }
    }

    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            DefaultGroup::Viewers => &[Permission::View],
            DefaultGroup::Editors => &[Permission::View, Permission::Create, Permission::Edit],
            DefaultGroup::Admins => &Permission::ALL,
        }
    }
}

/// A permission group row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub permissions: Vec<String>,
}
