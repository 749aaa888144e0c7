//! Session and API token models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session entity for cookie/Bearer authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session ID (token)
    pub id: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// Long-lived API key, one per user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiToken {
    pub key: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}
