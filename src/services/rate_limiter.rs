//! Rate limiter for login attempts
//!
//! Two sliding windows guard the login endpoint:
//! - requests per IP address within one minute
//! - failed attempts per username within a configurable window
//!
//! Both limits come from `RateLimitConfig`.

use crate::config::RateLimitConfig;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

type Attempts<K> = Arc<RwLock<HashMap<K, Vec<DateTime<Utc>>>>>;

/// Login rate limiter
pub struct LoginRateLimiter {
    /// Failed login attempts by lowercased username
    username_attempts: Attempts<String>,
    /// Requests by IP address
    ip_attempts: Attempts<IpAddr>,
    ip_limit: usize,
    username_limit: usize,
    username_window: Duration,
}

impl LoginRateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            username_attempts: Arc::new(RwLock::new(HashMap::new())),
            ip_attempts: Arc::new(RwLock::new(HashMap::new())),
            ip_limit: config.login_per_minute,
            username_limit: config.username_attempts,
            username_window: Duration::minutes(config.username_window_minutes),
        }
    }

    /// True once the username has reached its failed-attempt limit
    pub async fn is_username_limited(&self, username: &str) -> bool {
        let cutoff = Utc::now() - self.username_window;
        let mut attempts = self.username_attempts.write().await;

        let entry = attempts.entry(username.to_lowercase()).or_default();
        entry.retain(|time| *time > cutoff);
        entry.len() >= self.username_limit
    }

    pub async fn record_failed_attempt(&self, username: &str) {
        let mut attempts = self.username_attempts.write().await;
        attempts
            .entry(username.to_lowercase())
            .or_default()
            .push(Utc::now());
    }

    /// Forget failed attempts after a successful login
    pub async fn clear_username_attempts(&self, username: &str) {
        let mut attempts = self.username_attempts.write().await;
        attempts.remove(&username.to_lowercase());
    }

    /// True once the IP has used up its requests for the current minute
    pub async fn is_ip_limited(&self, ip: IpAddr) -> bool {
        let cutoff = Utc::now() - Duration::minutes(1);
        let mut attempts = self.ip_attempts.write().await;

        let entry = attempts.entry(ip).or_default();
        entry.retain(|time| *time > cutoff);
        entry.len() >= self.ip_limit
    }

    pub async fn record_ip_request(&self, ip: IpAddr) {
        let mut attempts = self.ip_attempts.write().await;
        attempts.entry(ip).or_default().push(Utc::now());
    }

    /// Drop expired entries. Called periodically from `main`.
    pub async fn cleanup(&self) {
        let now = Utc::now();
        let username_cutoff = now - self.username_window;
        let ip_cutoff = now - Duration::minutes(1);

        {
            let mut attempts = self.username_attempts.write().await;
            attempts.retain(|_, times| {
                times.retain(|time| *time > username_cutoff);
                !times.is_empty()
            });
        }

        {
            let mut attempts = self.ip_attempts.write().await;
            attempts.retain(|_, times| {
                times.retain(|time| *time > ip_cutoff);
                !times.is_empty()
            });
        }
    }

    /// Length of the failed-attempt window, for `retry_after` hints
    pub fn username_window_seconds(&self) -> i64 {
        self.username_window.num_seconds()
    }

    /// Number of usernames and IPs currently tracked
    pub async fn tracked(&self) -> (usize, usize) {
        (
            self.username_attempts.read().await.len(),
            self.ip_attempts.read().await.len(),
        )
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new(&RateLimitConfig::default())
    }
}
