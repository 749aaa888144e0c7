//! Configuration management
//!
//! Configuration is read from a YAML file (`config.yml` by default) and can be
//! overridden by `QUIRE_*` environment variables. Missing values are filled
//! with defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub blog: BlogConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (for cookie-based auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration (SQLite)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// File path, `sqlite:` URL or `:memory:`
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/quire.db".to_string()
}

/// Session and token settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_session_days")]
    pub session_days: i64,
    /// Keyword expected before API keys in the Authorization header
    #[serde(default = "default_token_keyword")]
    pub token_header_keyword: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_days: default_session_days(),
            token_header_keyword: default_token_keyword(),
        }
    }
}

fn default_session_days() -> i64 {
    7
}

fn default_token_keyword() -> String {
    "Token".to_string()
}

/// Login throttling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Login requests allowed per IP per minute
    #[serde(default = "default_login_per_minute")]
    pub login_per_minute: usize,
    /// Failed attempts allowed per username inside the window
    #[serde(default = "default_username_attempts")]
    pub username_attempts: usize,
    #[serde(default = "default_username_window_minutes")]
    pub username_window_minutes: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            login_per_minute: default_login_per_minute(),
            username_attempts: default_username_attempts(),
            username_window_minutes: default_username_window_minutes(),
        }
    }
}

fn default_login_per_minute() -> usize {
    5
}

fn default_username_attempts() -> usize {
    5
}

fn default_username_window_minutes() -> i64 {
    15
}

/// Upload configuration (profile pictures)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Upload directory path
    #[serde(default = "default_upload_path")]
    pub path: PathBuf,
    /// Maximum file size in bytes (default: 2MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Allowed image MIME types
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path: default_upload_path(),
            max_file_size: default_max_file_size(),
            allowed_types: default_allowed_types(),
        }
    }
}

fn default_upload_path() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_max_file_size() -> u64 {
    2 * 1024 * 1024 // 2MB
}

fn default_allowed_types() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/jpg".to_string(),
        "image/png".to_string(),
    ]
}

impl UploadConfig {
    /// Check if a MIME type is allowed
    pub fn is_type_allowed(&self, mime_type: &str) -> bool {
        self.allowed_types.iter().any(|t| t == mime_type)
    }

    /// Get file extension for a MIME type
    pub fn get_extension(&self, mime_type: &str) -> &'static str {
        match mime_type {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/png" => "png",
            _ => "bin",
        }
    }
}

/// Blog listing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogConfig {
    #[serde(default = "default_posts_per_page")]
    pub posts_per_page: u32,
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            posts_per_page: default_posts_per_page(),
        }
    }
}

fn default_posts_per_page() -> u32 {
    5
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
}

impl Config {
    /// Load configuration from file
    ///
    /// A missing or empty file yields the default configuration. Invalid YAML
    /// is reported with its line and column.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Recognised variables:
    /// - QUIRE_SERVER_HOST, QUIRE_SERVER_PORT, QUIRE_SERVER_CORS_ORIGIN
    /// - QUIRE_DATABASE_URL
    /// - QUIRE_AUTH_SESSION_DAYS
    /// - QUIRE_RATE_LIMIT_LOGIN_PER_MINUTE
    /// - QUIRE_UPLOAD_PATH, QUIRE_UPLOAD_MAX_FILE_SIZE
    /// - QUIRE_BLOG_POSTS_PER_PAGE
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("QUIRE_SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_parse::<u16>("QUIRE_SERVER_PORT") {
            self.server.port = port;
        }
        if let Ok(cors_origin) = std::env::var("QUIRE_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        if let Ok(url) = std::env::var("QUIRE_DATABASE_URL") {
            self.database.url = url;
        }

        if let Some(days) = env_parse::<i64>("QUIRE_AUTH_SESSION_DAYS") {
            self.auth.session_days = days;
        }

        if let Some(limit) = env_parse::<usize>("QUIRE_RATE_LIMIT_LOGIN_PER_MINUTE") {
            self.rate_limit.login_per_minute = limit;
        }

        if let Ok(path) = std::env::var("QUIRE_UPLOAD_PATH") {
            self.upload.path = PathBuf::from(path);
        }
        if let Some(size) = env_parse::<u64>("QUIRE_UPLOAD_MAX_FILE_SIZE") {
            self.upload.max_file_size = size;
        }

        if let Some(per_page) = env_parse::<u32>("QUIRE_BLOG_POSTS_PER_PAGE") {
            self.blog.posts_per_page = per_page;
        }
    }
}

/// Read and parse an env var, ignoring values that don't parse
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn valid_config_strategy() -> impl Strategy<Value = Config> {
        (
            "[a-z][a-z0-9]{0,10}",
            1u16..=65535,
            "[a-z][a-z0-9_/]{0,20}\\.db",
            1i64..=90,
            1usize..=100,
            1u32..=50,
        )
            .prop_map(|(host, port, url, days, per_minute, per_page)| {
                let mut config = Config::default();
                config.server.host = host;
                config.server.port = port;
                config.database.url = url;
                config.auth.session_days = days;
                config.rate_limit.login_per_minute = per_minute;
                config.blog.posts_per_page = per_page;
                config
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn config_yaml_roundtrip(config in valid_config_strategy()) {
            let yaml = serde_yaml::to_string(&config).expect("Failed to serialize config");

            let mut file = NamedTempFile::new().expect("Failed to create temp file");
            write!(file, "{}", yaml).expect("Failed to write config");

            let parsed = Config::load(file.path()).expect("Failed to parse config");

            prop_assert_eq!(config.server.host, parsed.server.host);
            prop_assert_eq!(config.server.port, parsed.server.port);
            prop_assert_eq!(config.database.url, parsed.database.url);
            prop_assert_eq!(config.auth.session_days, parsed.auth.session_days);
            prop_assert_eq!(config.rate_limit.login_per_minute, parsed.rate_limit.login_per_minute);
            prop_assert_eq!(config.blog.posts_per_page, parsed.blog.posts_per_page);
        }
    }
}
