//! Configuration management for the newsdesk service
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/<env>.toml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Admin authentication
    pub auth: AuthConfig,

    /// Chat-completion service configuration
    pub chat: ChatConfig,

    /// Transactional email service configuration
    pub email: EmailConfig,

    /// Newsletter assembly/delivery tunables
    pub newsletter: NewsletterConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum concurrent requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Bearer token required on admin endpoints
    pub admin_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatConfig {
    /// Provider: openai-compatible endpoint, or "mock"
    #[serde(default = "default_chat_provider")]
    pub provider: String,

    /// API key for the chat-completion service
    pub api_key: Option<String>,

    /// API base URL (for custom gateways)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_chat_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_chat_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries per call
    #[serde(default = "default_chat_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmailConfig {
    /// Provider: HTTP transactional API, or "mock"
    #[serde(default = "default_email_provider")]
    pub provider: String,

    /// API key for the email service
    pub api_key: Option<String>,

    /// API base URL
    pub api_base: Option<String>,

    /// From address on outgoing mail
    #[serde(default = "default_from_address")]
    pub from_address: String,

    /// Display name on outgoing mail
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewsletterConfig {
    /// Public base URL used in tracking and unsubscribe links
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Reader-facing site URL that article links point at
    #[serde(default = "default_site_url")]
    pub site_url: String,

    /// Newsletter display title
    #[serde(default = "default_title")]
    pub title: String,

    /// Trailing window (days) for hero/top-story ranking
    #[serde(default = "default_ranking_window")]
    pub ranking_window_days: i64,

    /// Sends between throttle pauses
    #[serde(default = "default_throttle_every")]
    pub throttle_every: usize,

    /// Throttle pause in milliseconds
    #[serde(default = "default_throttle_pause")]
    pub throttle_pause_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log filter (tracing env-filter syntax)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    120
}
fn default_max_concurrent() -> usize {
    100
}
fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    2
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_chat_provider() -> String {
    "openai".to_string()
}
fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_chat_timeout() -> u64 {
    60
}
fn default_chat_retries() -> u32 {
    3
}
fn default_email_provider() -> String {
    "resend".to_string()
}
fn default_from_address() -> String {
    "newsletter@example.com".to_string()
}
fn default_from_name() -> String {
    "The Daily Edition".to_string()
}
fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_site_url() -> String {
    "https://news.example.com".to_string()
}
fn default_title() -> String {
    "The Daily Edition".to_string()
}
fn default_ranking_window() -> i64 {
    7
}
fn default_throttle_every() -> usize {
    100
}
fn default_throttle_pause() -> u64 {
    1000
}
fn default_log_level() -> String {
    "info,sqlx=warn".to_string()
}
fn default_json_logging() -> bool {
    false
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g. APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Pause inserted between send batches
    pub fn throttle_pause(&self) -> Duration {
        Duration::from_millis(self.newsletter.throttle_pause_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                request_timeout_secs: default_request_timeout(),
                max_concurrent_requests: default_max_concurrent(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/newsdesk".to_string(),
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
            },
            auth: AuthConfig { admin_token: None },
            chat: ChatConfig {
                provider: default_chat_provider(),
                api_key: None,
                api_base: None,
                model: default_chat_model(),
                timeout_secs: default_chat_timeout(),
                max_retries: default_chat_retries(),
            },
            email: EmailConfig {
                provider: default_email_provider(),
                api_key: None,
                api_base: None,
                from_address: default_from_address(),
                from_name: default_from_name(),
            },
            newsletter: NewsletterConfig {
                base_url: default_base_url(),
                site_url: default_site_url(),
                title: default_title(),
                ranking_window_days: default_ranking_window(),
                throttle_every: default_throttle_every(),
                throttle_pause_ms: default_throttle_pause(),
            },
            observability: ObservabilityConfig {
                log_level: default_log_level(),
                json_logging: default_json_logging(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.newsletter.ranking_window_days, 7);
        assert_eq!(config.newsletter.throttle_every, 100);
        assert_eq!(config.newsletter.throttle_pause_ms, 1000);
    }

    #[test]
    fn test_throttle_pause_duration() {
        let config = AppConfig::default();
        assert_eq!(config.throttle_pause(), Duration::from_secs(1));
    }
}
