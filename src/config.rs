//! Application configuration, read once from the environment at startup and
//! shared through [`crate::state::AppState`].

use std::{net::SocketAddr, path::PathBuf};

use crate::db::DbConfig;
use crate::logging::config::LogConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn from_env() -> Self {
        match std::env::var("ENVIRONMENT").as_deref() {
            Ok("production") => Environment::Production,
            _ => Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Outbound mail settings
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    /// Sender address on every message
    pub from: String,
    /// Receives the "new reservation" notification
    pub owner: String,
    pub template_dir: PathBuf,
    pub queue_capacity: usize,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("MAIL_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: env_parse("MAIL_PORT", 1025),
            from: std::env::var("MAIL_FROM").unwrap_or_else(|_| "me@here.com".to_string()),
            owner: std::env::var("MAIL_OWNER").unwrap_or_else(|_| "me@here.com".to_string()),
            template_dir: std::env::var("MAIL_TEMPLATE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("email-templates")),
            queue_capacity: env_parse("MAIL_QUEUE_CAPACITY", 100).max(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    /// Build the template cache once instead of on every request
    pub use_cache: bool,
    pub csrf_protection: bool,
    pub static_dir: PathBuf,
    pub session_lifetime_hours: i64,
    /// Administrator seeded into the in-memory repository: (email, bcrypt hash)
    pub admin_seed: Option<(String, String)>,
    pub log: LogConfig,
    pub database: DbConfig,
    pub mail: MailConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = Environment::from_env();
        let in_production = environment == Environment::Production;

        Self {
            environment,
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env_parse("PORT", 8080),
            use_cache: env_parse("USE_TEMPLATE_CACHE", in_production),
            csrf_protection: env_parse("CSRF_PROTECTION", true),
            static_dir: std::env::var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("static")),
            session_lifetime_hours: env_parse("SESSION_LIFETIME_HOURS", 24),
            admin_seed: std::env::var("ADMIN_EMAIL")
                .ok()
                .zip(std::env::var("ADMIN_HASH_PASSWORD").ok())
                .filter(|(email, hash)| !email.is_empty() && !hash.is_empty()),
            log: LogConfig::from_env(in_production),
            database: DbConfig::default(),
            mail: MailConfig::default(),
        }
    }

    pub fn in_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port).parse()?;
        Ok(addr)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
