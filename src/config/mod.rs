use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Secret used by the development preset. Refused outside development.
pub const DEVELOPMENT_JWT_SECRET: &str = "development-only-insecure-jwt-secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set in {0:?} mode")]
    InsecureSecret(Environment),

    #[error("invalid pagination: page_size {page_size} exceeds max_page_size {max_page_size}")]
    InvalidPagination { page_size: u32, max_page_size: u32 },

    #[error("token lifetimes must be positive")]
    InvalidTokenLifetime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub pagination: PaginationConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// When unset the server runs on the in-memory store.
    #[serde(skip_serializing)]
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    pub session_ttl_secs: u64,
    pub password_hash_cost: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    pub page_size: u32,
    pub max_page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub cors_origins: Vec<String>,
    pub enable_audit_logging: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the preset named by `APP_ENV`, then applies individual overrides.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let environment = match lookup("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_overrides(lookup)
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        // Server
        if let Some(v) = lookup("API_HOST") {
            self.server.host = v;
        }
        if let Some(port) = parsed::<u16>(&lookup, "API_PORT").or_else(|| parsed(&lookup, "PORT")) {
            self.server.port = port;
        }

        // Database
        if let Some(v) = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()) {
            self.database.url = Some(v);
        }
        if let Some(v) = parsed(&lookup, "DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v;
        }
        if let Some(v) = parsed(&lookup, "DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v;
        }

        // Auth
        if let Some(v) = lookup("JWT_SECRET").filter(|v| !v.is_empty()) {
            self.auth.jwt_secret = v;
        }
        if let Some(v) = parsed(&lookup, "JWT_ACCESS_TTL_SECS") {
            self.auth.access_ttl_secs = v;
        }
        if let Some(v) = parsed(&lookup, "JWT_REFRESH_TTL_SECS") {
            self.auth.refresh_ttl_secs = v;
        }
        if let Some(v) = parsed(&lookup, "SESSION_TTL_SECS") {
            self.auth.session_ttl_secs = v;
        }
        if let Some(v) = parsed(&lookup, "PASSWORD_HASH_COST") {
            self.auth.password_hash_cost = v;
        }

        // Pagination
        if let Some(v) = parsed(&lookup, "PAGINATION_PAGE_SIZE") {
            self.pagination.page_size = v;
        }
        if let Some(v) = parsed(&lookup, "PAGINATION_MAX_PAGE_SIZE") {
            self.pagination.max_page_size = v;
        }

        // Security
        if let Some(v) = lookup("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(v) = lookup("SECURITY_ENABLE_AUDIT_LOGGING").and_then(|v| bool::from_str(v.trim()).ok()) {
            self.security.enable_audit_logging = v;
        }

        self
    }

    /// Rejects settings the server must not start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environment != Environment::Development && self.auth.jwt_secret == DEVELOPMENT_JWT_SECRET {
            return Err(ConfigError::InsecureSecret(self.environment));
        }
        if self.pagination.page_size > self.pagination.max_page_size {
            return Err(ConfigError::InvalidPagination {
                page_size: self.pagination.page_size,
                max_page_size: self.pagination.max_page_size,
            });
        }
        if self.auth.access_ttl_secs == 0 || self.auth.refresh_ttl_secs == 0 {
            return Err(ConfigError::InvalidTokenLifetime);
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            auth: AuthConfig {
                jwt_secret: DEVELOPMENT_JWT_SECRET.to_string(),
                access_ttl_secs: 5 * 60,
                refresh_ttl_secs: 24 * 60 * 60,
                session_ttl_secs: 14 * 24 * 60 * 60,
                password_hash_cost: bcrypt::DEFAULT_COST,
            },
            pagination: PaginationConfig {
                page_size: 2,
                max_page_size: 6,
            },
            security: SecurityConfig {
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                enable_audit_logging: false,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
            },
            security: SecurityConfig {
                cors_origins: vec!["https://staging.example.com".to_string()],
                enable_audit_logging: true,
            },
            ..Self::development()
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            security: SecurityConfig {
                cors_origins: vec!["https://app.example.com".to_string()],
                enable_audit_logging: true,
            },
            ..Self::development()
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse::<T>().ok())
}
