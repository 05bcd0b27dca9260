/// Configuration management for blog-service
///
/// Values come from environment variables (a `.env` file is loaded by `main`
/// through dotenvy before this runs).
use serde::{Deserialize, Serialize};

/// Name used in logs, metrics labels and health responses.
pub const SERVICE_NAME: &str = "blog-service";

/// Minimum HS256 secret length accepted outside development.
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Page cache (Redis) configuration
    pub cache: CacheConfig,
    /// Bearer token verification
    pub auth: AuthConfig,
    /// Feed pagination
    pub feed: FeedConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (development, staging, production)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.env.eq_ignore_ascii_case("production")
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL. Without one, the service keeps everything in memory
    /// (development only).
    pub url: Option<String>,
    /// Max connections in pool
    pub max_connections: u32,
    /// Apply embedded migrations at startup
    pub run_migrations: bool,
}

/// Page cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Redis URL. Without one, pages are cached in process.
    pub redis_url: Option<String>,
    /// How long a rendered index page stays cached
    pub index_ttl_secs: u64,
}

/// Authentication configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret shared with the identity service
    pub jwt_secret: String,
    /// Where anonymous users are sent for create/edit/comment/follow
    pub login_url: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("login_url", &self.login_url)
            .finish()
    }
}

/// Feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Posts per page
    pub page_size: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let production = app_env.eq_ignore_ascii_case("production");

        let jwt_secret = match std::env::var("JWT_SECRET") {
            Ok(secret) => secret,
            Err(_) if production => {
                return Err("JWT_SECRET must be set in production".to_string());
            }
            Err(_) => "development-only-secret-change-me-please".to_string(),
        };
        if production && jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(format!(
                "JWT_SECRET too short: need at least {} bytes",
                MIN_JWT_SECRET_LEN
            ));
        }

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        if production && database_url.is_none() {
            return Err("DATABASE_URL must be set in production".to_string());
        }

        let page_size = parse_env_or_default("FEED_PAGE_SIZE", default_page_size())?;
        if page_size == 0 {
            return Err("FEED_PAGE_SIZE must be greater than zero".to_string());
        }

        Ok(Config {
            app: AppConfig {
                env: app_env,
                host: std::env::var("BLOG_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or_default("BLOG_SERVICE_PORT", 8080)?,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_env_or_default("DATABASE_MAX_CONNECTIONS", 10)?,
                run_migrations: parse_env_or_default("DATABASE_RUN_MIGRATIONS", true)?,
            },
            cache: CacheConfig {
                redis_url: std::env::var("REDIS_URL")
                    .ok()
                    .filter(|url| !url.trim().is_empty()),
                index_ttl_secs: parse_env_or_default(
                    "INDEX_CACHE_TTL_SECS",
                    default_index_ttl_secs(),
                )?,
            },
            auth: AuthConfig {
                jwt_secret,
                login_url: std::env::var("LOGIN_URL")
                    .unwrap_or_else(|_| default_login_url().to_string()),
            },
            feed: FeedConfig { page_size },
        })
    }
}

fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .parse()
            .map_err(|e| format!("Failed to parse {}='{}': {}", key, val, e)),
        Err(_) => Ok(default),
    }
}

pub fn default_page_size() -> usize {
    10
}

pub fn default_index_ttl_secs() -> u64 {
    20
}

pub fn default_login_url() -> &'static str {
    "/auth/login/"
}
