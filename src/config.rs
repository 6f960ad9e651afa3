use rocket::figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE_PATH: &str = "/api";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub api: ApiConfig,
    pub cors: CorsConfig,
    pub session: SessionConfig,
    pub magic_link: MagicLinkConfig,
    pub job_link: JobLinkConfig,
    pub rate_limit: RateLimitConfig,
    pub location: LocationConfig,
    pub email: EmailConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub address: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json_format: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    pub base_path: String,
    pub additional_base_paths: Vec<String>,
    pub enable_swagger: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

/// Session lifetimes and cookie flags.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    /// Set the `Secure` flag on session cookies. Disable only for local HTTP development.
    pub cookie_secure: bool,
    pub magic_session_ttl_hours: i64,
    pub job_session_ttl_hours: i64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MagicLinkConfig {
    pub default_days: i64,
    pub min_days: i64,
    pub max_days: i64,
    /// Scheme and host the shareable links point at, e.g. `https://app.example.com`.
    pub public_base_url: String,
    pub verify_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct JobLinkConfig {
    pub default_expiry_hours: i64,
    pub max_expiry_hours: i64,
    pub public_base_url: String,
    pub driver_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RateLimitConfig {
    pub magic_issue_limit: u32,
    pub job_issue_limit: u32,
    pub validate_limit: u32,
    pub window_seconds: u64,
    pub cleanup_interval_seconds: u64,
    pub require_client_ip: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LocationConfig {
    /// Location reports older than this are removed by `cron prune-locations`.
    pub retention_days: i64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_address: String,
    pub from_name: String,
    pub enabled: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/ridelink_db".to_string(),
            max_connections: 16,
            min_connections: 2,
            acquire_timeout: 5,
            run_migrations: true,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            address: "127.0.0.1".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_API_BASE_PATH.to_string(),
            additional_base_paths: Vec::new(),
            enable_swagger: true,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            allow_credentials: true,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_secure: true,
            magic_session_ttl_hours: 7 * 24,
            job_session_ttl_hours: 24,
        }
    }
}

impl Default for MagicLinkConfig {
    fn default() -> Self {
        Self {
            default_days: 3,
            min_days: 1,
            max_days: 5,
            public_base_url: "http://localhost:8000".to_string(),
            verify_path: "/auth/verify".to_string(),
        }
    }
}

impl Default for JobLinkConfig {
    fn default() -> Self {
        Self {
            default_expiry_hours: 24,
            max_expiry_hours: 7 * 24,
            public_base_url: "http://localhost:8000".to_string(),
            driver_path: "/driver/job".to_string(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            magic_issue_limit: 5,
            job_issue_limit: 50,
            validate_limit: 30,
            window_seconds: 15 * 60,
            cleanup_interval_seconds: 60,
            require_client_ip: false,
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self { retention_days: 30 }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_address: "noreply@ridelink.local".to_string(),
            from_name: "Ridelink".to_string(),
            enabled: false,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources in priority order:
    /// 1. Built-in defaults
    /// 2. Ridelink.toml (optional)
    /// 3. Environment variables (prefixed with RIDELINK_)
    /// 4. DATABASE_URL environment variable
    pub fn load() -> Result<Self, figment::Error> {
        let defaults = toml::to_string(&Config::default()).map_err(|e| figment::Error::from(e.to_string()))?;

        let figment = Figment::new()
            .merge(Toml::string(&defaults))
            .merge(Toml::file("Ridelink.toml"))
            // e.g. RIDELINK_DATABASE__URL, RIDELINK_RATE_LIMIT__WINDOW_SECONDS
            .merge(Env::prefixed("RIDELINK_").split("__"))
            .merge(Env::raw().only(&["DATABASE_URL"]).map(|_| "database.url".into()));

        figment.extract()
    }
}
