/// Process configuration
/// Everything is read from environment variables (after `.env` is loaded)

use std::env;
use thiserror::Error;
use tracing::{info, warn};

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_JWT_TTL_SECS: i64 = 24 * 60 * 60;
const DEFAULT_BCRYPT_COST: u32 = 12;
const DEFAULT_EMAIL_FROM: &str = "no-reply@example.com";
const DEV_JWT_SECRET: &str = "development-only-secret-change-me";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub token: Option<String>,
    pub public_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_ttl_secs: i64,
    pub bcrypt_cost: u32,
    pub sendgrid_api_key: Option<String>,
    pub email_from: String,
    pub storage: Option<StorageConfig>,
    pub cors_allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = parse_or(&get, "PORT", DEFAULT_PORT)?;
        let jwt_ttl_secs = parse_or(&get, "JWT_EXPIRES_IN_SECS", DEFAULT_JWT_TTL_SECS)?;
        if jwt_ttl_secs <= 0 {
            return Err(ConfigError::InvalidConfig(
                "JWT_EXPIRES_IN_SECS must be positive".to_string(),
            ));
        }

        let bcrypt_cost = parse_or(&get, "BCRYPT_COST", DEFAULT_BCRYPT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::InvalidConfig(
                "BCRYPT_COST must be between 4 and 31".to_string(),
            ));
        }

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                warn!("JWT_SECRET is not set; using an insecure development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let storage = match get("STORAGE_ENDPOINT") {
            Some(endpoint) => Some(StorageConfig {
                endpoint,
                bucket: get("STORAGE_BUCKET")
                    .ok_or_else(|| ConfigError::MissingEnv("STORAGE_BUCKET".to_string()))?,
                token: get("STORAGE_TOKEN"),
                public_url: get("STORAGE_PUBLIC_URL"),
            }),
            None => None,
        };

        let cors_allowed_origins = get("CORS_ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let config = Self {
            port,
            database_url: get("DATABASE_URL"),
            jwt_secret,
            jwt_ttl_secs,
            bcrypt_cost,
            sendgrid_api_key: get("SENDGRID_API_KEY"),
            email_from: get("EMAIL_FROM").unwrap_or_else(|| DEFAULT_EMAIL_FROM.to_string()),
            storage,
            cors_allowed_origins,
        };

        info!(
            port = config.port,
            database = config.database_url.is_some(),
            storage = config.storage.is_some(),
            sendgrid = config.sendgrid_api_key.is_some(),
            jwt_ttl_secs = config.jwt_ttl_secs,
            "Configuration loaded"
        );

        Ok(config)
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidConfig(format!("Invalid {}: {} ({})", key, raw, e))),
        None => Ok(default),
    }
}
