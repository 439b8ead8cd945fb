use std::{env, fmt::Display, fs::read_to_string, str::FromStr, time::Duration};

use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Redis,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown storage backend '{other}'")),
        }
    }
}

pub const MIN_BCRYPT_COST: u32 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub storage: StorageBackend,
    pub redis_url: String,
    pub jwt_secret: String,
    pub token_lifetime: Duration,
    pub bcrypt_cost: u32,
    pub identity_service_url: String,
    pub grievance_service_url: String,
    pub identity_timeout: Duration,
    pub categorize_timeout: Duration,
    pub cors_allow_origins: Vec<String>,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn load() -> Self {
        let jwt_expires_hours: u64 = try_load("JWT_EXPIRES_HOURS", "24");
        let bcrypt_cost: u32 = try_load("BCRYPT_COST", "10");
        let max_upload_mb: usize = try_load("MAX_UPLOAD_MB", "100");
        let origins: String = try_load("CORS_ALLOW_ORIGINS", "*");

        if bcrypt_cost < MIN_BCRYPT_COST {
            warn!("BCRYPT_COST {bcrypt_cost} too low, raising to {MIN_BCRYPT_COST}");
        }

        Self {
            port: try_load("RUST_PORT", "8000"),
            storage: try_load("STORAGE_BACKEND", "redis"),
            redis_url: try_load("REDIS_URL", "redis://redis:6379"),
            jwt_secret: read_secret("JWT_SECRET"),
            token_lifetime: Duration::from_secs(jwt_expires_hours * 60 * 60),
            bcrypt_cost: bcrypt_cost.max(MIN_BCRYPT_COST),
            identity_service_url: try_load("IDENTITY_SERVICE_URL", "http://localhost:5001"),
            grievance_service_url: try_load("GRIEVANCE_SERVICE_URL", "http://localhost:5002"),
            identity_timeout: Duration::from_secs(try_load("IDENTITY_TIMEOUT_SECS", "30")),
            categorize_timeout: Duration::from_secs(try_load("CATEGORIZE_TIMEOUT_SECS", "5")),
            cors_allow_origins: split_origins(&origins),
            max_upload_bytes: max_upload_mb * 1024 * 1024,
        }
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}

/// Docker secret first, then a plain environment variable.
fn read_secret(secret_name: &str) -> String {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            info!("Failed to read {secret_name} from file: {e}");
        })
        .or_else(|_| env::var(secret_name).map(|s| s.trim().to_string()))
        .ok()
        .filter(|s| !s.is_empty())
        .expect("Secrets misconfigured!")
}
