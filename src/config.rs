use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub proxy_url: String,
    pub proxy_timeout: Duration,
    pub results_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub max_file_size: usize,
    pub max_json_body: usize,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub access_token_ttl_secs: u64,
    pub refresh_token_ttl_days: i64,
}

fn var_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Reads configuration from the process environment. Call `dotenvy::dotenv()` first
    /// if a `.env` file should be honoured.
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;

        let proxy_url =
            env::var("MAGIC_PROXY_URL").unwrap_or_else(|_| "http://localhost:5719".to_string());
        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Self {
            database_url,
            jwt_secret,
            proxy_url,
            proxy_timeout: Duration::from_secs(var_or("PROXY_TIMEOUT_SECS", 300)?),
            results_dir: PathBuf::from(env::var("RESULTS_DIR").unwrap_or_else(|_| "results".into())),
            uploads_dir: PathBuf::from(env::var("UPLOADS_DIR").unwrap_or_else(|_| "uploads".into())),
            max_file_size: var_or("MAX_FILE_SIZE", 100 * 1024 * 1024)?,
            max_json_body: var_or("MAX_JSON_BODY", 20 * 1024 * 1024)?,
            port: var_or("PORT", 5720)?,
            allowed_origins,
            access_token_ttl_secs: var_or("ACCESS_TOKEN_TTL_SECS", 900)?,
            refresh_token_ttl_days: var_or("REFRESH_TOKEN_TTL_DAYS", 1)?,
        })
    }
}
