//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub cors_origin: String,
    pub chat_endpoint_url: String,
    pub chat_api_key: Option<String>,
    pub quran_api_base_url: String,
    pub tafsir_api_base_url: String,
    pub tafsir_id: u32,
    pub translation_edition: String,
    pub word_language: String,
    pub cache_dir: PathBuf,
    pub cache_ttl: Duration,
    pub fetch_max_retries: u32,
    pub fetch_base_delay: Duration,
    pub probe_url: String,
    pub probe_timeout: Duration,
    pub probe_slow_threshold: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to keep tests hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required =
            |key: &str| lookup(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()));

        // --- Server, Logging and Database ---
        let bind_address = parse_var("BIND_ADDRESS", &var_or("BIND_ADDRESS", "0.0.0.0:3000"))?;
        let database_url = required("DATABASE_URL")?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;
        let cors_origin = var_or("CORS_ORIGIN", "http://localhost:5173");

        // --- Chat endpoint ---
        let chat_endpoint_url = required("CHAT_ENDPOINT_URL")?;
        let chat_api_key = lookup("CHAT_API_KEY");

        // --- Content provider ---
        let quran_api_base_url = var_or("QURAN_API_BASE_URL", "https://api.alquran.cloud/v1");
        let tafsir_api_base_url =
            var_or("TAFSIR_API_BASE_URL", "https://api.quran.com/api/v4");
        let tafsir_id = parse_var("TAFSIR_ID", &var_or("TAFSIR_ID", "169"))?;
        let translation_edition = var_or("TRANSLATION_EDITION", "en.sahih");
        let word_language = var_or("WORD_LANGUAGE", "en");
        let cache_dir = PathBuf::from(var_or("CACHE_DIR", "./cache"));
        let cache_ttl =
            Duration::from_secs(parse_var("CACHE_TTL_SECS", &var_or("CACHE_TTL_SECS", "86400"))?);
        let fetch_max_retries = parse_var("FETCH_MAX_RETRIES", &var_or("FETCH_MAX_RETRIES", "3"))?;
        let fetch_base_delay = Duration::from_millis(parse_var(
            "FETCH_BASE_DELAY_MS",
            &var_or("FETCH_BASE_DELAY_MS", "1000"),
        )?);

        // --- Connectivity probe ---
        let probe_url = var_or("PROBE_URL", &format!("{}/meta", quran_api_base_url));
        let probe_timeout = Duration::from_millis(parse_var(
            "PROBE_TIMEOUT_MS",
            &var_or("PROBE_TIMEOUT_MS", "5000"),
        )?);
        let probe_slow_threshold =
            Duration::from_millis(parse_var("PROBE_SLOW_MS", &var_or("PROBE_SLOW_MS", "2000"))?);

        if fetch_max_retries == 0 {
            return Err(ConfigError::InvalidValue(
                "FETCH_MAX_RETRIES".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            cors_origin,
            chat_endpoint_url,
            chat_api_key,
            quran_api_base_url,
            tafsir_api_base_url,
            tafsir_id,
            translation_edition,
            word_language,
            cache_dir,
            cache_ttl,
            fetch_max_retries,
            fetch_base_delay,
            probe_url,
            probe_timeout,
            probe_slow_threshold,
        })
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}
