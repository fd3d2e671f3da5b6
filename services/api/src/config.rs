//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
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

/// Ceiling and window for one rate-limited operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub ceiling: u32,
    pub window: Duration,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Without a database the service runs on in-memory stores.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub openai_api_base: Option<String>,
    pub analysis_model: String,
    pub conversation_model: String,
    pub analysis_max_tokens: u32,
    pub summary_max_tokens: u32,
    pub verify_rate_limit: RateLimitSettings,
    pub club_create_rate_limit: RateLimitSettings,
    /// `None` disables pruning of expired rate-limit records.
    pub rate_limit_prune_interval: Option<Duration>,
    pub cors_origin: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
            database_url: None,
            log_level: Level::INFO,
            openai_api_key: None,
            openai_api_base: None,
            analysis_model: "gpt-4o".to_string(),
            conversation_model: "gpt-4o-mini".to_string(),
            analysis_max_tokens: 2048,
            summary_max_tokens: 1024,
            verify_rate_limit: RateLimitSettings {
                ceiling: 5,
                window: Duration::from_secs(60),
            },
            club_create_rate_limit: RateLimitSettings {
                ceiling: 3,
                window: Duration::from_secs(3600),
            },
            rate_limit_prune_interval: Some(Duration::from_secs(600)),
            cors_origin: "http://localhost:3000".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        // --- Server and Database Settings ---
        let bind_address = parse_or(&lookup, "BIND_ADDRESS", defaults.bind_address)?;
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Generation Backend ---
        let openai_api_key = lookup("OPENAI_API_KEY");
        let openai_api_base = lookup("OPENAI_API_BASE");
        let analysis_model = lookup("ANALYSIS_MODEL").unwrap_or(defaults.analysis_model);
        let conversation_model =
            lookup("CONVERSATION_MODEL").unwrap_or(defaults.conversation_model);
        let analysis_max_tokens =
            parse_or(&lookup, "ANALYSIS_MAX_TOKENS", defaults.analysis_max_tokens)?;
        let summary_max_tokens =
            parse_or(&lookup, "SUMMARY_MAX_TOKENS", defaults.summary_max_tokens)?;

        // --- Rate Limits ---
        let verify_rate_limit = RateLimitSettings {
            ceiling: parse_or(&lookup, "VERIFY_RATE_LIMIT", defaults.verify_rate_limit.ceiling)?,
            window: Duration::from_secs(parse_or(
                &lookup,
                "VERIFY_RATE_WINDOW_SECS",
                defaults.verify_rate_limit.window.as_secs(),
            )?),
        };
        let club_create_rate_limit = RateLimitSettings {
            ceiling: parse_or(
                &lookup,
                "CLUB_CREATE_RATE_LIMIT",
                defaults.club_create_rate_limit.ceiling,
            )?,
            window: Duration::from_secs(parse_or(
                &lookup,
                "CLUB_CREATE_RATE_WINDOW_SECS",
                defaults.club_create_rate_limit.window.as_secs(),
            )?),
        };
        let prune_secs: u64 = parse_or(&lookup, "RATE_LIMIT_PRUNE_SECS", 600)?;
        let rate_limit_prune_interval = (prune_secs > 0).then(|| Duration::from_secs(prune_secs));

        let cors_origin = lookup("CORS_ORIGIN").unwrap_or(defaults.cors_origin);

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            openai_api_base,
            analysis_model,
            conversation_model,
            analysis_max_tokens,
            summary_max_tokens,
            verify_rate_limit,
            club_create_rate_limit,
            rate_limit_prune_interval,
            cors_origin,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => Ok(default),
    }
}
