use tracing::Level;

use tandem_core::locale::FALLBACK_LOCALE;
use tandem_core::scenario::is_valid_difficulty;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: String,
    pub access_token: Option<String>,
    pub default_locale: String,
    pub default_difficulty: String,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let api_base_url = std::env::var("TANDEM_API_URL")
            .unwrap_or_else(|_| "http://localhost:8000".to_string());

        let access_token = std::env::var("TANDEM_ACCESS_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        let default_locale =
            std::env::var("TANDEM_LOCALE").unwrap_or_else(|_| FALLBACK_LOCALE.to_string());

        let default_difficulty =
            std::env::var("TANDEM_DIFFICULTY").unwrap_or_else(|_| "A1".to_string());
        if !is_valid_difficulty(&default_difficulty) {
            return Err(ConfigError::InvalidValue(
                "TANDEM_DIFFICULTY".to_string(),
                format!("'{}' is not a CEFR level (A1-C2)", default_difficulty),
            ));
        }

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            api_base_url,
            access_token,
            default_locale,
            default_difficulty,
            log_level,
        })
    }
}
