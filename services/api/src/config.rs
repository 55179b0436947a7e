//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
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
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    /// Chat model used for full-story text generation.
    pub story_model: String,
    /// Gemini model used for page illustrations.
    pub image_model: String,
    /// Attempt cap for the image-generation retry loop.
    pub image_max_retries: u32,
    /// Root directory where uploaded illustrations are stored.
    pub media_dir: PathBuf,
    /// Base URL under which stored media is publicly reachable.
    pub public_base_url: String,
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

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load API Keys (as optional) ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let gemini_api_key = std::env::var("GEMINI_API_KEY").ok();

        // --- Load Adapter-specific Settings ---
        let story_model =
            std::env::var("STORY_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let image_model =
            std::env::var("IMAGE_MODEL").unwrap_or_else(|_| "gemini-2.0-flash-exp".to_string());

        let image_max_retries = match std::env::var("IMAGE_MAX_RETRIES") {
            Ok(raw) => raw.parse::<u32>().map_err(|_| {
                ConfigError::InvalidValue(
                    "IMAGE_MAX_RETRIES".to_string(),
                    format!("'{}' is not a valid retry count", raw),
                )
            })?,
            Err(_) => 3,
        };

        let media_dir = std::env::var("MEDIA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./media"));

        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://{}", bind_address));

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            gemini_api_key,
            story_model,
            image_model,
            image_max_retries,
            media_dir,
            public_base_url,
        })
    }
}
