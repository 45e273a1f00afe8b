//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional and fall back to local-development defaults:
//! - `BOOKSTALL_API_URL` - Base URL of the REST backend
//!   (default: `http://localhost:8080/api/v1`)
//! - `BOOKSTALL_TIMEOUT_SECS` - Request timeout in seconds (default: 10)
//! - `BOOKSTALL_STATE_DIR` - Directory for persisted cart/identity state
//!   (default: `.bookstall`)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_API_URL: &str = "http://localhost:8080/api/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_STATE_DIR: &str = ".bookstall";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Bookstall client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST backend. Always ends with a trailing slash so
    /// endpoint paths can be joined relative to it.
    pub api_base_url: Url,
    /// Timeout applied to every remote call.
    pub request_timeout: Duration,
    /// Directory holding persisted client state (cart, identity).
    pub state_dir: PathBuf,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but unparseable.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_base_url = parse_base_url(&get_env_or_default(
            "BOOKSTALL_API_URL",
            DEFAULT_API_URL,
        ))?;

        let timeout_secs = get_env_or_default(
            "BOOKSTALL_TIMEOUT_SECS",
            &DEFAULT_TIMEOUT_SECS.to_string(),
        )
        .parse::<u64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("BOOKSTALL_TIMEOUT_SECS".to_string(), e.to_string())
        })?;

        let state_dir = PathBuf::from(get_env_or_default("BOOKSTALL_STATE_DIR", DEFAULT_STATE_DIR));

        Ok(Self {
            api_base_url,
            request_timeout: Duration::from_secs(timeout_secs),
            state_dir,
        })
    }

    /// Build a configuration with defaults and the given backend URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the URL is unparseable.
    pub fn with_base_url(url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_base_url: parse_base_url(url)?,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a base URL, normalizing it to end with a trailing slash.
///
/// `Url::join` drops the final path segment of a base without a trailing
/// slash, so `/api/v1` would silently become `/api`.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized)
        .map_err(|e| ConfigError::InvalidEnvVar("BOOKSTALL_API_URL".to_string(), e.to_string()))
}
