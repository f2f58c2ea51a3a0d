//! Configuration for the Head Start engine.
//!
//! Read once at startup; nothing re-reads it at runtime.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Interval between background refresh cycles
    #[serde(with = "duration_serde")]
    pub refresh_interval: Duration,

    /// Ring buffer capacity per user (samples)
    pub max_events_per_user: usize,

    /// Maximum insight messages per prediction
    pub max_insights: usize,

    /// JSON model bundle loaded at startup
    pub model_bundle_path: PathBuf,

    /// IANA timezone for time-of-day features
    pub timezone: String,

    /// HTTP port
    pub port: u16,

    /// Shared secret expected in `X-API-Key`
    pub api_token: String,

    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(120),
            max_events_per_user: 12 * 60, // 12 hours of minutes
            max_insights: 3,
            model_bundle_path: PathBuf::from("models").join("model_bundle.json"),
            timezone: "UTC".to_string(),
            port: 8000,
            api_token: "dev-token".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, then apply environment
    /// overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from `path`, falling back to defaults if absent.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("headstart")
            .join("config.json")
    }

    /// Apply `HEADSTART_*` overrides read through `lookup`.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(token) = lookup("HEADSTART_API_TOKEN").or_else(|| lookup("API_TOKEN")) {
            self.api_token = token;
        }
        if let Some(port) = lookup("HEADSTART_PORT") {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::ParseError(format!("invalid HEADSTART_PORT '{port}'")))?;
        }
        if let Some(path) = lookup("HEADSTART_MODEL_BUNDLE") {
            self.model_bundle_path = PathBuf::from(path);
        }
        Ok(())
    }

    /// Parsed timezone.
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidTimezone(self.timezone.clone()))
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    InvalidTimezone(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::InvalidTimezone(tz) => write!(f, "Unknown timezone: {tz}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
