//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section. Every field carries a default, so an empty configuration is
//! valid.

pub mod logging;
pub mod notifications;

use serde::{Deserialize, Serialize};

use self::logging::LoggingConfig;
use self::notifications::NotificationsConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Local durable key-value store settings.
    #[serde(default)]
    pub local_store: LocalStoreConfig,
    /// Notification aggregation settings.
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

/// Local durable key-value store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStoreConfig {
    /// Path of the JSON file backing the store.
    #[serde(default = "default_local_store_path")]
    pub path: String,
}

impl Default for LocalStoreConfig {
    fn default() -> Self {
        Self {
            path: default_local_store_path(),
        }
    }
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the base file at `path` with an environment-specific overlay
    /// (`config/{env}`) and environment variables prefixed with `LUMEN_`.
    /// Both files are optional.
    pub fn load(path: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("LUMEN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;
        config.notifications.validate()?;
        Ok(config)
    }
}

fn default_local_store_path() -> String {
    "data/local-store.json".to_string()
}
