//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section. Every field carries a serde default so an empty configuration
//! is valid.

pub mod app;
pub mod broker;
pub mod logging;
pub mod notifier;
pub mod upload;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use self::app::ServerConfig;
pub use self::broker::{BrokerConfig, RedisBrokerConfig};
pub use self::logging::{LogFormat, LoggingConfig};
pub use self::notifier::NotifierConfig;
pub use self::upload::UploadConfig;
pub use self::worker::WorkerConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Job store (broker) settings.
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Background worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Event notifier settings.
    #[serde(default)]
    pub notifier: NotifierConfig,
    /// Upload acceptance and processing settings.
    #[serde(default)]
    pub upload: UploadConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges `config/default.toml` with an environment-specific overlay
    /// (`config/{env}.toml`) and environment variables prefixed with
    /// `FILEFLOW__` (e.g. `FILEFLOW__WORKER__CONCURRENCY=8`).
    pub fn load(env: &str) -> Result<Self, AppError> {
        Self::load_from("config", env)
    }

    /// Load configuration from an explicit configuration directory.
    pub fn load_from(dir: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(&format!("{dir}/default")).required(false))
            .add_source(config::File::with_name(&format!("{dir}/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("FILEFLOW")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let parsed: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        parsed.validate()?;
        Ok(parsed)
    }

    /// Reject combinations the worker cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.worker.concurrency == 0 {
            return Err(AppError::configuration(
                "worker.concurrency must be at least 1",
            ));
        }
        if self.worker.max_attempts == 0 {
            return Err(AppError::configuration(
                "worker.max_attempts must be at least 1",
            ));
        }
        if self.worker.visibility_timeout_seconds == 0 {
            return Err(AppError::configuration(
                "worker.visibility_timeout_seconds must be at least 1",
            ));
        }
        if self.broker.queue.trim().is_empty() {
            return Err(AppError::configuration("broker.queue must not be empty"));
        }
        Ok(())
    }
}
