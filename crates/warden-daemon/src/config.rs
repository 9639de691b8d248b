//! Configuration for wardend

use serde::{Deserialize, Serialize};
use warden_moderation::{ModerationConfig, SweepConfig};
use warden_reconcile::ReconcileConfig;
use warden_remote::{BatchConfig, RetryConfig};

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WardenConfig {
    /// Remote call policy
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Reconstruction settings
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// Thresholds and toggles for real-time moderation
    #[serde(default)]
    pub moderation: ModerationConfig,

    /// Periodic sweep intervals
    #[serde(default)]
    pub sweeps: SweepConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Retry and batch settings shared by every remote caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub batch: BatchConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl WardenConfig {
    /// Layer compiled defaults, an optional file and `WARDEN_*` variables.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `WARDEN_MODERATION__SPAM_THRESHOLD=8`.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&WardenConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("WARDEN")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
