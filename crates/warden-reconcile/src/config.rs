//! Reconstruction configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for the reconstruction run itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Temporary channel that hosts progress output and survives the purge.
    #[serde(default = "default_progress_channel")]
    pub progress_channel: String,

    /// Maximum characters of error text included in failure reports.
    #[serde(default = "default_error_excerpt_chars")]
    pub error_excerpt_chars: usize,

    /// Server-side automation rules.
    #[serde(default)]
    pub automod: AutoModConfig,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            progress_channel: default_progress_channel(),
            error_excerpt_chars: default_error_excerpt_chars(),
            automod: AutoModConfig::default(),
        }
    }
}

/// Toggles and limits for the automation rules created during AutoMod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoModConfig {
    #[serde(default = "default_true")]
    pub block_invite_links: bool,

    #[serde(default = "default_true")]
    pub block_scam_links: bool,

    #[serde(default = "default_true")]
    pub block_mass_mentions: bool,

    #[serde(default = "default_true")]
    pub filter_profanity: bool,

    /// Mentions per message before the mention rule fires.
    #[serde(default = "default_mention_limit")]
    pub mention_limit: u32,

    /// Regex patterns the remote accepts per keyword rule.
    #[serde(default = "default_max_patterns")]
    pub max_patterns_per_rule: usize,

    #[serde(default = "default_scam_timeout_secs")]
    pub scam_timeout_secs: u64,

    #[serde(default = "default_mention_timeout_secs")]
    pub mention_timeout_secs: u64,
}

impl Default for AutoModConfig {
    fn default() -> Self {
        Self {
            block_invite_links: true,
            block_scam_links: true,
            block_mass_mentions: true,
            filter_profanity: true,
            mention_limit: default_mention_limit(),
            max_patterns_per_rule: default_max_patterns(),
            scam_timeout_secs: default_scam_timeout_secs(),
            mention_timeout_secs: default_mention_timeout_secs(),
        }
    }
}

impl AutoModConfig {
    pub fn scam_timeout(&self) -> Duration {
        Duration::from_secs(self.scam_timeout_secs)
    }

    pub fn mention_timeout(&self) -> Duration {
        Duration::from_secs(self.mention_timeout_secs)
    }
}

fn default_true() -> bool {
    true
}

fn default_progress_channel() -> String {
    "deployment-progress".to_string()
}

fn default_error_excerpt_chars() -> usize {
    500
}

fn default_mention_limit() -> u32 {
    5
}

fn default_max_patterns() -> usize {
    10
}

fn default_scam_timeout_secs() -> u64 {
    600
}

fn default_mention_timeout_secs() -> u64 {
    300
}
