//! Moderation configuration.
//!
//! Thresholds, content limits, toggles and role names for the real-time
//! monitor, plus the periodic sweep intervals.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use warden_types::content::{owned, PROFANITY, SCAM_DOMAINS};

/// Settings for event inspection and escalation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Messages within `spam_window_secs` that count as a burst.
    #[serde(default = "default_spam_threshold")]
    pub spam_threshold: usize,

    #[serde(default = "default_spam_window_secs")]
    pub spam_window_secs: u64,

    /// Timestamps kept per member for burst detection.
    #[serde(default = "default_spam_capacity")]
    pub spam_capacity: usize,

    /// Joins within `raid_window_secs` that trigger lockdown.
    #[serde(default = "default_raid_threshold")]
    pub raid_threshold: usize,

    #[serde(default = "default_raid_window_secs")]
    pub raid_window_secs: u64,

    /// Join timestamps kept per space.
    #[serde(default = "default_raid_capacity")]
    pub raid_capacity: usize,

    /// Accounts younger than this are flagged on join.
    #[serde(default = "default_min_account_age_secs")]
    pub min_account_age_secs: u64,

    #[serde(default = "default_max_mentions")]
    pub max_mentions: u32,

    #[serde(default = "default_max_emojis")]
    pub max_emojis: usize,

    /// Uppercase share of letters, in percent, above which a message is
    /// flagged.
    #[serde(default = "default_max_caps_percent")]
    pub max_caps_percent: u32,

    /// Messages of this many characters or fewer skip the caps check.
    #[serde(default = "default_caps_min_length")]
    pub caps_min_length: usize,

    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,

    #[serde(default = "default_max_lines")]
    pub max_lines: usize,

    #[serde(default = "default_max_combining_marks")]
    pub max_combining_marks: usize,

    /// Warnings that trigger a timeout.
    #[serde(default = "default_max_warnings")]
    pub max_warnings: u32,

    #[serde(default = "default_warning_timeout_secs")]
    pub warning_timeout_secs: u64,

    /// Members still unverified after this long are removed.
    #[serde(default = "default_unverified_kick_after_secs")]
    pub unverified_kick_after_secs: u64,

    #[serde(default = "default_welcome_channel")]
    pub welcome_channel: String,

    #[serde(default = "default_verify_channel")]
    pub verify_channel: String,

    #[serde(default = "default_unverified_role")]
    pub unverified_role: String,

    #[serde(default = "default_member_role")]
    pub member_role: String,

    /// Members holding any of these roles bypass every check.
    #[serde(default = "default_trusted_roles")]
    pub trusted_roles: Vec<String>,

    #[serde(default = "default_true")]
    pub block_invite_links: bool,

    #[serde(default = "default_true")]
    pub block_scam_links: bool,

    #[serde(default = "default_true")]
    pub block_mass_mentions: bool,

    #[serde(default = "default_true")]
    pub block_excessive_caps: bool,

    #[serde(default = "default_true")]
    pub block_corrupted_text: bool,

    #[serde(default = "default_true")]
    pub detect_mass_emojis: bool,

    /// Server-side rules already filter profanity.
    #[serde(default)]
    pub filter_profanity: bool,

    #[serde(default = "default_scam_domains")]
    pub scam_domains: Vec<String>,

    #[serde(default = "default_profanity")]
    pub profanity: Vec<String>,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            spam_threshold: default_spam_threshold(),
            spam_window_secs: default_spam_window_secs(),
            spam_capacity: default_spam_capacity(),
            raid_threshold: default_raid_threshold(),
            raid_window_secs: default_raid_window_secs(),
            raid_capacity: default_raid_capacity(),
            min_account_age_secs: default_min_account_age_secs(),
            max_mentions: default_max_mentions(),
            max_emojis: default_max_emojis(),
            max_caps_percent: default_max_caps_percent(),
            caps_min_length: default_caps_min_length(),
            max_message_length: default_max_message_length(),
            max_lines: default_max_lines(),
            max_combining_marks: default_max_combining_marks(),
            max_warnings: default_max_warnings(),
            warning_timeout_secs: default_warning_timeout_secs(),
            unverified_kick_after_secs: default_unverified_kick_after_secs(),
            welcome_channel: default_welcome_channel(),
            verify_channel: default_verify_channel(),
            unverified_role: default_unverified_role(),
            member_role: default_member_role(),
            trusted_roles: default_trusted_roles(),
            block_invite_links: true,
            block_scam_links: true,
            block_mass_mentions: true,
            block_excessive_caps: true,
            block_corrupted_text: true,
            detect_mass_emojis: true,
            filter_profanity: false,
            scam_domains: default_scam_domains(),
            profanity: default_profanity(),
        }
    }
}

impl ModerationConfig {
    pub fn spam_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.spam_window_secs as i64)
    }

    pub fn raid_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.raid_window_secs as i64)
    }

    pub fn min_account_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.min_account_age_secs as i64)
    }

    pub fn unverified_kick_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.unverified_kick_after_secs as i64)
    }

    pub fn warning_timeout(&self) -> Duration {
        Duration::from_secs(self.warning_timeout_secs)
    }
}

/// Intervals of the periodic sweeps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default = "default_verification_interval_secs")]
    pub verification_interval_secs: u64,

    #[serde(default = "default_security_interval_secs")]
    pub security_interval_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            verification_interval_secs: default_verification_interval_secs(),
            security_interval_secs: default_security_interval_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_spam_threshold() -> usize {
    5
}

fn default_spam_window_secs() -> u64 {
    5
}

fn default_spam_capacity() -> usize {
    10
}

fn default_raid_threshold() -> usize {
    10
}

fn default_raid_window_secs() -> u64 {
    10
}

fn default_raid_capacity() -> usize {
    50
}

fn default_min_account_age_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_max_mentions() -> u32 {
    5
}

fn default_max_emojis() -> usize {
    15
}

fn default_max_caps_percent() -> u32 {
    70
}

fn default_caps_min_length() -> usize {
    10
}

fn default_max_message_length() -> usize {
    2000
}

fn default_max_lines() -> usize {
    20
}

fn default_max_combining_marks() -> usize {
    10
}

fn default_max_warnings() -> u32 {
    3
}

fn default_warning_timeout_secs() -> u64 {
    1800
}

fn default_unverified_kick_after_secs() -> u64 {
    3600
}

fn default_welcome_channel() -> String {
    "welcome".to_string()
}

fn default_verify_channel() -> String {
    "verify".to_string()
}

fn default_unverified_role() -> String {
    "Unverified".to_string()
}

fn default_member_role() -> String {
    "Member".to_string()
}

fn default_trusted_roles() -> Vec<String> {
    owned(&[
        "Helper",
        "Moderator",
        "Senior Mod",
        "Admin",
        "Head Admin",
        "Co-Owner",
        "Server Owner",
    ])
}

fn default_scam_domains() -> Vec<String> {
    owned(SCAM_DOMAINS)
}

fn default_profanity() -> Vec<String> {
    owned(PROFANITY)
}

fn default_verification_interval_secs() -> u64 {
    300
}

fn default_security_interval_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ModerationConfig::default();
        assert_eq!(config.spam_threshold, 5);
        assert_eq!(config.raid_threshold, 10);
        assert_eq!(config.max_warnings, 3);
        assert_eq!(config.warning_timeout(), Duration::from_secs(1800));
        assert_eq!(config.min_account_age(), chrono::Duration::days(7));
        assert!(!config.filter_profanity);
        assert_eq!(config.trusted_roles.len(), 7);
        assert_eq!(config.scam_domains.len(), 13);
    }

    #[test]
    fn test_sweep_defaults() {
        let sweeps = SweepConfig::default();
        assert_eq!(sweeps.verification_interval_secs, 300);
        assert_eq!(sweeps.security_interval_secs, 30);
    }
}
