//! Audit log destinations

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::ids::ResourceId;

/// Category of audit log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogCategory {
    Message,
    Member,
    Moderation,
    Security,
    Voice,
}

impl LogCategory {
    pub const ALL: [LogCategory; 5] = [
        LogCategory::Message,
        LogCategory::Member,
        LogCategory::Moderation,
        LogCategory::Security,
        LogCategory::Voice,
    ];

    /// Name of the channel that backs this category
    pub fn channel_name(&self) -> &'static str {
        match self {
            LogCategory::Message => "message-logs",
            LogCategory::Member => "member-logs",
            LogCategory::Moderation => "mod-logs",
            LogCategory::Security => "security-logs",
            LogCategory::Voice => "voice-logs",
        }
    }

    pub fn from_channel_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.channel_name() == name)
    }
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.channel_name())
    }
}

/// Per-space mapping from log category to alert hook.
///
/// Empty until a reconstruction provisions the hooks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSinks {
    hooks: HashMap<LogCategory, ResourceId>,
}

impl LogSinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, category: LogCategory, hook: ResourceId) {
        self.hooks.insert(category, hook);
    }

    pub fn get(&self, category: LogCategory) -> Option<ResourceId> {
        self.hooks.get(&category).copied()
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}
