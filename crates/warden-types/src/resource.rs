//! Remote resource model and creation requests

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::ids::ResourceId;
use crate::permissions::{PermissionOverwrite, PermissionSet};

/// Kind of structural resource held by the remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Role,
    Category,
    Channel,
    AutomationRule,
    AlertHook,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Role => "role",
            ResourceKind::Category => "category",
            ResourceKind::Channel => "channel",
            ResourceKind::AutomationRule => "automation rule",
            ResourceKind::AlertHook => "alert hook",
        };
        write!(f, "{}", s)
    }
}

/// Cached reference to a resource owned by the remote service.
///
/// The remote side may delete it at any time; holders must treat a later
/// NotFound as "already gone".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteResource {
    pub id: ResourceId,
    pub kind: ResourceKind,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<ResourceId>,
    #[serde(default)]
    pub position: u32,
    /// Owned by an integration; cannot be deleted by us
    #[serde(default)]
    pub managed: bool,
    /// Built-in resource such as the implicit everyone role
    #[serde(default)]
    pub system: bool,
}

impl RemoteResource {
    pub fn new(id: ResourceId, kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            parent_id: None,
            position: 0,
            managed: false,
            system: false,
        }
    }

    pub fn with_parent(mut self, parent: ResourceId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    pub fn with_position(mut self, position: u32) -> Self {
        self.position = position;
        self
    }

    /// Roles we are allowed to remove during a purge
    pub fn is_purgeable_role(&self) -> bool {
        self.kind == ResourceKind::Role && !self.system && !self.managed
    }
}

/// Request to create a role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSpec {
    pub name: String,
    pub color: u32,
    pub permissions: PermissionSet,
    pub position: u32,
    pub hoist: bool,
    pub mentionable: bool,
}

/// Request to create a category container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySpec {
    pub name: String,
    pub position: u32,
    pub overwrites: Vec<PermissionOverwrite>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Text,
    Voice,
}

/// Request to create a channel, optionally nested in a category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub name: String,
    pub kind: ChannelKind,
    pub parent_id: Option<ResourceId>,
    pub topic: Option<String>,
    pub slowmode_secs: u32,
    /// Channel-level overwrites applied on top of the parent's
    pub overwrites: Vec<PermissionOverwrite>,
}

/// What fires an automation rule on the remote side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleTrigger {
    Keyword {
        #[serde(default)]
        keywords: Vec<String>,
        #[serde(default)]
        patterns: Vec<String>,
    },
    MentionSpam {
        mention_limit: u32,
    },
}

/// What the remote side does when a rule fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleAction {
    BlockMessage,
    SendAlert { channel: ResourceId },
    Timeout { duration: Duration },
}

/// Request to create a server-side content filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationRuleSpec {
    pub name: String,
    pub trigger: RuleTrigger,
    pub actions: Vec<RuleAction>,
    pub exempt_roles: Vec<ResourceId>,
    pub enabled: bool,
}

/// Space-wide gate applied to new members
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationLevel {
    None,
    Low,
    Medium,
    High,
    Highest,
}

impl fmt::Display for VerificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VerificationLevel::None => "none",
            VerificationLevel::Low => "low",
            VerificationLevel::Medium => "medium",
            VerificationLevel::High => "high",
            VerificationLevel::Highest => "highest",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purgeable_role() {
        let role = RemoteResource::new(ResourceId::new(1), ResourceKind::Role, "Member");
        assert!(role.is_purgeable_role());

        let mut everyone = role.clone();
        everyone.system = true;
        assert!(!everyone.is_purgeable_role());

        let mut managed = role.clone();
        managed.managed = true;
        assert!(!managed.is_purgeable_role());

        let channel = RemoteResource::new(ResourceId::new(2), ResourceKind::Channel, "general");
        assert!(!channel.is_purgeable_role());
    }

    #[test]
    fn test_rule_trigger_serialization() {
        let trigger = RuleTrigger::MentionSpam { mention_limit: 5 };
        let json = serde_json::to_string(&trigger).unwrap();
        assert!(json.contains("mention_spam"));
    }
}
