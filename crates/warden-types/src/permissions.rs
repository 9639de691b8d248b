//! Permission vocabulary
//!
//! Permissions are modelled as an ordered set of named capabilities rather
//! than a raw bitfield so overwrites stay readable in logs and test output.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::ids::ResourceId;

/// A single capability that a role or overwrite can grant or deny
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Administrator,
    ViewChannel,
    SendMessages,
    ReadMessageHistory,
    AddReactions,
    UseExternalEmojis,
    EmbedLinks,
    AttachFiles,
    Connect,
    Speak,
    UseVoiceActivation,
    UseApplicationCommands,
    CreatePublicThreads,
    CreatePrivateThreads,
    SendMessagesInThreads,
    ManageMessages,
    ManageChannels,
    ManageRoles,
    ManageWebhooks,
    ManageThreads,
    ManageNicknames,
    ManageEmojis,
    ManageSpace,
    KickMembers,
    BanMembers,
    ModerateMembers,
    MuteMembers,
    DeafenMembers,
    MoveMembers,
    ViewAuditLog,
    ViewInsights,
}

/// An ordered set of permissions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn of(perms: &[Permission]) -> Self {
        Self(perms.iter().copied().collect())
    }

    /// Everyday member capabilities
    pub fn member() -> Self {
        Self::of(&[
            Permission::ViewChannel,
            Permission::SendMessages,
            Permission::ReadMessageHistory,
            Permission::AddReactions,
            Permission::UseExternalEmojis,
            Permission::EmbedLinks,
            Permission::AttachFiles,
            Permission::Connect,
            Permission::Speak,
            Permission::UseVoiceActivation,
            Permission::UseApplicationCommands,
            Permission::CreatePublicThreads,
            Permission::CreatePrivateThreads,
            Permission::SendMessagesInThreads,
        ])
    }

    /// Member capabilities plus moderation tooling
    pub fn moderator() -> Self {
        Self::member().with(&[
            Permission::ManageMessages,
            Permission::KickMembers,
            Permission::BanMembers,
            Permission::ModerateMembers,
            Permission::ManageThreads,
            Permission::ManageNicknames,
            Permission::ViewAuditLog,
            Permission::MuteMembers,
            Permission::DeafenMembers,
            Permission::MoveMembers,
            Permission::ManageEmojis,
            Permission::ViewInsights,
        ])
    }

    pub fn administrator() -> Self {
        Self::of(&[Permission::Administrator])
    }

    /// Capabilities required by automation accounts
    pub fn automation() -> Self {
        Self::moderator().with(&[
            Permission::ManageChannels,
            Permission::ManageRoles,
            Permission::ManageWebhooks,
            Permission::ManageSpace,
        ])
    }

    /// Read-only access for members awaiting verification
    pub fn read_only() -> Self {
        Self::of(&[Permission::ViewChannel, Permission::ReadMessageHistory])
    }

    pub fn with(mut self, perms: &[Permission]) -> Self {
        self.0.extend(perms.iter().copied());
        self
    }

    pub fn contains(&self, perm: Permission) -> bool {
        self.0.contains(&perm)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.0.iter()
    }
}

/// Who an overwrite applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OverwriteTarget {
    /// The implicit grant every member holds
    Everyone,
    Role(ResourceId),
}

/// Per-container allow/deny pair for one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOverwrite {
    pub target: OverwriteTarget,
    pub allow: PermissionSet,
    pub deny: PermissionSet,
}

impl PermissionOverwrite {
    pub fn allow(target: OverwriteTarget, allow: PermissionSet) -> Self {
        Self {
            target,
            allow,
            deny: PermissionSet::empty(),
        }
    }

    pub fn deny(target: OverwriteTarget, deny: PermissionSet) -> Self {
        Self {
            target,
            allow: PermissionSet::empty(),
            deny,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moderator_extends_member() {
        let member = PermissionSet::member();
        let moderator = PermissionSet::moderator();
        assert!(member.iter().all(|p| moderator.contains(*p)));
        assert!(moderator.contains(Permission::ModerateMembers));
        assert!(!member.contains(Permission::KickMembers));
    }

    #[test]
    fn test_read_only_has_no_send() {
        let ro = PermissionSet::read_only();
        assert!(ro.contains(Permission::ViewChannel));
        assert!(!ro.contains(Permission::SendMessages));
        assert_eq!(ro.len(), 2);
    }
}
