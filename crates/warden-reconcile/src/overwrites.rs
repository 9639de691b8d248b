//! Permission overwrite computation for provisioned containers.

use std::collections::HashMap;
use warden_types::{OverwriteTarget, Permission, PermissionOverwrite, PermissionSet, ResourceId};

/// Capabilities withheld from the implicit everyone grant on every category
pub fn everyone_denied() -> PermissionSet {
    PermissionSet::of(&[
        Permission::ViewChannel,
        Permission::SendMessages,
        Permission::Connect,
        Permission::AddReactions,
        Permission::UseApplicationCommands,
    ])
}

/// Capabilities handed to each role allowed into a category
pub fn allowed_role_grant() -> PermissionSet {
    PermissionSet::of(&[
        Permission::ViewChannel,
        Permission::SendMessages,
        Permission::ReadMessageHistory,
        Permission::Connect,
        Permission::Speak,
        Permission::UseVoiceActivation,
        Permission::AddReactions,
        Permission::EmbedLinks,
        Permission::AttachFiles,
        Permission::UseExternalEmojis,
        Permission::UseApplicationCommands,
        Permission::CreatePublicThreads,
        Permission::SendMessagesInThreads,
    ])
}

/// Overwrites for a category: deny everyone, allow each listed role that
/// exists in `role_ids`.
pub fn category_overwrites(
    role_ids: &HashMap<String, ResourceId>,
    allowed_roles: &[String],
) -> Vec<PermissionOverwrite> {
    let mut overwrites = vec![PermissionOverwrite::deny(
        OverwriteTarget::Everyone,
        everyone_denied(),
    )];

    overwrites.extend(
        allowed_roles
            .iter()
            .filter_map(|name| role_ids.get(name))
            .map(|id| PermissionOverwrite::allow(OverwriteTarget::Role(*id), allowed_role_grant())),
    );

    overwrites
}

/// Channel-level overwrite that makes a text channel read-only
pub fn read_only_overwrites() -> Vec<PermissionOverwrite> {
    vec![PermissionOverwrite::deny(
        OverwriteTarget::Everyone,
        PermissionSet::of(&[
            Permission::SendMessages,
            Permission::AddReactions,
            Permission::CreatePublicThreads,
        ]),
    )]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_overwrites_deny_everyone_first() {
        let mut roles = HashMap::new();
        roles.insert("Member".to_string(), ResourceId::new(10));
        roles.insert("Admin".to_string(), ResourceId::new(11));

        let overwrites = category_overwrites(&roles, &["Member".to_string(), "Ghost".to_string()]);

        assert_eq!(overwrites.len(), 2);
        assert_eq!(overwrites[0].target, OverwriteTarget::Everyone);
        assert!(overwrites[0].deny.contains(Permission::ViewChannel));
        assert_eq!(overwrites[1].target, OverwriteTarget::Role(ResourceId::new(10)));
        assert!(overwrites[1].allow.contains(Permission::ReadMessageHistory));
        assert!(overwrites[1].deny.is_empty());
    }

    #[test]
    fn test_read_only_keeps_view() {
        let overwrites = read_only_overwrites();
        assert!(overwrites[0].deny.contains(Permission::SendMessages));
        assert!(!overwrites[0].deny.contains(Permission::ViewChannel));
    }
}
