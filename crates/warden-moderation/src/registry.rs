//! Per-space moderation context
//!
//! A context is created the first time a space is referenced (or when the
//! process joins it) and dropped when the process leaves the space.

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use warden_types::{LogCategory, LogSinks, RemoteResource, ResourceId, ResourceKind, SpaceId};

use crate::config::ModerationConfig;
use crate::state::SecurityState;

/// Name-to-id lookup of a space's roles and channels
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    roles: HashMap<String, ResourceId>,
    channels: HashMap<String, ResourceId>,
}

impl Directory {
    pub fn from_resources(resources: &[RemoteResource]) -> Self {
        let mut directory = Self::default();
        for resource in resources {
            match resource.kind {
                ResourceKind::Role if !resource.system => {
                    directory.roles.insert(resource.name.clone(), resource.id);
                }
                ResourceKind::Channel => {
                    directory.channels.insert(resource.name.clone(), resource.id);
                }
                _ => {}
            }
        }
        directory
    }

    pub fn role(&self, name: &str) -> Option<ResourceId> {
        self.roles.get(name).copied()
    }

    /// Every named role, or None when any is missing
    pub fn roles(&self, names: &[&str]) -> Option<Vec<ResourceId>> {
        names.iter().map(|name| self.role(name)).collect()
    }

    pub fn channel(&self, name: &str) -> Option<ResourceId> {
        self.channels.get(name).copied()
    }
}

/// Everything moderation keeps for one space
#[derive(Debug)]
pub struct SpaceContext {
    pub security: Mutex<SecurityState>,
    sinks: RwLock<LogSinks>,
    directory: RwLock<Option<Directory>>,
}

impl SpaceContext {
    fn new(config: &ModerationConfig) -> Self {
        Self {
            security: Mutex::new(SecurityState::new(config)),
            sinks: RwLock::new(LogSinks::new()),
            directory: RwLock::new(None),
        }
    }

    pub fn sink(&self, category: LogCategory) -> Option<ResourceId> {
        self.sinks.read().get(category)
    }

    pub fn sinks(&self) -> LogSinks {
        self.sinks.read().clone()
    }

    pub fn cached_directory(&self) -> Option<Directory> {
        self.directory.read().clone()
    }

    pub fn cache_directory(&self, directory: Directory) {
        *self.directory.write() = Some(directory);
    }

    /// Forget resolved ids; the next lookup lists the space again
    pub fn invalidate_directory(&self) {
        *self.directory.write() = None;
    }
}

/// Owner of all per-space contexts
#[derive(Debug)]
pub struct SpaceRegistry {
    config: ModerationConfig,
    spaces: DashMap<SpaceId, Arc<SpaceContext>>,
}

impl SpaceRegistry {
    pub fn new(config: ModerationConfig) -> Self {
        Self {
            config,
            spaces: DashMap::new(),
        }
    }

    pub fn get(&self, space: SpaceId) -> Option<Arc<SpaceContext>> {
        self.spaces.get(&space).map(|c| c.value().clone())
    }

    pub fn get_or_create(&self, space: SpaceId) -> Arc<SpaceContext> {
        self.spaces
            .entry(space)
            .or_insert_with(|| Arc::new(SpaceContext::new(&self.config)))
            .value()
            .clone()
    }

    pub fn remove(&self, space: SpaceId) -> bool {
        let removed = self.spaces.remove(&space).is_some();
        if removed {
            info!(space = %space, "Dropped moderation state");
        }
        removed
    }

    /// Fresh security state and new sinks after a reconstruction
    pub fn reset_space(&self, space: SpaceId, sinks: LogSinks) {
        let context = Arc::new(SpaceContext::new(&self.config));
        *context.sinks.write() = sinks;
        self.spaces.insert(space, context);
        info!(space = %space, "Moderation state reset");
    }

    /// Drop state that refers to purged roles and channels.
    ///
    /// Pending verifications go too: the purge deleted the role those
    /// members were holding.
    pub fn invalidate_space(&self, space: SpaceId) {
        let Some(context) = self.get(space) else {
            return;
        };
        context.invalidate_directory();
        let dropped = context.security.lock().clear_all_pending();
        info!(space = %space, dropped_pending = dropped, "Space directory invalidated");
    }

    pub fn spaces(&self) -> Vec<SpaceId> {
        let mut spaces: Vec<_> = self.spaces.iter().map(|e| *e.key()).collect();
        spaces.sort();
        spaces
    }

    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use warden_types::UserId;

    #[test]
    fn test_get_or_create_shares_context() {
        let registry = SpaceRegistry::new(ModerationConfig::default());
        let space = SpaceId::new(1);
        assert!(registry.get(space).is_none());

        let a = registry.get_or_create(space);
        a.security.lock().flag_suspicious(UserId::new(3));
        let b = registry.get_or_create(space);
        assert!(b.security.lock().is_suspicious(UserId::new(3)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reset_replaces_state_and_installs_sinks() {
        let registry = SpaceRegistry::new(ModerationConfig::default());
        let space = SpaceId::new(1);
        registry
            .get_or_create(space)
            .security
            .lock()
            .mark_pending(UserId::new(1), Utc::now());

        let mut sinks = LogSinks::new();
        sinks.insert(LogCategory::Moderation, ResourceId::new(77));
        registry.reset_space(space, sinks);

        let context = registry.get(space).unwrap();
        assert_eq!(context.security.lock().pending_count(), 0);
        assert_eq!(context.sink(LogCategory::Moderation), Some(ResourceId::new(77)));
        assert!(context.cached_directory().is_none());
    }

    #[test]
    fn test_invalidate_space_drops_ids_and_pending() {
        let registry = SpaceRegistry::new(ModerationConfig::default());
        let space = SpaceId::new(1);
        let context = registry.get_or_create(space);
        context.cache_directory(Directory::from_resources(&[RemoteResource::new(
            ResourceId::new(2),
            ResourceKind::Role,
            "Unverified",
        )]));
        context.security.lock().mark_pending(UserId::new(8), Utc::now());
        context.security.lock().add_warning(UserId::new(9));

        registry.invalidate_space(space);

        assert!(context.cached_directory().is_none());
        assert_eq!(context.security.lock().pending_count(), 0);
        assert_eq!(context.security.lock().warning_count(UserId::new(9)), 1);

        // Unknown spaces are ignored
        registry.invalidate_space(SpaceId::new(99));
        assert!(registry.get(SpaceId::new(99)).is_none());
    }

    #[test]
    fn test_remove() {
        let registry = SpaceRegistry::new(ModerationConfig::default());
        registry.get_or_create(SpaceId::new(2));
        assert!(registry.remove(SpaceId::new(2)));
        assert!(!registry.remove(SpaceId::new(2)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_directory_skips_system_roles() {
        let mut everyone = RemoteResource::new(ResourceId::new(1), ResourceKind::Role, "@everyone");
        everyone.system = true;
        let directory = Directory::from_resources(&[
            everyone,
            RemoteResource::new(ResourceId::new(2), ResourceKind::Role, "Member"),
            RemoteResource::new(ResourceId::new(3), ResourceKind::Channel, "welcome"),
        ]);
        assert_eq!(directory.role("@everyone"), None);
        assert_eq!(directory.role("Member"), Some(ResourceId::new(2)));
        assert_eq!(directory.channel("welcome"), Some(ResourceId::new(3)));
        assert_eq!(directory.roles(&["Member"]), Some(vec![ResourceId::new(2)]));
        assert_eq!(directory.roles(&["Member", "Unverified"]), None);
        assert_eq!(directory.roles(&[]), Some(Vec::new()));
    }
}
