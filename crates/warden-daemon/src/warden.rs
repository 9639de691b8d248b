//! Warden core
//!
//! Owns the reconciler, the moderation engine and the sweeper for one
//! process, and routes commands and inbound events to them.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};
use warden_moderation::{
    AuditRecord, ModerationEngine, SecuritySweeper, SpaceRegistry, SweepHandles,
};
use warden_reconcile::{
    Catalog, DeploymentHook, DeploymentSummary, HealthReport, Reconciler, SecurityPosture,
};
use warden_remote::{BatchExecutor, RemoteService};
use warden_types::{
    Actor, BanChanged, LogSinks, MemberJoined, MemberLeft, MessageDeleted, MessageEdited,
    MessagePosted, ReactionAdded, SpaceEventHandler, SpaceId, UserId, VerificationLevel,
    VoiceStateChanged,
};

use crate::command::CommandSurface;
use crate::config::WardenConfig;
use crate::error::DaemonResult;

/// Keeps moderation state in step with reconstruction: ids are dropped once
/// the purge has run, and a finished run resets state and installs sinks
pub struct RegistryFinalizer {
    registry: Arc<SpaceRegistry>,
}

impl RegistryFinalizer {
    pub fn new(registry: Arc<SpaceRegistry>) -> Self {
        Self { registry }
    }
}

impl DeploymentHook for RegistryFinalizer {
    fn deployment_purged(&self, space: SpaceId) {
        self.registry.invalidate_space(space);
    }

    fn deployment_finalized(&self, space: SpaceId, sinks: LogSinks) {
        self.registry.reset_space(space, sinks);
    }

    fn deployment_failed(&self, space: SpaceId) {
        self.registry.invalidate_space(space);
    }
}

pub struct Warden {
    reconciler: Arc<Reconciler>,
    moderation: Arc<ModerationEngine>,
    sweeper: Arc<SecuritySweeper>,
}

impl Warden {
    /// Build the core on top of a remote service, using the standard catalog
    pub fn new(remote: Arc<dyn RemoteService>, config: &WardenConfig) -> DaemonResult<Self> {
        Self::with_catalog(remote, config, Catalog::standard())
    }

    pub fn with_catalog(
        remote: Arc<dyn RemoteService>,
        config: &WardenConfig,
        catalog: Catalog,
    ) -> DaemonResult<Self> {
        catalog.validate()?;

        let registry = Arc::new(SpaceRegistry::new(config.moderation.clone()));
        let moderation = Arc::new(ModerationEngine::new(
            remote.clone(),
            registry.clone(),
            config.moderation.clone(),
            config.remote.retry.clone(),
        )?);

        let executor = BatchExecutor::new(config.remote.batch.clone(), config.remote.retry.clone());
        let reconciler = Arc::new(Reconciler::new(
            remote,
            executor,
            Arc::new(catalog),
            config.reconcile.clone(),
            Arc::new(RegistryFinalizer::new(registry)),
        ));

        let sweeper = Arc::new(SecuritySweeper::new(
            moderation.clone(),
            config.sweeps.clone(),
        ));

        Ok(Self {
            reconciler,
            moderation,
            sweeper,
        })
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    pub fn moderation(&self) -> &Arc<ModerationEngine> {
        &self.moderation
    }

    pub fn sweeper(&self) -> &Arc<SecuritySweeper> {
        &self.sweeper
    }

    /// Spawn the verification and raid loops
    pub fn start_sweeps(&self) -> SweepHandles {
        self.sweeper.clone().start()
    }

    fn posture(&self, space: SpaceId) -> SecurityPosture {
        SecurityPosture {
            lockdown_active: self.moderation.lockdown_active(space),
            pending_verifications: self.moderation.pending_verifications(space),
        }
    }
}

#[async_trait]
impl CommandSurface for Warden {
    async fn reconstruct(
        &self,
        space: SpaceId,
        initiator: UserId,
    ) -> DaemonResult<DeploymentSummary> {
        let summary = self.reconciler.reconstruct(space, initiator).await?;
        info!(space = %space, "{}", summary.render());
        Ok(summary)
    }

    async fn set_lockdown(&self, space: SpaceId, enabled: bool) -> DaemonResult<VerificationLevel> {
        Ok(self.moderation.set_lockdown(space, enabled).await?)
    }

    async fn health_check(&self, space: SpaceId) -> DaemonResult<HealthReport> {
        let report = self
            .reconciler
            .health_check(space, self.posture(space))
            .await?;
        info!(space = %space, verdict = %report.verdict, "Health check complete");
        Ok(report)
    }

    async fn warn_user(
        &self,
        space: SpaceId,
        subject: &Actor,
        moderator: &Actor,
        reason: &str,
    ) -> DaemonResult<AuditRecord> {
        Ok(self
            .moderation
            .warn_user(space, subject, moderator, reason)
            .await?)
    }
}

#[async_trait]
impl SpaceEventHandler for Warden {
    async fn on_space_join(&self, space: SpaceId) {
        self.moderation.registry().get_or_create(space);
        info!(space = %space, "Joined space");
    }

    async fn on_space_leave(&self, space: SpaceId) {
        self.moderation.registry().remove(space);
        self.reconciler.forget(space);
        info!(space = %space, "Left space");
    }

    async fn on_member_join(&self, event: MemberJoined) {
        self.moderation.handle_member_join(&event).await;
    }

    async fn on_member_leave(&self, event: MemberLeft) {
        self.moderation.handle_member_leave(&event).await;
    }

    async fn on_message(&self, event: MessagePosted) {
        if let Some(record) = self.moderation.handle_message(&event).await {
            debug!(member = ?record.subject, warnings = record.warning_count, "Message escalated");
        }
    }

    async fn on_reaction_add(&self, event: ReactionAdded) {
        self.moderation.handle_reaction(&event).await;
    }

    async fn on_message_edit(&self, event: MessageEdited) {
        self.moderation.handle_message_edit(&event).await;
    }

    async fn on_message_delete(&self, event: MessageDeleted) {
        self.moderation.handle_message_delete(&event).await;
    }

    async fn on_ban(&self, event: BanChanged) {
        self.moderation.handle_ban(&event).await;
    }

    async fn on_unban(&self, event: BanChanged) {
        self.moderation.handle_unban(&event).await;
    }

    async fn on_voice_state_change(&self, event: VoiceStateChanged) {
        self.moderation.handle_voice_state(&event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_remote::InMemoryRemote;
    use warden_types::LogCategory;

    #[test]
    fn test_finalizer_installs_sinks() {
        let registry = Arc::new(SpaceRegistry::new(Default::default()));
        let finalizer = RegistryFinalizer::new(registry.clone());
        let mut sinks = LogSinks::new();
        sinks.insert(LogCategory::Voice, warden_types::ResourceId::new(3));

        finalizer.deployment_finalized(SpaceId::new(1), sinks);

        let context = registry.get(SpaceId::new(1)).unwrap();
        assert!(context.sink(LogCategory::Voice).is_some());
    }

    #[test]
    fn test_failed_run_drops_stale_state() {
        let registry = Arc::new(SpaceRegistry::new(Default::default()));
        let finalizer = RegistryFinalizer::new(registry.clone());
        let space = SpaceId::new(1);
        let context = registry.get_or_create(space);
        context.cache_directory(Default::default());
        context
            .security
            .lock()
            .mark_pending(UserId::new(4), chrono::Utc::now());

        finalizer.deployment_purged(space);
        assert!(context.cached_directory().is_none());
        assert_eq!(context.security.lock().pending_count(), 0);

        context.cache_directory(Default::default());
        finalizer.deployment_failed(space);
        assert!(context.cached_directory().is_none());
    }

    #[tokio::test]
    async fn test_space_lifecycle() {
        let remote = Arc::new(InMemoryRemote::new());
        let warden = Warden::new(remote, &WardenConfig::default()).unwrap();
        let space = SpaceId::new(5);

        warden.on_space_join(space).await;
        assert_eq!(warden.moderation().registry().spaces(), vec![space]);

        warden.on_space_leave(space).await;
        assert!(warden.moderation().registry().is_empty());
    }
}
