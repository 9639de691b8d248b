//! Administrative command surface
//!
//! Parsing invocations and rendering replies belongs to the transport; the
//! core exposes exactly these entry points and returns structured results.
//! Callers are expected to have checked the invoker's rights already.

use async_trait::async_trait;
use warden_moderation::AuditRecord;
use warden_reconcile::{DeploymentSummary, HealthReport};
use warden_types::{Actor, SpaceId, UserId, VerificationLevel};

use crate::error::DaemonResult;

#[async_trait]
pub trait CommandSurface: Send + Sync {
    /// Purge and rebuild the space
    async fn reconstruct(&self, space: SpaceId, initiator: UserId)
        -> DaemonResult<DeploymentSummary>;

    async fn set_lockdown(&self, space: SpaceId, enabled: bool) -> DaemonResult<VerificationLevel>;

    async fn health_check(&self, space: SpaceId) -> DaemonResult<HealthReport>;

    async fn warn_user(
        &self,
        space: SpaceId,
        subject: &Actor,
        moderator: &Actor,
        reason: &str,
    ) -> DaemonResult<AuditRecord>;
}
