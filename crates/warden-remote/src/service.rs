//! The remote service seam
//!
//! Everything the system does to a space goes through this trait. The
//! production implementation speaks the platform's HTTP API; the crate ships
//! [`InMemoryRemote`](crate::memory::InMemoryRemote) for development and tests.

use async_trait::async_trait;
use std::time::Duration;
use warden_types::{
    AutomationRuleSpec, CategorySpec, ChannelSpec, MessageId, RemoteResource, ResourceId,
    RoleSpec, SpaceId, UserId, VerificationLevel,
};

use crate::error::RemoteResult;

#[async_trait]
pub trait RemoteService: Send + Sync {
    async fn create_role(&self, space: SpaceId, spec: &RoleSpec) -> RemoteResult<RemoteResource>;

    async fn delete_role(&self, space: SpaceId, role: ResourceId) -> RemoteResult<()>;

    async fn create_category(
        &self,
        space: SpaceId,
        spec: &CategorySpec,
    ) -> RemoteResult<RemoteResource>;

    async fn delete_category(&self, space: SpaceId, category: ResourceId) -> RemoteResult<()>;

    async fn create_channel(
        &self,
        space: SpaceId,
        spec: &ChannelSpec,
    ) -> RemoteResult<RemoteResource>;

    async fn delete_channel(&self, space: SpaceId, channel: ResourceId) -> RemoteResult<()>;

    async fn create_automation_rule(
        &self,
        space: SpaceId,
        spec: &AutomationRuleSpec,
    ) -> RemoteResult<RemoteResource>;

    async fn delete_automation_rule(&self, space: SpaceId, rule: ResourceId) -> RemoteResult<()>;

    /// Create an incoming hook bound to a channel
    async fn create_alert_hook(
        &self,
        space: SpaceId,
        channel: ResourceId,
        name: &str,
    ) -> RemoteResult<RemoteResource>;

    /// Post content through a previously created hook
    async fn execute_alert_hook(&self, hook: ResourceId, content: &str) -> RemoteResult<()>;

    async fn send_message(
        &self,
        space: SpaceId,
        channel: ResourceId,
        content: &str,
    ) -> RemoteResult<MessageId>;

    async fn add_reaction(
        &self,
        space: SpaceId,
        channel: ResourceId,
        message: MessageId,
        emoji: &str,
    ) -> RemoteResult<()>;

    async fn delete_message(
        &self,
        space: SpaceId,
        channel: ResourceId,
        message: MessageId,
    ) -> RemoteResult<()>;

    async fn send_direct_message(&self, user: UserId, content: &str) -> RemoteResult<()>;

    /// Grant and revoke roles in one call
    async fn set_member_roles(
        &self,
        space: SpaceId,
        user: UserId,
        add: &[ResourceId],
        remove: &[ResourceId],
        reason: &str,
    ) -> RemoteResult<()>;

    async fn timeout_member(
        &self,
        space: SpaceId,
        user: UserId,
        duration: Duration,
        reason: &str,
    ) -> RemoteResult<()>;

    async fn kick_member(&self, space: SpaceId, user: UserId, reason: &str) -> RemoteResult<()>;

    async fn edit_verification_level(
        &self,
        space: SpaceId,
        level: VerificationLevel,
    ) -> RemoteResult<()>;

    /// Every structural resource currently in the space
    async fn list_resources(&self, space: SpaceId) -> RemoteResult<Vec<RemoteResource>>;
}
