//! In-memory remote service.
//!
//! Behaves like the real platform for the operations the system uses:
//! deletes of unknown ids report NotFound, channel creation validates the
//! parent, and every call is appended to an ordered call log. Faults can be
//! scripted per operation for retry and partial-failure testing.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use warden_types::{
    AutomationRuleSpec, CategorySpec, ChannelKind, ChannelSpec, MessageId, RemoteResource,
    ResourceId, ResourceKind, RoleSpec, SpaceId, UserId, VerificationLevel,
};

use crate::error::{RemoteError, RemoteResult};
use crate::service::RemoteService;

/// Operation names used in the call log and fault scripts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    CreateRole,
    DeleteRole,
    CreateCategory,
    DeleteCategory,
    CreateChannel,
    DeleteChannel,
    CreateAutomationRule,
    DeleteAutomationRule,
    CreateAlertHook,
    ExecuteAlertHook,
    SendMessage,
    AddReaction,
    DeleteMessage,
    SendDirectMessage,
    SetMemberRoles,
    TimeoutMember,
    KickMember,
    EditVerificationLevel,
    ListResources,
}

/// One recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    pub op: RemoteOp,
    /// Name or id of the call's target
    pub target: String,
}

/// A message posted into a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub id: MessageId,
    pub channel: ResourceId,
    pub content: String,
    pub reactions: Vec<String>,
}

/// A timeout applied to a member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedTimeout {
    pub space: SpaceId,
    pub user: UserId,
    pub duration: Duration,
    pub reason: String,
}

#[derive(Debug)]
struct SpaceRecord {
    resources: Vec<RemoteResource>,
    verification_level: VerificationLevel,
    member_roles: HashMap<UserId, HashSet<ResourceId>>,
    messages: Vec<PostedMessage>,
    kicked: Vec<UserId>,
    timeouts: Vec<AppliedTimeout>,
}

impl SpaceRecord {
    fn new(everyone: RemoteResource) -> Self {
        Self {
            resources: vec![everyone],
            verification_level: VerificationLevel::Low,
            member_roles: HashMap::new(),
            messages: Vec::new(),
            kicked: Vec::new(),
            timeouts: Vec::new(),
        }
    }

    fn remove(&mut self, kind: ResourceKind, id: ResourceId) -> RemoteResult<()> {
        let before = self.resources.len();
        self.resources.retain(|r| !(r.kind == kind && r.id == id));
        if self.resources.len() == before {
            Err(RemoteError::NotFound)
        } else {
            Ok(())
        }
    }

    fn has(&self, kind: ResourceKind, id: ResourceId) -> bool {
        self.resources.iter().any(|r| r.kind == kind && r.id == id)
    }
}

#[derive(Debug, Default)]
struct FaultScript {
    queued: HashMap<RemoteOp, VecDeque<RemoteError>>,
    persistent: HashMap<RemoteOp, RemoteError>,
    /// Faults keyed by operation and target name
    targeted: HashMap<(RemoteOp, String), RemoteError>,
}

/// In-memory [`RemoteService`] implementation
#[derive(Debug)]
pub struct InMemoryRemote {
    spaces: DashMap<SpaceId, SpaceRecord>,
    next_id: AtomicU64,
    calls: Mutex<Vec<RemoteCall>>,
    faults: Mutex<FaultScript>,
    latency: Mutex<Duration>,
    hook_posts: DashMap<ResourceId, Vec<String>>,
    hook_owners: DashMap<ResourceId, SpaceId>,
    direct_messages: Mutex<Vec<(UserId, String)>>,
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self {
            spaces: DashMap::new(),
            next_id: AtomicU64::new(1_000),
            calls: Mutex::new(Vec::new()),
            faults: Mutex::new(FaultScript::default()),
            latency: Mutex::new(Duration::ZERO),
            hook_posts: DashMap::new(),
            hook_owners: DashMap::new(),
            direct_messages: Mutex::new(Vec::new()),
        }
    }

    fn next_id(&self) -> ResourceId {
        ResourceId::new(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Register a space holding only its implicit everyone role
    pub fn add_space(&self, space: SpaceId) -> ResourceId {
        let id = self.next_id();
        let mut everyone = RemoteResource::new(id, ResourceKind::Role, "@everyone");
        everyone.system = true;
        self.spaces.insert(space, SpaceRecord::new(everyone));
        id
    }

    /// Insert a pre-existing resource, returning its id
    pub fn insert_resource(&self, space: SpaceId, mut resource: RemoteResource) -> ResourceId {
        let id = self.next_id();
        resource.id = id;
        if let Some(mut record) = self.spaces.get_mut(&space) {
            record.resources.push(resource);
        }
        id
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Fail the next calls of `op` with the given errors, in order
    pub fn fail_next(&self, op: RemoteOp, errors: impl IntoIterator<Item = RemoteError>) {
        self.faults
            .lock()
            .queued
            .entry(op)
            .or_default()
            .extend(errors);
    }

    /// Fail every call of `op` until cleared
    pub fn fail_always(&self, op: RemoteOp, error: RemoteError) {
        self.faults.lock().persistent.insert(op, error);
    }

    /// Fail every call of `op` against the named target
    pub fn fail_target(&self, op: RemoteOp, target: impl Into<String>, error: RemoteError) {
        self.faults
            .lock()
            .targeted
            .insert((op, target.into()), error);
    }

    pub fn clear_faults(&self) {
        *self.faults.lock() = FaultScript::default();
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().clone()
    }

    pub fn calls_of(&self, op: RemoteOp) -> Vec<RemoteCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.op == op)
            .cloned()
            .collect()
    }

    pub fn resources(&self, space: SpaceId) -> Vec<RemoteResource> {
        self.spaces
            .get(&space)
            .map(|r| r.resources.clone())
            .unwrap_or_default()
    }

    pub fn find(&self, space: SpaceId, kind: ResourceKind, name: &str) -> Option<RemoteResource> {
        self.spaces.get(&space).and_then(|r| {
            r.resources
                .iter()
                .find(|res| res.kind == kind && res.name == name)
                .cloned()
        })
    }

    pub fn member_roles(&self, space: SpaceId, user: UserId) -> HashSet<ResourceId> {
        self.spaces
            .get(&space)
            .and_then(|r| r.member_roles.get(&user).cloned())
            .unwrap_or_default()
    }

    pub fn channel_messages(&self, space: SpaceId, channel: ResourceId) -> Vec<PostedMessage> {
        self.spaces
            .get(&space)
            .map(|r| {
                r.messages
                    .iter()
                    .filter(|m| m.channel == channel)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn hook_posts(&self, hook: ResourceId) -> Vec<String> {
        self.hook_posts
            .get(&hook)
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    pub fn direct_messages(&self) -> Vec<(UserId, String)> {
        self.direct_messages.lock().clone()
    }

    pub fn timeouts(&self, space: SpaceId) -> Vec<AppliedTimeout> {
        self.spaces
            .get(&space)
            .map(|r| r.timeouts.clone())
            .unwrap_or_default()
    }

    pub fn kicked(&self, space: SpaceId) -> Vec<UserId> {
        self.spaces
            .get(&space)
            .map(|r| r.kicked.clone())
            .unwrap_or_default()
    }

    pub fn verification_level(&self, space: SpaceId) -> Option<VerificationLevel> {
        self.spaces.get(&space).map(|r| r.verification_level)
    }

    /// Record the call, apply latency, then surface any scripted fault
    async fn enter(&self, op: RemoteOp, target: impl Into<String>) -> RemoteResult<()> {
        let target = target.into();
        self.calls.lock().push(RemoteCall {
            op,
            target: target.clone(),
        });

        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut faults = self.faults.lock();
        if let Some(err) = faults.targeted.get(&(op, target)) {
            return Err(err.clone());
        }
        if let Some(err) = faults.queued.get_mut(&op).and_then(|q| q.pop_front()) {
            return Err(err);
        }
        if let Some(err) = faults.persistent.get(&op) {
            return Err(err.clone());
        }
        Ok(())
    }

    fn with_space<T>(
        &self,
        space: SpaceId,
        f: impl FnOnce(&mut SpaceRecord) -> RemoteResult<T>,
    ) -> RemoteResult<T> {
        match self.spaces.get_mut(&space) {
            Some(mut record) => f(&mut record),
            None => Err(RemoteError::NotFound),
        }
    }

    fn create(
        &self,
        space: SpaceId,
        kind: ResourceKind,
        name: &str,
        parent: Option<ResourceId>,
        position: u32,
    ) -> RemoteResult<RemoteResource> {
        let id = self.next_id();
        self.with_space(space, |record| {
            let mut resource = RemoteResource::new(id, kind, name).with_position(position);
            resource.parent_id = parent;
            record.resources.push(resource.clone());
            Ok(resource)
        })
    }
}

#[async_trait]
impl RemoteService for InMemoryRemote {
    async fn create_role(&self, space: SpaceId, spec: &RoleSpec) -> RemoteResult<RemoteResource> {
        self.enter(RemoteOp::CreateRole, &spec.name).await?;
        self.create(space, ResourceKind::Role, &spec.name, None, spec.position)
    }

    async fn delete_role(&self, space: SpaceId, role: ResourceId) -> RemoteResult<()> {
        self.enter(RemoteOp::DeleteRole, role.to_string()).await?;
        self.with_space(space, |r| r.remove(ResourceKind::Role, role))
    }

    async fn create_category(
        &self,
        space: SpaceId,
        spec: &CategorySpec,
    ) -> RemoteResult<RemoteResource> {
        self.enter(RemoteOp::CreateCategory, &spec.name).await?;
        self.create(space, ResourceKind::Category, &spec.name, None, spec.position)
    }

    async fn delete_category(&self, space: SpaceId, category: ResourceId) -> RemoteResult<()> {
        self.enter(RemoteOp::DeleteCategory, category.to_string())
            .await?;
        self.with_space(space, |r| r.remove(ResourceKind::Category, category))
    }

    async fn create_channel(
        &self,
        space: SpaceId,
        spec: &ChannelSpec,
    ) -> RemoteResult<RemoteResource> {
        self.enter(RemoteOp::CreateChannel, &spec.name).await?;
        if let Some(parent) = spec.parent_id {
            let parent_exists = self
                .spaces
                .get(&space)
                .map(|r| r.has(ResourceKind::Category, parent))
                .unwrap_or(false);
            if !parent_exists {
                return Err(RemoteError::Http {
                    status: 400,
                    message: format!("unknown parent {}", parent),
                });
            }
        }
        if spec.kind == ChannelKind::Voice && spec.topic.is_some() {
            return Err(RemoteError::Http {
                status: 400,
                message: "voice channels have no topic".into(),
            });
        }
        self.create(
            space,
            ResourceKind::Channel,
            &spec.name,
            spec.parent_id,
            0,
        )
    }

    async fn delete_channel(&self, space: SpaceId, channel: ResourceId) -> RemoteResult<()> {
        self.enter(RemoteOp::DeleteChannel, channel.to_string())
            .await?;
        self.with_space(space, |r| r.remove(ResourceKind::Channel, channel))
    }

    async fn create_automation_rule(
        &self,
        space: SpaceId,
        spec: &AutomationRuleSpec,
    ) -> RemoteResult<RemoteResource> {
        self.enter(RemoteOp::CreateAutomationRule, &spec.name)
            .await?;
        self.create(space, ResourceKind::AutomationRule, &spec.name, None, 0)
    }

    async fn delete_automation_rule(&self, space: SpaceId, rule: ResourceId) -> RemoteResult<()> {
        self.enter(RemoteOp::DeleteAutomationRule, rule.to_string())
            .await?;
        self.with_space(space, |r| r.remove(ResourceKind::AutomationRule, rule))
    }

    async fn create_alert_hook(
        &self,
        space: SpaceId,
        channel: ResourceId,
        name: &str,
    ) -> RemoteResult<RemoteResource> {
        self.enter(RemoteOp::CreateAlertHook, name).await?;
        let channel_exists = self
            .spaces
            .get(&space)
            .map(|r| r.has(ResourceKind::Channel, channel))
            .unwrap_or(false);
        if !channel_exists {
            return Err(RemoteError::NotFound);
        }
        let hook = self.create(space, ResourceKind::AlertHook, name, Some(channel), 0)?;
        self.hook_owners.insert(hook.id, space);
        Ok(hook)
    }

    async fn execute_alert_hook(&self, hook: ResourceId, content: &str) -> RemoteResult<()> {
        self.enter(RemoteOp::ExecuteAlertHook, hook.to_string())
            .await?;
        if !self.hook_owners.contains_key(&hook) {
            return Err(RemoteError::NotFound);
        }
        self.hook_posts
            .entry(hook)
            .or_default()
            .push(content.to_string());
        Ok(())
    }

    async fn send_message(
        &self,
        space: SpaceId,
        channel: ResourceId,
        content: &str,
    ) -> RemoteResult<MessageId> {
        self.enter(RemoteOp::SendMessage, channel.to_string())
            .await?;
        let id = MessageId::new(self.next_id().get());
        self.with_space(space, |r| {
            if !r.has(ResourceKind::Channel, channel) {
                return Err(RemoteError::NotFound);
            }
            r.messages.push(PostedMessage {
                id,
                channel,
                content: content.to_string(),
                reactions: Vec::new(),
            });
            Ok(id)
        })
    }

    async fn add_reaction(
        &self,
        space: SpaceId,
        channel: ResourceId,
        message: MessageId,
        emoji: &str,
    ) -> RemoteResult<()> {
        self.enter(RemoteOp::AddReaction, message.to_string())
            .await?;
        self.with_space(space, |r| {
            let posted = r
                .messages
                .iter_mut()
                .find(|m| m.id == message && m.channel == channel)
                .ok_or(RemoteError::NotFound)?;
            posted.reactions.push(emoji.to_string());
            Ok(())
        })
    }

    async fn delete_message(
        &self,
        space: SpaceId,
        channel: ResourceId,
        message: MessageId,
    ) -> RemoteResult<()> {
        self.enter(RemoteOp::DeleteMessage, message.to_string())
            .await?;
        self.with_space(space, |r| {
            r.messages
                .retain(|m| !(m.id == message && m.channel == channel));
            Ok(())
        })
    }

    async fn send_direct_message(&self, user: UserId, content: &str) -> RemoteResult<()> {
        self.enter(RemoteOp::SendDirectMessage, user.to_string())
            .await?;
        self.direct_messages
            .lock()
            .push((user, content.to_string()));
        Ok(())
    }

    async fn set_member_roles(
        &self,
        space: SpaceId,
        user: UserId,
        add: &[ResourceId],
        remove: &[ResourceId],
        _reason: &str,
    ) -> RemoteResult<()> {
        self.enter(RemoteOp::SetMemberRoles, user.to_string())
            .await?;
        self.with_space(space, |r| {
            if let Some(missing) = add.iter().find(|id| !r.has(ResourceKind::Role, **id)) {
                return Err(RemoteError::Http {
                    status: 400,
                    message: format!("unknown role {}", missing),
                });
            }
            let roles = r.member_roles.entry(user).or_default();
            for id in remove {
                roles.remove(id);
            }
            roles.extend(add.iter().copied());
            Ok(())
        })
    }

    async fn timeout_member(
        &self,
        space: SpaceId,
        user: UserId,
        duration: Duration,
        reason: &str,
    ) -> RemoteResult<()> {
        self.enter(RemoteOp::TimeoutMember, user.to_string())
            .await?;
        self.with_space(space, |r| {
            r.timeouts.push(AppliedTimeout {
                space,
                user,
                duration,
                reason: reason.to_string(),
            });
            Ok(())
        })
    }

    async fn kick_member(&self, space: SpaceId, user: UserId, _reason: &str) -> RemoteResult<()> {
        self.enter(RemoteOp::KickMember, user.to_string()).await?;
        self.with_space(space, |r| {
            r.member_roles.remove(&user);
            r.kicked.push(user);
            Ok(())
        })
    }

    async fn edit_verification_level(
        &self,
        space: SpaceId,
        level: VerificationLevel,
    ) -> RemoteResult<()> {
        self.enter(RemoteOp::EditVerificationLevel, level.to_string())
            .await?;
        self.with_space(space, |r| {
            r.verification_level = level;
            Ok(())
        })
    }

    async fn list_resources(&self, space: SpaceId) -> RemoteResult<Vec<RemoteResource>> {
        self.enter(RemoteOp::ListResources, space.to_string())
            .await?;
        self.with_space(space, |r| Ok(r.resources.clone()))
    }
}
