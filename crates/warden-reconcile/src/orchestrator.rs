//! Reconstruction orchestrator
//!
//! Drives a space through `Init → Purge → Roles → Infrastructure → AutoMod →
//! Finalize`. Each phase fans its remote work out through the shared
//! [`BatchExecutor`]; a phase that creates fewer roles, categories or
//! channels than the catalog requires aborts the run. Automation rules,
//! alert hooks and posted messages are best-effort.
//!
//! At most one reconstruction runs per space. A second request is rejected
//! before anything is touched.

use chrono::Utc;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, instrument, warn};
use warden_remote::{BatchExecutor, BatchItem, OperationOutcome, RemoteService};
use warden_types::content::{INVITE_PATTERNS, PROFANITY, SCAM_DOMAINS, VERIFICATION_EMOJI};
use warden_types::{
    AutomationRuleSpec, CategorySpec, ChannelKind, ChannelSpec, LogCategory, LogSinks,
    RemoteResource, ResourceId, ResourceKind, RuleAction, RuleTrigger, SpaceId, UserId,
};

use crate::catalog::{AutomationRuleKind, AutomationRuleTemplate, Catalog};
use crate::config::ReconcileConfig;
use crate::diff::purge_targets;
use crate::error::{ReconcileError, ReconcileResult};
use crate::health::{HealthReport, SecurityPosture};
use crate::overwrites::{category_overwrites, read_only_overwrites};
use crate::progress::{DeploymentSummary, PhaseStatus, ProgressEvent};
use crate::state::{DeploymentPhase, DeploymentState};

/// Receives reconstruction lifecycle notifications.
///
/// The moderation side implements this to drop ids the purge invalidated,
/// reset its per-space state and install the freshly provisioned log sinks.
pub trait DeploymentHook: Send + Sync {
    /// The purge has run; role and channel ids resolved before it are stale
    fn deployment_purged(&self, _space: SpaceId) {}

    fn deployment_finalized(&self, space: SpaceId, sinks: LogSinks);

    /// The run ended without reaching finalize
    fn deployment_failed(&self, _space: SpaceId) {}
}

/// Hook that ignores every notification
pub struct NoopHook;

impl DeploymentHook for NoopHook {
    fn deployment_finalized(&self, _space: SpaceId, _sinks: LogSinks) {}
}

/// Ids resolved while a run progresses
#[derive(Debug, Default)]
struct RunContext {
    progress_channel: Option<ResourceId>,
    roles: HashMap<String, ResourceId>,
    categories: HashMap<String, ResourceId>,
    channels: HashMap<String, ResourceId>,
    sinks: LogSinks,
}

#[derive(Debug, Clone)]
struct HookRequest {
    category: LogCategory,
    channel: ResourceId,
}

impl BatchItem for HookRequest {
    fn describe(&self) -> String {
        self.category.channel_name().to_string()
    }
}

#[derive(Debug, Clone)]
struct MessageRequest {
    channel_name: String,
    channel: ResourceId,
    content: String,
}

impl BatchItem for MessageRequest {
    fn describe(&self) -> String {
        self.channel_name.clone()
    }
}

/// Rebuilds spaces to match a [`Catalog`]
pub struct Reconciler {
    remote: Arc<dyn RemoteService>,
    executor: BatchExecutor,
    catalog: Arc<Catalog>,
    config: ReconcileConfig,
    hook: Arc<dyn DeploymentHook>,
    /// Per-space reconstruction locks
    locks: DashMap<SpaceId, Arc<Mutex<()>>>,
    /// Active runs
    deployments: DashMap<SpaceId, DeploymentState>,
    event_tx: broadcast::Sender<ProgressEvent>,
}

impl Reconciler {
    pub fn new(
        remote: Arc<dyn RemoteService>,
        executor: BatchExecutor,
        catalog: Arc<Catalog>,
        config: ReconcileConfig,
        hook: Arc<dyn DeploymentHook>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        Self {
            remote,
            executor,
            catalog,
            config,
            hook,
            locks: DashMap::new(),
            deployments: DashMap::new(),
            event_tx,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Subscribe to progress events from every run
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.event_tx.subscribe()
    }

    /// Snapshot of the active run for a space, if any
    pub fn deployment_state(&self, space: SpaceId) -> Option<DeploymentState> {
        self.deployments.get(&space).map(|s| s.clone())
    }

    pub fn is_running(&self, space: SpaceId) -> bool {
        self.deployments.contains_key(&space)
    }

    /// Drop bookkeeping for a space the system has left. A running
    /// reconstruction keeps its lock.
    pub fn forget(&self, space: SpaceId) {
        self.locks
            .remove_if(&space, |_, lock| lock.try_lock().is_ok());
    }

    /// Purge the space and rebuild it from the catalog
    #[instrument(skip(self), fields(space = %space, initiator = %initiator))]
    pub async fn reconstruct(
        &self,
        space: SpaceId,
        initiator: UserId,
    ) -> ReconcileResult<DeploymentSummary> {
        // 1. Per-space entry guard; rejection mutates nothing
        let lock = self
            .locks
            .entry(space)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        let _guard = lock
            .try_lock_owned()
            .map_err(|_| ReconcileError::AlreadyRunning(space))?;

        // 2. Register the run
        let started = DeploymentState::new(space, initiator, Utc::now());
        self.deployments.insert(space, started.clone());
        info!(deployment_id = %started.id, "Reconstruction started");

        // 3. Phase pipeline
        let mut ctx = RunContext::default();
        let outcome = self.run_phases(space, &mut ctx).await;

        // 4. Report and clean up on every exit path
        let result = match outcome {
            Ok(()) => Ok(self.finalize(space, &ctx, &started).await),
            Err(err) => {
                self.record_failure(space, &ctx, &err).await;
                Err(err)
            }
        };

        self.remove_progress_channel(space, &ctx).await;
        self.deployments.remove(&space);
        result
    }

    /// Compare the live space against the catalog
    pub async fn health_check(
        &self,
        space: SpaceId,
        posture: SecurityPosture,
    ) -> ReconcileResult<HealthReport> {
        let observed = self.inventory(space).await?;
        Ok(HealthReport::assess(
            space,
            &self.catalog,
            &observed,
            posture,
            Utc::now(),
        ))
    }

    async fn run_phases(&self, space: SpaceId, ctx: &mut RunContext) -> ReconcileResult<()> {
        self.init(space, ctx).await;

        self.enter(space, ctx, DeploymentPhase::Purge).await?;
        self.purge(space, ctx).await?;
        self.hook.deployment_purged(space);

        self.enter(space, ctx, DeploymentPhase::Roles).await?;
        self.create_roles(space, ctx).await?;

        self.enter(space, ctx, DeploymentPhase::Infrastructure).await?;
        self.create_infrastructure(space, ctx).await?;

        self.enter(space, ctx, DeploymentPhase::AutoMod).await?;
        self.create_automation_rules(space, ctx).await;

        self.enter(space, ctx, DeploymentPhase::Finalize).await?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Phases
    // ---------------------------------------------------------------------

    async fn init(&self, space: SpaceId, ctx: &mut RunContext) {
        self.emit(space, PhaseStatus::Started, "Reconstruction started");

        let spec = ChannelSpec {
            name: self.config.progress_channel.clone(),
            kind: ChannelKind::Text,
            parent_id: None,
            topic: Some("Reconstruction progress".to_string()),
            slowmode_secs: 0,
            overwrites: Vec::new(),
        };
        let outcome = self
            .executor
            .resilience()
            .run("create progress channel", || {
                self.remote.create_channel(space, &spec)
            })
            .await;

        match outcome {
            OperationOutcome::Completed(channel) => {
                ctx.progress_channel = Some(channel.id);
                self.update(space, |s| s.progress_channel = Some(channel.id));
            }
            _ => warn!("Progress channel unavailable, continuing without it"),
        }
    }

    async fn purge(&self, space: SpaceId, ctx: &mut RunContext) -> ReconcileResult<()> {
        let inventory = self.inventory(space).await?;
        let keep: HashSet<ResourceId> = ctx.progress_channel.into_iter().collect();

        let rules = purge_targets(&inventory, ResourceKind::AutomationRule, &keep);
        let report = self
            .executor
            .run("delete rule", rules, |r| {
                self.remote.delete_automation_rule(space, r.id)
            })
            .await;
        let rules_deleted = report.success_count();

        let channels = purge_targets(&inventory, ResourceKind::Channel, &keep);
        let report = self
            .executor
            .run("delete channel", channels, |c| {
                self.remote.delete_channel(space, c.id)
            })
            .await;
        let channels_deleted = report.success_count();

        let categories = purge_targets(&inventory, ResourceKind::Category, &keep);
        let report = self
            .executor
            .run("delete category", categories, |c| {
                self.remote.delete_category(space, c.id)
            })
            .await;
        let categories_deleted = report.success_count();

        let mut roles = purge_targets(&inventory, ResourceKind::Role, &keep);
        roles.sort_by(|a, b| b.position.cmp(&a.position));
        let report = self
            .executor
            .run("delete role", roles, |r| self.remote.delete_role(space, r.id))
            .await;
        let roles_deleted = report.success_count();

        self.update(space, |s| {
            s.counters.rules_deleted = rules_deleted;
            s.counters.channels_deleted = channels_deleted;
            s.counters.categories_deleted = categories_deleted;
            s.counters.roles_deleted = roles_deleted;
        });

        self.complete(
            space,
            ctx,
            format!(
                "Purged {} rules, {} channels, {} categories, {} roles",
                rules_deleted, channels_deleted, categories_deleted, roles_deleted
            ),
        )
        .await;
        Ok(())
    }

    async fn create_roles(&self, space: SpaceId, ctx: &mut RunContext) -> ReconcileResult<()> {
        let mut templates = self.catalog.roles.clone();
        templates.sort_by_key(|t| t.position);
        let specs: Vec<_> = templates.iter().map(|t| t.to_spec()).collect();
        let expected = specs.len();

        let report = self
            .executor
            .run("create role", specs, |spec| async move {
                self.remote.create_role(space, &spec).await
            })
            .await;

        for (spec, created) in report.completed {
            if let Some(role) = created {
                ctx.roles.insert(spec.name, role.id);
            }
        }

        let created = ctx.roles.len();
        self.update(space, |s| s.counters.roles_created = created);
        shortfall(DeploymentPhase::Roles, ResourceKind::Role, created, expected)?;

        self.complete(space, ctx, format!("Created {}/{} roles", created, expected))
            .await;
        Ok(())
    }

    async fn create_infrastructure(
        &self,
        space: SpaceId,
        ctx: &mut RunContext,
    ) -> ReconcileResult<()> {
        // 1. Categories with their role overwrites
        let specs: Vec<_> = self
            .catalog
            .categories
            .iter()
            .map(|c| CategorySpec {
                name: c.name.clone(),
                position: c.position,
                overwrites: category_overwrites(&ctx.roles, &c.allowed_roles),
            })
            .collect();
        let expected = specs.len();

        let report = self
            .executor
            .run("create category", specs, |spec| async move {
                self.remote.create_category(space, &spec).await
            })
            .await;
        for (spec, created) in report.completed {
            if let Some(category) = created {
                ctx.categories.insert(spec.name, category.id);
            }
        }

        let created = ctx.categories.len();
        self.update(space, |s| s.counters.categories_created = created);
        shortfall(
            DeploymentPhase::Infrastructure,
            ResourceKind::Category,
            created,
            expected,
        )?;

        // 2. Channels bound to their resolved parents
        let expected = self.catalog.channels.len();
        let mut specs = Vec::with_capacity(expected);
        for template in &self.catalog.channels {
            let Some(parent) = ctx.categories.get(&template.category) else {
                warn!(channel = %template.name, category = %template.category, "Parent category unresolved");
                continue;
            };
            let overwrites = if template.read_only && template.kind == ChannelKind::Text {
                read_only_overwrites()
            } else {
                Vec::new()
            };
            specs.push(ChannelSpec {
                name: template.name.clone(),
                kind: template.kind,
                parent_id: Some(*parent),
                topic: match template.kind {
                    ChannelKind::Text => template.topic.clone(),
                    ChannelKind::Voice => None,
                },
                slowmode_secs: template.slowmode_secs,
                overwrites,
            });
        }

        let report = self
            .executor
            .run("create channel", specs, |spec| async move {
                self.remote.create_channel(space, &spec).await
            })
            .await;
        for (spec, created) in report.completed {
            if let Some(channel) = created {
                ctx.channels.insert(spec.name, channel.id);
            }
        }

        let created = ctx.channels.len();
        self.update(space, |s| s.counters.channels_created = created);
        shortfall(
            DeploymentPhase::Infrastructure,
            ResourceKind::Channel,
            created,
            expected,
        )?;

        // 3. Best-effort follow-ups
        self.provision_log_hooks(space, ctx).await;
        self.post_initial_messages(space, ctx).await;

        self.complete(
            space,
            ctx,
            format!(
                "Created {} categories, {} channels, {} log hooks",
                ctx.categories.len(),
                ctx.channels.len(),
                ctx.sinks.len()
            ),
        )
        .await;
        Ok(())
    }

    async fn provision_log_hooks(&self, space: SpaceId, ctx: &mut RunContext) {
        let requests: Vec<_> = self
            .catalog
            .channels
            .iter()
            .filter_map(|t| {
                let category = t.log_category()?;
                let channel = *ctx.channels.get(&t.name)?;
                Some(HookRequest { category, channel })
            })
            .collect();

        let report = self
            .executor
            .run("create hook", requests, |req| async move {
                let name = format!("warden {}", req.category);
                self.remote.create_alert_hook(space, req.channel, &name).await
            })
            .await;

        for (req, hook) in report.completed {
            if let Some(hook) = hook {
                ctx.sinks.insert(req.category, hook.id);
            }
        }
        for (req, failure) in &report.failed {
            warn!(category = %req.category, error = %failure, "Log hook not provisioned");
        }

        let hooks = ctx.sinks.len();
        self.update(space, |s| s.counters.hooks_created = hooks);
    }

    async fn post_initial_messages(&self, space: SpaceId, ctx: &RunContext) {
        let requests: Vec<_> = self
            .catalog
            .channels
            .iter()
            .filter_map(|t| {
                let content = t.initial_message.clone()?;
                let channel = *ctx.channels.get(&t.name)?;
                Some(MessageRequest {
                    channel_name: t.name.clone(),
                    channel,
                    content,
                })
            })
            .collect();

        let report = self
            .executor
            .run("post message", requests, |req| async move {
                self.remote
                    .send_message(space, req.channel, &req.content)
                    .await
            })
            .await;

        let posted = report
            .completed
            .iter()
            .filter(|(_, id)| id.is_some())
            .count();
        self.update(space, |s| s.counters.messages_posted = posted);

        let verification = report
            .completed
            .iter()
            .find(|(req, _)| req.channel_name == self.catalog.verification_channel)
            .and_then(|(req, id)| id.map(|id| (req.channel, id)));

        if let Some((channel, message)) = verification {
            let outcome = self
                .executor
                .resilience()
                .run("add verification reaction", || {
                    self.remote
                        .add_reaction(space, channel, message, VERIFICATION_EMOJI)
                })
                .await;
            if let OperationOutcome::Failed(failure) = outcome {
                warn!(error = %failure, "Verification reaction not added");
            }
        }
    }

    async fn create_automation_rules(&self, space: SpaceId, ctx: &mut RunContext) {
        let specs: Vec<_> = self
            .catalog
            .automation_rules
            .iter()
            .filter_map(|t| self.rule_spec(t, ctx))
            .collect();

        let report = self
            .executor
            .run("create rule", specs, |spec| async move {
                self.remote.create_automation_rule(space, &spec).await
            })
            .await;

        for (spec, failure) in &report.failed {
            warn!(rule = %spec.name, error = %failure, "Automation rule skipped");
        }

        let created = report
            .completed
            .iter()
            .filter(|(_, rule)| rule.is_some())
            .count();
        self.update(space, |s| s.counters.rules_created = created);

        self.complete(space, ctx, format!("Created {} automation rules", created))
            .await;
    }

    /// Translate a template into a remote request, or `None` when disabled
    fn rule_spec(
        &self,
        template: &AutomationRuleTemplate,
        ctx: &RunContext,
    ) -> Option<AutomationRuleSpec> {
        let automod = &self.config.automod;

        let (enabled, trigger, timeout) = match template.kind {
            AutomationRuleKind::InviteLinks => (
                automod.block_invite_links,
                RuleTrigger::Keyword {
                    keywords: Vec::new(),
                    patterns: INVITE_PATTERNS.iter().map(|p| p.to_string()).collect(),
                },
                None,
            ),
            AutomationRuleKind::ScamLinks => (
                automod.block_scam_links,
                RuleTrigger::Keyword {
                    keywords: Vec::new(),
                    patterns: SCAM_DOMAINS
                        .iter()
                        .take(automod.max_patterns_per_rule)
                        .map(|d| regex::escape(d))
                        .collect(),
                },
                Some(automod.scam_timeout()),
            ),
            AutomationRuleKind::MassMentions => (
                automod.block_mass_mentions,
                RuleTrigger::MentionSpam {
                    mention_limit: automod.mention_limit,
                },
                Some(automod.mention_timeout()),
            ),
            AutomationRuleKind::Profanity => (
                automod.filter_profanity,
                RuleTrigger::Keyword {
                    keywords: PROFANITY.iter().map(|w| w.to_string()).collect(),
                    patterns: Vec::new(),
                },
                None,
            ),
        };

        if !enabled {
            return None;
        }

        let mut actions = vec![RuleAction::BlockMessage];
        if let Some(channel) = template
            .alert_channel
            .as_ref()
            .and_then(|name| ctx.channels.get(name))
        {
            actions.push(RuleAction::SendAlert { channel: *channel });
        }
        if let (true, Some(duration)) = (template.applies_timeout, timeout) {
            actions.push(RuleAction::Timeout { duration });
        }

        Some(AutomationRuleSpec {
            name: template.name.clone(),
            trigger,
            actions,
            exempt_roles: template
                .exempt_roles
                .iter()
                .filter_map(|name| ctx.roles.get(name).copied())
                .collect(),
            enabled: true,
        })
    }

    async fn finalize(
        &self,
        space: SpaceId,
        ctx: &RunContext,
        started: &DeploymentState,
    ) -> DeploymentSummary {
        self.hook.deployment_finalized(space, ctx.sinks.clone());

        let counters = self
            .deployment_state(space)
            .map(|s| s.counters)
            .unwrap_or_else(|| started.counters.clone());
        let summary = DeploymentSummary {
            deployment_id: started.id,
            space,
            initiator: started.initiator,
            started_at: started.started_at,
            finished_at: Utc::now(),
            counters,
        };

        self.emit(space, PhaseStatus::Completed, summary.render());
        info!(
            roles = summary.counters.roles_created,
            categories = summary.counters.categories_created,
            channels = summary.counters.channels_created,
            rules = summary.counters.rules_created,
            duration_secs = summary.duration_secs(),
            "Reconstruction complete"
        );
        summary
    }

    async fn record_failure(&self, space: SpaceId, ctx: &RunContext, err: &ReconcileError) {
        let excerpt = err.excerpt(self.config.error_excerpt_chars);
        self.update(space, |s| s.fail(excerpt.clone()));

        let phase = self
            .deployment_state(space)
            .and_then(|s| s.failed_phase)
            .unwrap_or(DeploymentPhase::Init);
        let message = format!("Reconstruction failed during {}: {}", phase, excerpt);

        self.publish(space, phase, PhaseStatus::Failed, message.clone());
        self.hook.deployment_failed(space);
        self.post_progress(space, ctx, &message).await;
        warn!(phase = %phase, error = %err, "Reconstruction failed");
    }

    async fn remove_progress_channel(&self, space: SpaceId, ctx: &RunContext) {
        let Some(channel) = ctx.progress_channel else {
            return;
        };
        let outcome = self
            .executor
            .resilience()
            .run("delete progress channel", || {
                self.remote.delete_channel(space, channel)
            })
            .await;
        if let OperationOutcome::Failed(failure) = outcome {
            warn!(error = %failure, "Progress channel left behind");
        }
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    async fn inventory(&self, space: SpaceId) -> ReconcileResult<Vec<RemoteResource>> {
        self.executor
            .resilience()
            .run("list resources", || self.remote.list_resources(space))
            .await
            .into_result()
            .map(Option::unwrap_or_default)
            .map_err(ReconcileError::Inventory)
    }

    async fn enter(
        &self,
        space: SpaceId,
        ctx: &RunContext,
        phase: DeploymentPhase,
    ) -> ReconcileResult<()> {
        self.update(space, |s| s.advance(phase))
            .unwrap_or(Ok(()))?;
        let message = format!("Entering {} phase", phase);
        self.emit(space, PhaseStatus::Started, message.clone());
        self.post_progress(space, ctx, &message).await;
        Ok(())
    }

    async fn complete(&self, space: SpaceId, ctx: &RunContext, message: String) {
        self.post_progress(space, ctx, &message).await;
        self.emit(space, PhaseStatus::Completed, message);
    }

    /// Mirror progress into the progress channel when one exists
    async fn post_progress(&self, space: SpaceId, ctx: &RunContext, message: &str) {
        let Some(channel) = ctx.progress_channel else {
            return;
        };
        let outcome = self
            .executor
            .resilience()
            .run("post progress", || {
                self.remote.send_message(space, channel, message)
            })
            .await;
        if let OperationOutcome::Failed(failure) = outcome {
            warn!(error = %failure, "Progress message not posted");
        }
    }

    fn update<R>(&self, space: SpaceId, f: impl FnOnce(&mut DeploymentState) -> R) -> Option<R> {
        self.deployments.get_mut(&space).map(|mut s| f(&mut s))
    }

    /// Emit an event for the current phase
    fn emit(&self, space: SpaceId, status: PhaseStatus, message: impl Into<String>) {
        let phase = self
            .deployment_state(space)
            .map(|s| s.phase)
            .unwrap_or(DeploymentPhase::Init);
        self.publish(space, phase, status, message.into());
    }

    fn publish(&self, space: SpaceId, phase: DeploymentPhase, status: PhaseStatus, message: String) {
        let Some(state) = self.deployment_state(space) else {
            return;
        };
        let _ = self.event_tx.send(ProgressEvent {
            deployment_id: state.id,
            space,
            phase,
            status,
            message,
            counters: state.counters,
            at: Utc::now(),
        });
    }
}

fn shortfall(
    phase: DeploymentPhase,
    kind: ResourceKind,
    created: usize,
    expected: usize,
) -> ReconcileResult<()> {
    if created < expected {
        return Err(ReconcileError::PhaseShortfall {
            phase,
            kind,
            created,
            expected,
        });
    }
    Ok(())
}
