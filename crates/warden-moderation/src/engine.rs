//! Moderation engine
//!
//! Turns inbound space events into classifier runs, escalation steps,
//! remediation calls and audit log posts. Every remote call goes through the
//! resilient executor; log posts, welcome messages and direct notices are
//! best-effort.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};
use warden_remote::{
    OperationOutcome, RemoteError, RemoteService, ResilientExecutor, RetryConfig,
};
use warden_types::content::VERIFICATION_EMOJI;
use warden_types::{
    Actor, BanChanged, ChannelRef, LogCategory, MemberJoined, MemberLeft, MessageDeleted,
    MessageEdited, MessageId, MessagePosted, ReactionAdded, SpaceId, UserId, VerificationLevel,
    VoiceStateChanged, VoiceTransition,
};

use crate::config::ModerationConfig;
use crate::error::{ModerationError, ModerationResult};
use crate::escalation::{AuditRecord, EscalationPolicy, RemediationAction};
use crate::inspector::{ContentInspector, Violation, ViolationKind};
use crate::registry::{Directory, SpaceContext, SpaceRegistry};

const DIRECT_EXCERPT_CHARS: usize = 100;
const LOG_EXCERPT_CHARS: usize = 1000;

fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Role names to grant and revoke in one call
struct RoleChange<'a> {
    operation: &'a str,
    grant: &'a [&'a str],
    revoke: &'a [&'a str],
    reason: &'a str,
}

/// The remote rejected a role id it does not know
fn is_unknown_role(err: &RemoteError) -> bool {
    matches!(err, RemoteError::Http { status: 400, .. })
}

/// A violation about to be escalated
struct Incident<'a> {
    subject: &'a Actor,
    channel: Option<&'a ChannelRef>,
    message: Option<(MessageId, &'a str)>,
    violations: Vec<Violation>,
    moderator: Option<&'a Actor>,
    at: DateTime<Utc>,
}

pub struct ModerationEngine {
    remote: Arc<dyn RemoteService>,
    resilience: ResilientExecutor,
    registry: Arc<SpaceRegistry>,
    inspector: ContentInspector,
    policy: EscalationPolicy,
    config: ModerationConfig,
    audit_tx: broadcast::Sender<AuditRecord>,
}

impl ModerationEngine {
    pub fn new(
        remote: Arc<dyn RemoteService>,
        registry: Arc<SpaceRegistry>,
        config: ModerationConfig,
        retry: RetryConfig,
    ) -> ModerationResult<Self> {
        let inspector = ContentInspector::new(&config)?;
        let policy = EscalationPolicy::new(config.max_warnings, config.warning_timeout());
        let (audit_tx, _) = broadcast::channel(1024);
        Ok(Self {
            remote,
            resilience: ResilientExecutor::new(retry),
            registry,
            inspector,
            policy,
            config,
            audit_tx,
        })
    }

    pub fn registry(&self) -> &Arc<SpaceRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ModerationConfig {
        &self.config
    }

    pub fn inspector(&self) -> &ContentInspector {
        &self.inspector
    }

    /// Subscribe to escalation audit records
    pub fn subscribe_audit(&self) -> broadcast::Receiver<AuditRecord> {
        self.audit_tx.subscribe()
    }

    pub(crate) fn remote(&self) -> &Arc<dyn RemoteService> {
        &self.remote
    }

    pub(crate) fn resilience(&self) -> &ResilientExecutor {
        &self.resilience
    }

    pub(crate) fn publish_audit(&self, record: AuditRecord) {
        let _ = self.audit_tx.send(record);
    }

    pub fn is_trusted(&self, actor: &Actor) -> bool {
        actor.holds_any(&self.config.trusted_roles)
    }

    pub fn lockdown_active(&self, space: SpaceId) -> bool {
        self.registry
            .get(space)
            .map(|c| c.security.lock().lockdown_active())
            .unwrap_or(false)
    }

    pub fn pending_verifications(&self, space: SpaceId) -> usize {
        self.registry
            .get(space)
            .map(|c| c.security.lock().pending_count())
            .unwrap_or(0)
    }

    // ---------------------------------------------------------------------
    // Members
    // ---------------------------------------------------------------------

    #[instrument(skip(self, event), fields(space = %event.space, member = %event.member.id))]
    pub async fn handle_member_join(&self, event: &MemberJoined) {
        let space = event.space;
        let user = event.member.id;
        let context = self.registry.get_or_create(space);

        // 1. Raid tracking and join heuristics
        let young = event.at - event.account_created_at < self.config.min_account_age();
        let suspicious = young || !event.has_avatar;
        {
            let mut security = context.security.lock();
            security.record_join(event.at);
            if suspicious {
                security.flag_suspicious(user);
            }
        }

        // 2. Gate behind verification; pending only once the role is held
        let gated = self
            .change_roles(
                space,
                &context,
                user,
                RoleChange {
                    operation: "grant unverified role",
                    grant: &[self.config.unverified_role.as_str()],
                    revoke: &[],
                    reason: "New member - pending verification",
                },
            )
            .await;
        if gated {
            context.security.lock().mark_pending(user, event.at);
        }

        // 3. Welcome
        let welcome = self
            .directory(space, &context)
            .await
            .and_then(|d| d.channel(&self.config.welcome_channel));
        if let Some(channel) = welcome {
            let text = format!(
                "Welcome {}! You are member #{}. Head to #{} to verify.",
                event.member.display_name, event.member_count, self.config.verify_channel
            );
            let outcome = self
                .resilience
                .run("send welcome", || {
                    self.remote.send_message(space, channel, &text)
                })
                .await;
            if let OperationOutcome::Failed(failure) = outcome {
                debug!(error = %failure, "Welcome message not sent");
            }
        }

        // 4. Member log
        let mut entry = format!(
            "**Member joined** {} ({})\nMember count: {}",
            event.member.display_name, user, event.member_count
        );
        if young {
            let days = (event.at - event.account_created_at).num_days();
            entry.push_str(&format!("\n[WARNING] Suspicious: account age {} days", days));
        }
        if !event.has_avatar {
            entry.push_str("\n[WARNING] No avatar");
        }
        self.post_log(space, &context, LogCategory::Member, &entry)
            .await;

        info!(suspicious, "Member joined");
    }

    pub async fn handle_member_leave(&self, event: &MemberLeft) {
        let Some(context) = self.registry.get(event.space) else {
            return;
        };
        context.security.lock().forget_member(event.member.id);

        let entry = format!(
            "**Member left** {} ({})",
            event.member.display_name, event.member.id
        );
        self.post_log(event.space, &context, LogCategory::Member, &entry)
            .await;
    }

    /// Complete verification on the verification reaction. Returns true
    /// when the member was verified.
    #[instrument(skip(self, event), fields(space = %event.space, member = %event.member.id))]
    pub async fn handle_reaction(&self, event: &ReactionAdded) -> bool {
        if event.member.is_bot
            || event.channel.name != self.config.verify_channel
            || event.emoji != VERIFICATION_EMOJI
        {
            return false;
        }
        let Some(context) = self.registry.get(event.space) else {
            return false;
        };

        let space = event.space;
        let user = event.member.id;
        let swapped = self
            .change_roles(
                space,
                &context,
                user,
                RoleChange {
                    operation: "complete verification",
                    grant: &[self.config.member_role.as_str()],
                    revoke: &[self.config.unverified_role.as_str()],
                    reason: "Verification completed",
                },
            )
            .await;
        if !swapped {
            warn!("Verification role swap failed");
            return false;
        }

        context.security.lock().forget_member(user);

        let entry = format!(
            "**Member verified** {} ({})\nFull access granted",
            event.member.display_name, user
        );
        self.post_log(space, &context, LogCategory::Member, &entry)
            .await;
        info!("Member verified");
        true
    }

    // ---------------------------------------------------------------------
    // Messages
    // ---------------------------------------------------------------------

    /// Inspect a posted message and escalate when anything fires
    pub async fn handle_message(&self, event: &MessagePosted) -> Option<AuditRecord> {
        if event.author.is_bot {
            return None;
        }
        let context = self.registry.get_or_create(event.space);
        if self.is_trusted(&event.author) {
            return None;
        }

        let mut violations = Vec::new();
        let burst = context.security.lock().record_message(
            event.author.id,
            event.at,
            self.config.spam_threshold,
            self.config.spam_window(),
        );
        if burst {
            violations.push(Violation::spam());
        }
        violations.extend(self.inspector.inspect(&event.content, event.mention_count));

        if violations.is_empty() {
            return None;
        }

        let incident = Incident {
            subject: &event.author,
            channel: Some(&event.channel),
            message: Some((event.message_id, &event.content)),
            violations,
            moderator: None,
            at: event.at,
        };
        Some(self.escalate(event.space, &context, incident).await)
    }

    /// Operator-issued warning; follows the same escalation path
    #[instrument(skip(self, subject, moderator), fields(space = %space, subject = %subject.id))]
    pub async fn warn_user(
        &self,
        space: SpaceId,
        subject: &Actor,
        moderator: &Actor,
        reason: &str,
    ) -> ModerationResult<AuditRecord> {
        if subject.is_bot {
            return Err(ModerationError::CannotWarnBot(subject.id));
        }
        let context = self.registry.get_or_create(space);
        let incident = Incident {
            subject,
            channel: None,
            message: None,
            violations: vec![Violation::new(ViolationKind::Manual, reason)],
            moderator: Some(moderator),
            at: Utc::now(),
        };
        Ok(self.escalate(space, &context, incident).await)
    }

    async fn escalate(
        &self,
        space: SpaceId,
        context: &SpaceContext,
        incident: Incident<'_>,
    ) -> AuditRecord {
        let subject = incident.subject;
        let labels: Vec<String> = incident.violations.iter().map(|v| v.label.clone()).collect();
        let reasons = labels.join(", ");

        // 1. Remove the offending message; already gone is fine
        if let (Some(channel), Some((message, _))) = (incident.channel, incident.message) {
            let outcome = self
                .resilience
                .run("delete violating message", || {
                    self.remote.delete_message(space, channel.id, message)
                })
                .await;
            if let OperationOutcome::Failed(failure) = outcome {
                warn!(error = %failure, "Violating message not removed");
            }
        }

        // 2. Count it; increment, limit check and reset are one critical section
        let step = self.policy.register(&mut context.security.lock(), subject.id);

        // 3. Tell the member
        let notice = match (incident.moderator, incident.message) {
            (Some(moderator), _) => format!(
                "**[WARNING {}/{}]** You have received a warning\nReason: {}\nModerator: {}",
                step.warning_count, self.policy.max_warnings, reasons, moderator.display_name
            ),
            (None, Some((_, content))) => format!(
                "**[WARNING {}/{}]** Your message was removed\nReason: {}\nMessage: {}...",
                step.warning_count,
                self.policy.max_warnings,
                reasons,
                excerpt(content, DIRECT_EXCERPT_CHARS)
            ),
            (None, None) => format!(
                "**[WARNING {}/{}]** Reason: {}",
                step.warning_count, self.policy.max_warnings, reasons
            ),
        };
        let outcome = self
            .resilience
            .run("send warning notice", || {
                self.remote.send_direct_message(subject.id, &notice)
            })
            .await;
        if let OperationOutcome::Failed(failure) = outcome {
            debug!(error = %failure, "Warning notice not delivered");
        }

        // 4. Punish at the limit
        let mut action = None;
        if let Some(duration) = step.timeout {
            let reason = format!("Exceeded warning limit: {}", reasons);
            let outcome = self
                .resilience
                .run("timeout member", || {
                    self.remote
                        .timeout_member(space, subject.id, duration, &reason)
                })
                .await;
            match outcome {
                OperationOutcome::Completed(()) => {
                    action = Some(RemediationAction::Timeout { duration });
                    info!(member = %subject.id, duration_secs = duration.as_secs(), "Member timed out");
                }
                other => {
                    warn!(member = %subject.id, outcome = ?other.into_result().err(), "Timeout not applied")
                }
            }
        }

        // 5. Audit
        let record = AuditRecord {
            space,
            subject: Some(subject.id),
            subject_name: Some(subject.display_name.clone()),
            channel: incident.channel.cloned(),
            kinds: incident.violations.iter().map(|v| v.kind).collect(),
            labels,
            warning_count: step.warning_count,
            max_warnings: self.policy.max_warnings,
            action,
            at: incident.at,
        };
        let mut entry = record.render();
        if let Some((_, content)) = incident.message {
            entry.push_str(&format!("\nContent: {}", excerpt(content, 500)));
        }
        self.post_log(space, context, LogCategory::Moderation, &entry)
            .await;
        self.publish_audit(record.clone());

        info!(
            space = %space,
            member = %subject.id,
            warnings = record.warning_count,
            violations = %reasons,
            "Violation handled"
        );
        record
    }

    // ---------------------------------------------------------------------
    // Audit trail
    // ---------------------------------------------------------------------

    pub async fn handle_message_edit(&self, event: &MessageEdited) {
        if event.author.is_bot || event.before == event.after {
            return;
        }
        let Some(context) = self.registry.get(event.space) else {
            return;
        };
        let entry = format!(
            "**Message edited** by {} ({}) in #{}\nBefore: {}\nAfter: {}",
            event.author.display_name,
            event.author.id,
            event.channel.name,
            excerpt(&event.before, LOG_EXCERPT_CHARS),
            excerpt(&event.after, LOG_EXCERPT_CHARS)
        );
        self.post_log(event.space, &context, LogCategory::Message, &entry)
            .await;
    }

    pub async fn handle_message_delete(&self, event: &MessageDeleted) {
        if event.author.is_bot {
            return;
        }
        let Some(context) = self.registry.get(event.space) else {
            return;
        };
        let content = if event.content.is_empty() {
            "[No text content]".to_string()
        } else {
            excerpt(&event.content, LOG_EXCERPT_CHARS)
        };
        let mut entry = format!(
            "**Message deleted** by {} ({}) in #{}\nContent: {}",
            event.author.display_name, event.author.id, event.channel.name, content
        );
        if event.attachment_count > 0 {
            entry.push_str(&format!("\nAttachments: {}", event.attachment_count));
        }
        self.post_log(event.space, &context, LogCategory::Message, &entry)
            .await;
    }

    pub async fn handle_ban(&self, event: &BanChanged) {
        let Some(context) = self.registry.get(event.space) else {
            return;
        };
        let entry = format!(
            "**Member banned** {} ({})\nReason: {}",
            event.user.display_name,
            event.user.id,
            event.reason.as_deref().unwrap_or("No reason provided")
        );
        self.post_log(event.space, &context, LogCategory::Moderation, &entry)
            .await;
        info!(space = %event.space, user = %event.user.id, "Member banned");
    }

    pub async fn handle_unban(&self, event: &BanChanged) {
        let Some(context) = self.registry.get(event.space) else {
            return;
        };
        let entry = format!(
            "**Member unbanned** {} ({})",
            event.user.display_name, event.user.id
        );
        self.post_log(event.space, &context, LogCategory::Moderation, &entry)
            .await;
    }

    pub async fn handle_voice_state(&self, event: &VoiceStateChanged) {
        if event.member.is_bot {
            return;
        }
        let Some(transition) = event.transition() else {
            return;
        };
        let Some(context) = self.registry.get(event.space) else {
            return;
        };
        let who = format!("{} ({})", event.member.display_name, event.member.id);
        let entry = match transition {
            VoiceTransition::Joined(channel) => {
                format!("**Voice join** {} joined #{}", who, channel.name)
            }
            VoiceTransition::Left(channel) => {
                format!("**Voice leave** {} left #{}", who, channel.name)
            }
            VoiceTransition::Moved { from, to } => {
                format!("**Voice move** {} moved #{} -> #{}", who, from.name, to.name)
            }
            VoiceTransition::StateChanged { channel, changes } => format!(
                "**Voice state** {} in #{}: {}",
                who,
                channel.name,
                changes.join(", ")
            ),
        };
        self.post_log(event.space, &context, LogCategory::Voice, &entry)
            .await;
    }

    // ---------------------------------------------------------------------
    // Lockdown
    // ---------------------------------------------------------------------

    /// Manual lockdown toggle. Enabling raises verification to the highest
    /// level; disabling drops it to medium.
    #[instrument(skip(self), fields(space = %space))]
    pub async fn set_lockdown(
        &self,
        space: SpaceId,
        enabled: bool,
    ) -> ModerationResult<VerificationLevel> {
        let context = self.registry.get_or_create(space);
        context.security.lock().set_lockdown(enabled);

        let level = if enabled {
            VerificationLevel::Highest
        } else {
            VerificationLevel::Medium
        };
        self.resilience
            .run("edit verification level", || {
                self.remote.edit_verification_level(space, level)
            })
            .await
            .into_result()?;

        let status = if enabled { "ENABLED" } else { "DISABLED" };
        let entry = format!(
            "**[{}] Lockdown**\nVerification level: {}",
            status, level
        );
        self.post_log(space, &context, LogCategory::Security, &entry)
            .await;
        info!(enabled, level = %level, "Lockdown toggled");
        Ok(level)
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    /// Role and channel lookup, cached per space
    pub(crate) async fn directory(
        &self,
        space: SpaceId,
        context: &SpaceContext,
    ) -> Option<Directory> {
        if let Some(directory) = context.cached_directory() {
            return Some(directory);
        }
        match self
            .resilience
            .run("list resources", || self.remote.list_resources(space))
            .await
        {
            OperationOutcome::Completed(resources) => {
                let directory = Directory::from_resources(&resources);
                context.cache_directory(directory.clone());
                Some(directory)
            }
            other => {
                warn!(space = %space, outcome = ?other.into_result().err(), "Space directory unavailable");
                None
            }
        }
    }

    /// Apply a role change by name. When the remote rejects the cached ids
    /// the directory is listed again and the change retried once.
    async fn change_roles(
        &self,
        space: SpaceId,
        context: &SpaceContext,
        user: UserId,
        change: RoleChange<'_>,
    ) -> bool {
        let mut refreshed = context.cached_directory().is_none();

        loop {
            let Some(directory) = self.directory(space, context).await else {
                return false;
            };

            match directory.roles(change.grant).zip(directory.roles(change.revoke)) {
                None if refreshed => {
                    debug!(space = %space, operation = change.operation, "Roles missing from space");
                    return false;
                }
                None => {}
                Some((add, remove)) => {
                    let outcome = self
                        .resilience
                        .run(change.operation, || {
                            self.remote
                                .set_member_roles(space, user, &add, &remove, change.reason)
                        })
                        .await;
                    match outcome {
                        OperationOutcome::Completed(()) => return true,
                        OperationOutcome::Failed(failure)
                            if refreshed || !is_unknown_role(&failure.error) =>
                        {
                            warn!(space = %space, member = %user, error = %failure, "Role change failed");
                            return false;
                        }
                        OperationOutcome::AlreadyAbsent if refreshed => {
                            warn!(space = %space, member = %user, operation = change.operation, "Role change target not found");
                            return false;
                        }
                        _ => {}
                    }
                }
            }

            context.invalidate_directory();
            refreshed = true;
        }
    }

    /// Post to a log sink if one is installed
    pub(crate) async fn post_log(
        &self,
        space: SpaceId,
        context: &SpaceContext,
        category: LogCategory,
        content: &str,
    ) {
        let Some(hook) = context.sink(category) else {
            debug!(space = %space, category = %category, "No sink installed");
            return;
        };
        let outcome = self
            .resilience
            .run("post log entry", || {
                self.remote.execute_alert_hook(hook, content)
            })
            .await;
        if let OperationOutcome::Failed(failure) = outcome {
            warn!(space = %space, category = %category, error = %failure, "Log entry dropped");
        }
    }
}
