//! Reconstruction and moderation wired together against the in-memory
//! remote service.

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use warden_daemon::{CommandSurface, DaemonError, Warden, WardenConfig};
use warden_reconcile::{HealthVerdict, ReconcileError};
use warden_remote::{InMemoryRemote, RemoteError, RemoteOp};
use warden_types::{
    Actor, ChannelRef, LogCategory, MemberJoined, MessageId, MessagePosted, ReactionAdded,
    ResourceId, ResourceKind, SpaceEventHandler, SpaceId, UserId, VerificationLevel,
};

struct Harness {
    remote: Arc<InMemoryRemote>,
    warden: Arc<Warden>,
    space: SpaceId,
}

impl Harness {
    async fn reconstructed() -> Self {
        let remote = Arc::new(InMemoryRemote::new());
        let space = SpaceId::new(77);
        remote.add_space(space);
        let warden = Arc::new(Warden::new(remote.clone(), &WardenConfig::default()).unwrap());
        warden.on_space_join(space).await;
        warden.reconstruct(space, UserId::new(1)).await.unwrap();
        Self {
            remote,
            warden,
            space,
        }
    }

    fn role(&self, name: &str) -> ResourceId {
        self.remote
            .find(self.space, ResourceKind::Role, name)
            .unwrap()
            .id
    }

    fn channel(&self, name: &str) -> ChannelRef {
        let resource = self
            .remote
            .find(self.space, ResourceKind::Channel, name)
            .unwrap();
        ChannelRef::new(resource.id, name)
    }

    fn log_posts(&self, category: LogCategory) -> Vec<String> {
        let context = self.warden.moderation().registry().get(self.space).unwrap();
        context
            .sink(category)
            .map(|hook| self.remote.hook_posts(hook))
            .unwrap_or_default()
    }

    fn join_event(&self, member: &Actor) -> MemberJoined {
        let at = Utc::now();
        MemberJoined {
            space: self.space,
            member: member.clone(),
            account_created_at: at - ChronoDuration::days(1),
            has_avatar: false,
            member_count: 2,
            at,
        }
    }

    fn message(&self, author: &Actor, content: &str, offset_secs: i64) -> MessagePosted {
        MessagePosted {
            space: self.space,
            channel: self.channel("general"),
            message_id: MessageId::new(offset_secs as u64 + 1),
            author: author.clone(),
            content: content.to_string(),
            mention_count: 0,
            at: Utc::now() + ChronoDuration::seconds(offset_secs),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_reconstructed_space_is_healthy() {
    let h = Harness::reconstructed().await;

    let report = h.warden.health_check(h.space).await.unwrap();
    assert_eq!(report.verdict, HealthVerdict::Perfect);
    assert_eq!(report.roles.found, 11);
    assert_eq!(report.channels.found, 34);
    assert_eq!(report.automation_rules, 4);
    assert!(!report.posture.lockdown_active);
    assert_eq!(report.posture.pending_verifications, 0);

    // Every log category has a sink
    let context = h.warden.moderation().registry().get(h.space).unwrap();
    assert_eq!(context.sinks().len(), LogCategory::ALL.len());
}

#[tokio::test(start_paused = true)]
async fn test_join_verify_and_escalate() {
    let h = Harness::reconstructed().await;
    let newcomer = Actor::new(UserId::new(500), "newcomer");

    // Join: gated behind verification and welcomed
    h.warden.on_member_join(h.join_event(&newcomer)).await;
    assert!(h
        .remote
        .member_roles(h.space, newcomer.id)
        .contains(&h.role("Unverified")));
    assert_eq!(
        h.remote
            .channel_messages(h.space, h.channel("welcome").id)
            .len(),
        1
    );
    let report = h.warden.health_check(h.space).await.unwrap();
    assert_eq!(report.posture.pending_verifications, 1);

    // Verify
    h.warden
        .on_reaction_add(ReactionAdded {
            space: h.space,
            channel: h.channel("verify"),
            message_id: MessageId::new(1),
            member: newcomer.clone(),
            emoji: "✅".to_string(),
            at: Utc::now(),
        })
        .await;
    let roles = h.remote.member_roles(h.space, newcomer.id);
    assert!(roles.contains(&h.role("Member")));
    assert!(!roles.contains(&h.role("Unverified")));

    // Three invite links earn a timeout
    let member = newcomer.with_roles(["Member"]);
    let mut audit = h.warden.moderation().subscribe_audit();
    for i in 0..3 {
        h.warden
            .on_message(h.message(&member, "come to discord.gg/elsewhere", i * 10))
            .await;
    }

    let timeouts = h.remote.timeouts(h.space);
    assert_eq!(timeouts.len(), 1);
    assert_eq!(timeouts[0].duration, Duration::from_secs(1800));
    assert_eq!(h.log_posts(LogCategory::Moderation).len(), 3);
    assert!(h
        .log_posts(LogCategory::Member)
        .iter()
        .any(|p| p.contains("Member verified")));

    let mut counts = Vec::new();
    while let Ok(record) = audit.try_recv() {
        counts.push(record.warning_count);
    }
    assert_eq!(counts, vec![1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_staff_are_not_moderated() {
    let h = Harness::reconstructed().await;
    let staff = Actor::new(UserId::new(9), "staff").with_roles(["Helper"]);

    h.warden
        .on_message(h.message(&staff, "discord.gg/partner", 0))
        .await;

    assert!(h.remote.calls_of(RemoteOp::DeleteMessage).is_empty());
    assert!(h.log_posts(LogCategory::Moderation).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reconstruction_resets_moderation_state() {
    let h = Harness::reconstructed().await;
    let subject = Actor::new(UserId::new(40), "subject");
    let moderator = Actor::new(UserId::new(41), "moderator");

    for _ in 0..2 {
        h.warden
            .warn_user(h.space, &subject, &moderator, "off topic")
            .await
            .unwrap();
    }

    h.warden.reconstruct(h.space, UserId::new(1)).await.unwrap();

    let record = h
        .warden
        .warn_user(h.space, &subject, &moderator, "off topic")
        .await
        .unwrap();
    assert_eq!(record.warning_count, 1);
    assert!(record.action.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_failed_reconstruction_does_not_strand_moderation() {
    let h = Harness::reconstructed().await;
    let early = Actor::new(UserId::new(500), "early");
    h.warden.on_member_join(h.join_event(&early)).await;
    assert_eq!(h.warden.moderation().pending_verifications(h.space), 1);

    // Roles are purged and re-created, then the run dies in infrastructure
    h.remote.fail_target(
        RemoteOp::CreateChannel,
        "general",
        RemoteError::Forbidden("missing access".into()),
    );
    assert!(h.warden.reconstruct(h.space, UserId::new(1)).await.is_err());
    h.remote.clear_faults();

    // The purged role took the old pending entry with it
    assert_eq!(h.warden.moderation().pending_verifications(h.space), 0);

    let late = Actor::new(UserId::new(501), "late");
    h.warden.on_member_join(h.join_event(&late)).await;

    assert!(h
        .remote
        .member_roles(h.space, late.id)
        .contains(&h.role("Unverified")));
    let context = h.warden.moderation().registry().get(h.space).unwrap();
    assert!(context.security.lock().is_pending(late.id));
    assert!(!context.security.lock().is_pending(early.id));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_reconstruction_is_rejected() {
    let h = Harness::reconstructed().await;
    h.remote.set_latency(Duration::from_millis(10));

    let warden = h.warden.clone();
    let space = h.space;
    let first = tokio::spawn(async move { warden.reconstruct(space, UserId::new(1)).await });
    tokio::time::sleep(Duration::from_millis(1)).await;

    let second = h.warden.reconstruct(h.space, UserId::new(2)).await;
    assert!(matches!(
        second,
        Err(DaemonError::Reconcile(ReconcileError::AlreadyRunning(_)))
    ));

    let summary = first.await.unwrap().unwrap();
    assert_eq!(summary.initiator, UserId::new(1));
}

#[tokio::test(start_paused = true)]
async fn test_lockdown_and_raid() {
    let h = Harness::reconstructed().await;

    let level = h.warden.set_lockdown(h.space, true).await.unwrap();
    assert_eq!(level, VerificationLevel::Highest);
    assert!(h.warden.health_check(h.space).await.unwrap().posture.lockdown_active);

    h.warden.set_lockdown(h.space, false).await.unwrap();
    assert_eq!(
        h.remote.verification_level(h.space),
        Some(VerificationLevel::Medium)
    );

    // A burst of joins trips the raid sweep
    for i in 0..10 {
        let member = Actor::new(UserId::new(1_000 + i), format!("raider-{}", i));
        h.warden.on_member_join(h.join_event(&member)).await;
    }
    let engaged = h.warden.sweeper().raid_sweep(Utc::now()).await;
    assert_eq!(engaged, vec![h.space]);
    assert_eq!(
        h.remote.verification_level(h.space),
        Some(VerificationLevel::High)
    );
    assert!(h
        .log_posts(LogCategory::Security)
        .iter()
        .any(|p| p.contains("RAID DETECTED")));
}

#[tokio::test(start_paused = true)]
async fn test_unverified_members_are_removed() {
    let h = Harness::reconstructed().await;
    let member = Actor::new(UserId::new(600), "lurker");
    h.warden.on_member_join(h.join_event(&member)).await;

    let later = Utc::now() + ChronoDuration::seconds(3_601);
    let removed = h.warden.sweeper().verification_sweep(later).await;

    assert_eq!(removed, vec![(h.space, member.id)]);
    assert_eq!(h.remote.kicked(h.space), vec![member.id]);
}

#[tokio::test(start_paused = true)]
async fn test_leaving_a_space_drops_state() {
    let h = Harness::reconstructed().await;
    h.warden
        .on_member_join(h.join_event(&Actor::new(UserId::new(3), "someone")))
        .await;

    h.warden.on_space_leave(h.space).await;

    assert!(h.warden.moderation().registry().get(h.space).is_none());
    assert_eq!(h.warden.moderation().pending_verifications(h.space), 0);
}
