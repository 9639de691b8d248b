//! Periodic security sweeps
//!
//! Two independent loops run per process:
//! - verification: removes members who stayed unverified past the deadline
//! - raid: engages lockdown when the join rate crosses the threshold
//!
//! Each sweep visits every registered space and never holds a space lock
//! across a remote call.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use warden_remote::OperationOutcome;
use warden_types::{LogCategory, SpaceId, UserId, VerificationLevel};

use crate::config::SweepConfig;
use crate::engine::ModerationEngine;
use crate::escalation::{AuditRecord, RemediationAction};

/// Runs the verification and raid sweeps
pub struct SecuritySweeper {
    engine: Arc<ModerationEngine>,
    config: SweepConfig,
    running: AtomicBool,
}

/// Handles to the spawned sweep loops
pub struct SweepHandles {
    sweeper: Arc<SecuritySweeper>,
    verification: JoinHandle<()>,
    raid: JoinHandle<()>,
}

impl SweepHandles {
    /// Stop both loops
    pub fn shutdown(self) {
        self.sweeper.running.store(false, Ordering::SeqCst);
        self.verification.abort();
        self.raid.abort();
        info!("Security sweeps stopped");
    }
}

impl SecuritySweeper {
    pub fn new(engine: Arc<ModerationEngine>, config: SweepConfig) -> Self {
        Self {
            engine,
            config,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn both sweep loops on the current runtime
    pub fn start(self: Arc<Self>) -> SweepHandles {
        self.running.store(true, Ordering::SeqCst);

        let verification_every = Duration::from_secs(self.config.verification_interval_secs.max(1));
        let raid_every = Duration::from_secs(self.config.security_interval_secs.max(1));

        let sweeper = self.clone();
        let verification = tokio::spawn(async move {
            let mut ticker = interval(verification_every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;
            while sweeper.is_running() {
                ticker.tick().await;
                sweeper.verification_sweep(Utc::now()).await;
            }
        });

        let sweeper = self.clone();
        let raid = tokio::spawn(async move {
            let mut ticker = interval(raid_every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            while sweeper.is_running() {
                ticker.tick().await;
                sweeper.raid_sweep(Utc::now()).await;
            }
        });

        info!(
            verification_secs = verification_every.as_secs(),
            raid_secs = raid_every.as_secs(),
            "Security sweeps started"
        );

        SweepHandles {
            sweeper: self,
            verification,
            raid,
        }
    }

    /// Remove members still unverified past the deadline. Returns the
    /// members removed.
    pub async fn verification_sweep(&self, now: DateTime<Utc>) -> Vec<(SpaceId, UserId)> {
        let max_age = self.engine.config().unverified_kick_after();
        let mut removed = Vec::new();

        for space in self.engine.registry().spaces() {
            let Some(context) = self.engine.registry().get(space) else {
                continue;
            };
            let expired = context.security.lock().expired_pending(now, max_age);
            if expired.is_empty() {
                continue;
            }

            for user in expired {
                let outcome = self
                    .engine
                    .resilience()
                    .run("remove unverified member", || {
                        self.engine.remote().kick_member(
                            space,
                            user,
                            "Failed to verify within time limit",
                        )
                    })
                    .await;

                // A member already gone counts as removed; a failed removal
                // stays pending for the next sweep
                if let OperationOutcome::Failed(failure) = outcome {
                    warn!(space = %space, member = %user, error = %failure, "Unverified member not removed");
                    continue;
                }

                context.security.lock().clear_pending(user);
                let label = format!("Did not verify within {} minutes", max_age.num_minutes());
                let entry = format!("**Unverified member removed** {}\n{}", user, label);
                self.engine
                    .post_log(space, &context, LogCategory::Security, &entry)
                    .await;
                self.engine.publish_audit(AuditRecord::sweep(
                    space,
                    Some(user),
                    label,
                    RemediationAction::Kick,
                    now,
                ));
                info!(space = %space, member = %user, "Removed unverified member");
                removed.push((space, user));
            }
        }

        debug!(removed = removed.len(), "Verification sweep complete");
        removed
    }

    /// Engage lockdown in every space whose join rate crossed the
    /// threshold. Returns the spaces that entered lockdown.
    pub async fn raid_sweep(&self, now: DateTime<Utc>) -> Vec<SpaceId> {
        let config = self.engine.config();
        let mut engaged = Vec::new();

        for space in self.engine.registry().spaces() {
            let Some(context) = self.engine.registry().get(space) else {
                continue;
            };
            let joins = context.security.lock().try_engage_lockdown(
                now,
                config.raid_threshold,
                config.raid_window(),
            );
            let Some(joins) = joins else {
                continue;
            };

            warn!(space = %space, joins, "Raid detected, lockdown engaged");
            let entry = format!(
                "**[ALERT] RAID DETECTED**\n{} joins in {} seconds\nLockdown engaged, verification level raised",
                joins, config.raid_window_secs
            );
            self.engine
                .post_log(space, &context, LogCategory::Security, &entry)
                .await;

            let outcome = self
                .engine
                .resilience()
                .run("raise verification level", || {
                    self.engine
                        .remote()
                        .edit_verification_level(space, VerificationLevel::High)
                })
                .await;
            if let OperationOutcome::Failed(failure) = outcome {
                warn!(space = %space, error = %failure, "Verification level not raised");
            }
            self.engine.publish_audit(AuditRecord::sweep(
                space,
                None,
                format!("Raid detected: {} joins", joins),
                RemediationAction::Lockdown {
                    level: VerificationLevel::High,
                },
                now,
            ));

            engaged.push(space);
        }

        engaged
    }
}
