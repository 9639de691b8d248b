//! Warning escalation
//!
//! A member's warning count climbs with each qualifying violation. Reaching
//! the limit yields a timeout and resets the count in the same critical
//! section, so concurrent violations can never both observe the limit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use warden_types::{ChannelRef, SpaceId, UserId, VerificationLevel};

use crate::inspector::ViolationKind;
use crate::state::SecurityState;

/// Outcome of registering one violation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationStep {
    /// Count after the increment, before any reset
    pub warning_count: u32,
    /// Timeout owed when the limit was reached
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationPolicy {
    pub max_warnings: u32,
    pub timeout: Duration,
}

impl EscalationPolicy {
    pub fn new(max_warnings: u32, timeout: Duration) -> Self {
        Self {
            max_warnings: max_warnings.max(1),
            timeout,
        }
    }

    /// Increment, check the limit and reset. Call with the space lock held.
    pub fn register(&self, state: &mut SecurityState, user: UserId) -> EscalationStep {
        let warning_count = state.add_warning(user);
        if warning_count >= self.max_warnings {
            state.reset_warnings(user);
            EscalationStep {
                warning_count,
                timeout: Some(self.timeout),
            }
        } else {
            EscalationStep {
                warning_count,
                timeout: None,
            }
        }
    }
}

/// Remediation applied by the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RemediationAction {
    Timeout { duration: Duration },
    Kick,
    Lockdown { level: VerificationLevel },
}

impl fmt::Display for RemediationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemediationAction::Timeout { duration } => {
                write!(f, "Timed out for {} minutes", duration.as_secs() / 60)
            }
            RemediationAction::Kick => write!(f, "Removed from the space"),
            RemediationAction::Lockdown { level } => {
                write!(f, "Lockdown, verification level {}", level)
            }
        }
    }
}

/// One escalation or sweep action, as written to the audit stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub space: SpaceId,
    /// None for space-wide actions
    pub subject: Option<UserId>,
    pub subject_name: Option<String>,
    pub channel: Option<ChannelRef>,
    pub kinds: Vec<ViolationKind>,
    pub labels: Vec<String>,
    pub warning_count: u32,
    pub max_warnings: u32,
    pub action: Option<RemediationAction>,
    pub at: DateTime<Utc>,
}

impl AuditRecord {
    /// Record for an action taken by a periodic sweep
    pub fn sweep(
        space: SpaceId,
        subject: Option<UserId>,
        label: impl Into<String>,
        action: RemediationAction,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            space,
            subject,
            subject_name: None,
            channel: None,
            kinds: Vec::new(),
            labels: vec![label.into()],
            warning_count: 0,
            max_warnings: 0,
            action: Some(action),
            at,
        }
    }

    fn who(&self) -> String {
        match (&self.subject_name, self.subject) {
            (Some(name), Some(id)) => format!("{} ({})", name, id),
            (None, Some(id)) => id.to_string(),
            (_, None) => self.space.to_string(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "**Violation** {}\nWarnings: {}/{}\nViolations: {}",
            self.who(),
            self.warning_count,
            self.max_warnings,
            self.labels.join(", ")
        );
        if let Some(channel) = &self.channel {
            out.push_str(&format!("\nChannel: #{}", channel.name));
        }
        if let Some(action) = &self.action {
            out.push_str(&format!("\nAction taken: {}", action));
        }
        out
    }
}
