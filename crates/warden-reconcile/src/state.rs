//! Deployment state machine
//!
//! One [`DeploymentState`] exists per space while a reconstruction runs.
//! Phases only move forward, one step at a time, or to `Failed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use warden_types::{DeploymentId, ResourceId, SpaceId, UserId};

use crate::error::{ReconcileError, ReconcileResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentPhase {
    Init,
    Purge,
    Roles,
    Infrastructure,
    AutoMod,
    Finalize,
    Failed,
}

impl DeploymentPhase {
    /// Position in the forward sequence; `Failed` sits outside it
    fn ordinal(&self) -> Option<u8> {
        match self {
            DeploymentPhase::Init => Some(0),
            DeploymentPhase::Purge => Some(1),
            DeploymentPhase::Roles => Some(2),
            DeploymentPhase::Infrastructure => Some(3),
            DeploymentPhase::AutoMod => Some(4),
            DeploymentPhase::Finalize => Some(5),
            DeploymentPhase::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DeploymentPhase::Finalize | DeploymentPhase::Failed)
    }

    pub fn can_transition_to(&self, next: DeploymentPhase) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.ordinal(), next.ordinal()) {
            (Some(_), None) => true,
            (Some(from), Some(to)) => to == from + 1,
            _ => false,
        }
    }
}

impl fmt::Display for DeploymentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeploymentPhase::Init => "init",
            DeploymentPhase::Purge => "purge",
            DeploymentPhase::Roles => "roles",
            DeploymentPhase::Infrastructure => "infrastructure",
            DeploymentPhase::AutoMod => "automod",
            DeploymentPhase::Finalize => "finalize",
            DeploymentPhase::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Created and deleted resource tallies for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentCounters {
    pub rules_deleted: usize,
    pub channels_deleted: usize,
    pub categories_deleted: usize,
    pub roles_deleted: usize,
    pub roles_created: usize,
    pub categories_created: usize,
    pub channels_created: usize,
    pub hooks_created: usize,
    pub messages_posted: usize,
    pub rules_created: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentState {
    pub id: DeploymentId,
    pub space: SpaceId,
    pub initiator: UserId,
    pub started_at: DateTime<Utc>,
    pub phase: DeploymentPhase,
    pub counters: DeploymentCounters,
    pub progress_channel: Option<ResourceId>,
    pub last_error: Option<String>,
    pub failed_phase: Option<DeploymentPhase>,
}

impl DeploymentState {
    pub fn new(space: SpaceId, initiator: UserId, started_at: DateTime<Utc>) -> Self {
        Self {
            id: DeploymentId::generate(),
            space,
            initiator,
            started_at,
            phase: DeploymentPhase::Init,
            counters: DeploymentCounters::default(),
            progress_channel: None,
            last_error: None,
            failed_phase: None,
        }
    }

    pub fn advance(&mut self, next: DeploymentPhase) -> ReconcileResult<()> {
        if !self.phase.can_transition_to(next) {
            return Err(ReconcileError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        self.phase = next;
        Ok(())
    }

    /// Record a failure in the current phase
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.phase != DeploymentPhase::Failed {
            self.failed_phase = Some(self.phase);
        }
        self.phase = DeploymentPhase::Failed;
        self.last_error = Some(error.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> DeploymentState {
        DeploymentState::new(SpaceId::new(1), UserId::new(2), Utc::now())
    }

    #[test]
    fn test_forward_sequence() {
        let mut s = state();
        for phase in [
            DeploymentPhase::Purge,
            DeploymentPhase::Roles,
            DeploymentPhase::Infrastructure,
            DeploymentPhase::AutoMod,
            DeploymentPhase::Finalize,
        ] {
            s.advance(phase).unwrap();
        }
        assert_eq!(s.phase, DeploymentPhase::Finalize);
        assert!(s.advance(DeploymentPhase::Failed).is_err());
    }

    #[test]
    fn test_no_skipping_or_going_back() {
        let mut s = state();
        assert!(s.advance(DeploymentPhase::Roles).is_err());
        s.advance(DeploymentPhase::Purge).unwrap();
        assert!(s.advance(DeploymentPhase::Init).is_err());
        assert!(s.advance(DeploymentPhase::Purge).is_err());
    }

    #[test]
    fn test_failure_records_phase() {
        let mut s = state();
        s.advance(DeploymentPhase::Purge).unwrap();
        s.advance(DeploymentPhase::Roles).unwrap();
        s.fail("Roles phase created 3/11 roles");

        assert_eq!(s.phase, DeploymentPhase::Failed);
        assert_eq!(s.failed_phase, Some(DeploymentPhase::Roles));
        assert!(s.phase.is_terminal());
        assert!(s.last_error.as_deref().unwrap().contains("3/11"));
    }
}
