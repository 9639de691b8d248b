//! Progress events and the completion summary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_types::{DeploymentId, SpaceId, UserId};

use crate::state::{DeploymentCounters, DeploymentPhase};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Started,
    Completed,
    Failed,
}

/// One step of observable progress, broadcast to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub deployment_id: DeploymentId,
    pub space: SpaceId,
    pub phase: DeploymentPhase,
    pub status: PhaseStatus,
    pub message: String,
    pub counters: DeploymentCounters,
    pub at: DateTime<Utc>,
}

/// Final report of a successful reconstruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSummary {
    pub deployment_id: DeploymentId,
    pub space: SpaceId,
    pub initiator: UserId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub counters: DeploymentCounters,
}

impl DeploymentSummary {
    pub fn duration_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    /// Single-paragraph human rendering
    pub fn render(&self) -> String {
        let c = &self.counters;
        format!(
            "Reconstruction of {} complete in {:.2}s: {} roles, {} categories, {} channels, \
             {} alert hooks, {} automation rules created; {} channels and {} roles purged",
            self.space,
            self.duration_secs(),
            c.roles_created,
            c.categories_created,
            c.channels_created,
            c.hooks_created,
            c.rules_created,
            c.channels_deleted + c.categories_deleted,
            c.roles_deleted,
        )
    }
}
