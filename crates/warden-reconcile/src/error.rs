//! Reconciliation errors

use thiserror::Error;
use warden_remote::OperationFailure;
use warden_types::{ResourceKind, SpaceId};

use crate::state::DeploymentPhase;

/// Result type for reconciliation operations
pub type ReconcileResult<T> = std::result::Result<T, ReconcileError>;

/// Errors raised while reconstructing or inspecting a space
#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    #[error("Reconstruction already in progress for {0}")]
    AlreadyRunning(SpaceId),

    #[error("{phase} phase created {created}/{expected} {kind}s")]
    PhaseShortfall {
        phase: DeploymentPhase,
        kind: ResourceKind,
        created: usize,
        expected: usize,
    },

    #[error("Could not read space inventory: {0}")]
    Inventory(#[source] OperationFailure),

    #[error("Invalid phase transition from {from} to {to}")]
    InvalidTransition {
        from: DeploymentPhase,
        to: DeploymentPhase,
    },

    #[error("Catalog is inconsistent: {0}")]
    Catalog(String),
}

impl ReconcileError {
    /// Error text trimmed for user-facing reports
    pub fn excerpt(&self, max_chars: usize) -> String {
        self.to_string().chars().take(max_chars).collect()
    }
}
