//! Daemon errors

use thiserror::Error;
use warden_moderation::ModerationError;
use warden_reconcile::ReconcileError;

/// Result type for daemon operations
pub type DaemonResult<T> = std::result::Result<T, DaemonError>;

/// Errors returned to the command surface and the binary
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Moderation(#[from] ModerationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for DaemonError {
    fn from(err: config::ConfigError) -> Self {
        DaemonError::Config(err.to_string())
    }
}
