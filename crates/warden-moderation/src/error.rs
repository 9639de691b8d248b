//! Moderation errors

use thiserror::Error;
use warden_remote::OperationFailure;
use warden_types::UserId;

/// Result type for moderation operations
pub type ModerationResult<T> = std::result::Result<T, ModerationError>;

/// Errors surfaced to operators; violating members never see these
#[derive(Debug, Clone, Error)]
pub enum ModerationError {
    #[error("Cannot warn bot account {0}")]
    CannotWarnBot(UserId),

    #[error("Remote operation failed: {0}")]
    Remote(#[from] OperationFailure),

    #[error("Invalid content pattern: {0}")]
    Pattern(#[from] regex::Error),
}
