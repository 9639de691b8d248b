//! Remote failure surface and its classification

use std::time::Duration;
use thiserror::Error;

/// Result type for raw remote calls
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Failure reported by the remote service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("Resource not found")]
    NotFound,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("Server fault ({status}): {message}")]
    ServerFault { status: u16, message: String },

    #[error("HTTP error ({status}): {message}")]
    Http { status: u16, message: String },

    #[error("Request timed out")]
    Timeout,
}

/// How the wrapper treats a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Target already absent; the caller's goal is met
    AlreadyAbsent,
    /// Never retried
    Permanent,
    /// Retried after the hinted delay, or the current backoff if none
    Retryable { hint: Option<Duration> },
}

impl RemoteError {
    /// Build a fault from a raw status code
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            404 => RemoteError::NotFound,
            403 => RemoteError::Forbidden(message),
            500..=599 => RemoteError::ServerFault { status, message },
            _ => RemoteError::Http { status, message },
        }
    }

    pub fn classify(&self) -> FailureClass {
        match self {
            RemoteError::NotFound => FailureClass::AlreadyAbsent,
            RemoteError::RateLimited { retry_after } => FailureClass::Retryable {
                hint: Some(*retry_after),
            },
            RemoteError::ServerFault { .. } | RemoteError::Timeout => {
                FailureClass::Retryable { hint: None }
            }
            RemoteError::Forbidden(_) | RemoteError::Http { .. } => FailureClass::Permanent,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.classify(), FailureClass::Retryable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert_eq!(RemoteError::from_status(404, "gone"), RemoteError::NotFound);
        assert!(matches!(
            RemoteError::from_status(403, "no"),
            RemoteError::Forbidden(_)
        ));
        assert!(matches!(
            RemoteError::from_status(502, "bad gateway"),
            RemoteError::ServerFault { status: 502, .. }
        ));
        assert!(matches!(
            RemoteError::from_status(400, "bad request"),
            RemoteError::Http { status: 400, .. }
        ));
    }

    #[test]
    fn test_classification() {
        assert_eq!(RemoteError::NotFound.classify(), FailureClass::AlreadyAbsent);
        assert_eq!(
            RemoteError::Forbidden("missing access".into()).classify(),
            FailureClass::Permanent
        );
        assert_eq!(
            RemoteError::RateLimited {
                retry_after: Duration::from_secs(2)
            }
            .classify(),
            FailureClass::Retryable {
                hint: Some(Duration::from_secs(2))
            }
        );
        assert!(RemoteError::Timeout.is_retryable());
        assert!(!RemoteError::from_status(400, "x").is_retryable());
    }
}
