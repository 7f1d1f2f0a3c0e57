//! Failure taxonomy returned by the envelope.

use std::time::Duration;
use thiserror::Error;

/// Classified failure of a guarded call.
///
/// `E` is the operation's own error type.
#[derive(Debug, Error)]
pub enum FailureKind<E> {
    /// The final attempt did not finish within the policy timeout.
    #[error("call to {identity} timed out after {timeout:?} ({attempts} attempts)")]
    Timeout {
        identity: String,
        timeout: Duration,
        attempts: u32,
    },

    /// The operation reported an error and the retry budget is spent.
    #[error("dependency {identity} failed after {attempts} attempts: {source}")]
    DependencyFailure {
        identity: String,
        attempts: u32,
        #[source]
        source: E,
    },

    /// Rejected without execution, or a half-open probe failed.
    #[error("circuit for {identity} is open")]
    CircuitOpen { identity: String },

    /// The operation flagged its failure as not worth retrying.
    #[error("non-retryable failure from {identity}: {source}")]
    NonRetryable {
        identity: String,
        #[source]
        source: E,
    },

    /// The caller's context was cancelled.
    #[error("call to {identity} was cancelled")]
    Cancelled { identity: String },
}

impl<E> FailureKind<E> {
    /// Short label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::Timeout { .. } => "timeout",
            FailureKind::DependencyFailure { .. } => "dependency_failure",
            FailureKind::CircuitOpen { .. } => "circuit_open",
            FailureKind::NonRetryable { .. } => "non_retryable",
            FailureKind::Cancelled { .. } => "cancelled",
        }
    }

    pub fn identity(&self) -> &str {
        match self {
            FailureKind::Timeout { identity, .. }
            | FailureKind::DependencyFailure { identity, .. }
            | FailureKind::CircuitOpen { identity }
            | FailureKind::NonRetryable { identity, .. }
            | FailureKind::Cancelled { identity } => identity,
        }
    }

    /// Whether the failure means the dependency is temporarily unavailable,
    /// as opposed to a bad request or an aborted caller.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            FailureKind::Timeout { .. }
                | FailureKind::DependencyFailure { .. }
                | FailureKind::CircuitOpen { .. }
        )
    }

    /// The operation's error, when one was captured.
    pub fn into_source(self) -> Option<E> {
        match self {
            FailureKind::DependencyFailure { source, .. } | FailureKind::NonRetryable { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("connection refused")]
    struct Refused;

    #[test]
    fn test_error_display() {
        let err: FailureKind<Refused> = FailureKind::DependencyFailure {
            identity: "postgres-auth".into(),
            attempts: 4,
            source: Refused,
        };
        assert_eq!(
            err.to_string(),
            "dependency postgres-auth failed after 4 attempts: connection refused"
        );
        assert!(std::error::Error::source(&err).is_some());

        let err: FailureKind<Refused> = FailureKind::CircuitOpen {
            identity: "openrouter-api".into(),
        };
        assert_eq!(err.to_string(), "circuit for openrouter-api is open");
    }

    #[test]
    fn test_classification_helpers() {
        let open: FailureKind<Refused> = FailureKind::CircuitOpen { identity: "x".into() };
        assert!(open.is_unavailable());
        assert_eq!(open.label(), "circuit_open");
        assert_eq!(open.identity(), "x");

        let bad: FailureKind<Refused> = FailureKind::NonRetryable {
            identity: "x".into(),
            source: Refused,
        };
        assert!(!bad.is_unavailable());
        assert!(bad.into_source().is_some());

        let cancelled: FailureKind<Refused> = FailureKind::Cancelled { identity: "x".into() };
        assert!(!cancelled.is_unavailable());
    }
}
