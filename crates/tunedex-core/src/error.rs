//! Error types module
//!
//! Every failure the orchestrator can hand back to a caller is a
//! `RequestError`. Adapters classify external-service faults into one of
//! these variants locally; raw transport errors never cross the capability
//! boundary.

use serde::{Deserialize, Serialize};

/// Machine-readable classification of a request failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Payload is neither a clip we can sample nor a URL on a registered platform
    UnsupportedInput,
    /// Requester is over their rolling-window budget
    RateLimited,
    /// Handler exceeded its execution deadline
    Timeout,
    /// No recognition match, or the linked content is gone/private/blocked
    NotFound,
    /// External service error or outage
    UpstreamUnavailable,
    /// Clip or downloaded media exceeds the configured size/duration caps
    SizeOrDurationExceeded,
    /// Unexpected adapter fault
    Internal,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestError {
    #[error("unsupported input: {0}")]
    UnsupportedInput(String),

    #[error("rate limited, retry in {retry_in_secs}s")]
    RateLimited { retry_in_secs: u64 },

    #[error("timed out after {elapsed_secs}s")]
    Timeout { elapsed_secs: u64 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("size or duration limit exceeded: {0}")]
    SizeOrDurationExceeded(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RequestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RequestError::UnsupportedInput(_) => ErrorKind::UnsupportedInput,
            RequestError::RateLimited { .. } => ErrorKind::RateLimited,
            RequestError::Timeout { .. } => ErrorKind::Timeout,
            RequestError::NotFound(_) => ErrorKind::NotFound,
            RequestError::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            RequestError::SizeOrDurationExceeded(_) => ErrorKind::SizeOrDurationExceeded,
            RequestError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the orchestrator may retry this failure with backoff.
    ///
    /// NotFound and UnsupportedInput are terminal for the given input and are
    /// never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RequestError::UpstreamUnavailable(_) | RequestError::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(
            RequestError::NotFound("x".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            RequestError::RateLimited { retry_in_secs: 10 }.kind(),
            ErrorKind::RateLimited
        );
        assert_eq!(
            RequestError::Timeout { elapsed_secs: 30 }.kind(),
            ErrorKind::Timeout
        );
    }

    #[test]
    fn only_upstream_and_timeout_are_retryable() {
        assert!(RequestError::UpstreamUnavailable("503".into()).is_retryable());
        assert!(RequestError::Timeout { elapsed_secs: 5 }.is_retryable());

        assert!(!RequestError::NotFound("no match".into()).is_retryable());
        assert!(!RequestError::UnsupportedInput("text".into()).is_retryable());
        assert!(!RequestError::RateLimited { retry_in_secs: 1 }.is_retryable());
        assert!(!RequestError::SizeOrDurationExceeded("60MB".into()).is_retryable());
        assert!(!RequestError::Internal("bug".into()).is_retryable());
    }
}
