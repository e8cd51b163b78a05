//! Closed error taxonomy for the remote issue tracker.
//!
//! Every failure is classified into a kind carrying the name of the
//! operation that failed, so callers branch on the kind instead of
//! re-deriving meaning from raw status codes.

use thiserror::Error;

/// A failed call against the remote tracker.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP 401 — the token was rejected.
    #[error("{operation}: authentication failed (HTTP 401), check the token")]
    Auth {
        /// Operation that failed.
        operation: &'static str,
    },
    /// HTTP 403 — missing permission, or a rate-limit rejection dressed as
    /// a permission error (`rate_limited` distinguishes the two).
    #[error("{operation}: access forbidden (HTTP 403)")]
    Forbidden {
        /// Operation that failed.
        operation: &'static str,
        /// Whether the response message indicates rate limiting.
        rate_limited: bool,
    },
    /// HTTP 404 — repository or issue does not exist (or is invisible to
    /// this token).
    #[error("{operation}: resource not found (HTTP 404)")]
    NotFound {
        /// Operation that failed.
        operation: &'static str,
    },
    /// HTTP 422 — the tracker rejected the payload.
    #[error("{operation}: validation failed (HTTP 422): {message}")]
    Validation {
        /// Operation that failed.
        operation: &'static str,
        /// Message returned by the tracker.
        message: String,
    },
    /// Any other HTTP status, including 429 and server errors.
    #[error("{operation}: API error (HTTP {status}): {message}")]
    Api {
        /// Operation that failed.
        operation: &'static str,
        /// HTTP status code.
        status: u16,
        /// Message returned by the tracker.
        message: String,
    },
    /// The request never produced a status code (DNS, TLS, timeout...).
    #[error("{operation}: transport error: {message}")]
    Transport {
        /// Operation that failed.
        operation: &'static str,
        /// Underlying error description.
        message: String,
    },
}

impl RemoteError {
    /// Name of the operation that produced this error.
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Auth { operation }
            | Self::Forbidden { operation, .. }
            | Self::NotFound { operation }
            | Self::Validation { operation, .. }
            | Self::Api { operation, .. }
            | Self::Transport { operation, .. } => operation,
        }
    }

    /// Whether a retry can succeed: transport failures, 429, and 5xx.
    /// All other client errors are permanent.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Maps an HTTP status and response message to an error kind.
pub(crate) fn classify(operation: &'static str, status: u16, message: String) -> RemoteError {
    match status {
        401 => RemoteError::Auth { operation },
        403 => RemoteError::Forbidden {
            operation,
            rate_limited: message.to_lowercase().contains("rate limit"),
        },
        404 => RemoteError::NotFound { operation },
        422 => RemoteError::Validation { operation, message },
        _ => RemoteError::Api { operation, status, message },
    }
}
