//! Structured error model for table-service operations.
//!
//! [`StoreError`] carries classification and retry metadata. Construct
//! via kind-specific factory methods.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad classification of a table-service error.
///
/// Determines retry behavior and whether the whole job must abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum StoreErrorKind {
    /// Request rate exceeded the table's throughput (retryable).
    Throttling,
    /// Transient network failure (retryable).
    TransientNetwork,
    /// Table or resource does not exist.
    NotFound,
    /// Caller lacks permission for the operation.
    AccessDenied,
    /// Target table exists with an incompatible key schema.
    SchemaMismatch,
    /// Malformed or invalid request.
    InvalidRequest,
    /// Internal service or client error.
    Internal,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Throttling => "throttling",
            Self::TransientNetwork => "transient_network",
            Self::NotFound => "not_found",
            Self::AccessDenied => "access_denied",
            Self::SchemaMismatch => "schema_mismatch",
            Self::InvalidRequest => "invalid_request",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Structured error from a table-service operation.
///
/// Carries classification and retry metadata. Construct via
/// kind-specific factory methods (e.g., [`StoreError::throttling`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("[{kind}] {code}: {message}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl StoreError {
    fn new(
        kind: StoreErrorKind,
        retryable: bool,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            retryable,
        }
    }

    /// Request rate exceeded; always safe to retry after backoff.
    pub fn throttling(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Throttling, true, code, message)
    }

    /// Transient network failure; safe to retry after backoff.
    pub fn transient_network(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::TransientNetwork, true, code, message)
    }

    /// Table or resource does not exist.
    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::NotFound, false, code, message)
    }

    /// Caller lacks permission.
    pub fn access_denied(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::AccessDenied, false, code, message)
    }

    /// Incompatible key schema between source and target.
    pub fn schema_mismatch(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::SchemaMismatch, false, code, message)
    }

    /// Malformed or invalid request.
    pub fn invalid_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::InvalidRequest, false, code, message)
    }

    /// Internal service or client error.
    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Internal, false, code, message)
    }

    /// Non-retryable store errors abort the entire job.
    pub fn is_fatal(&self) -> bool {
        !self.retryable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttling_is_retryable_not_fatal() {
        let err = StoreError::throttling("ThrottlingException", "rate exceeded");
        assert!(err.retryable);
        assert!(!err.is_fatal());
        assert_eq!(err.kind, StoreErrorKind::Throttling);
    }

    #[test]
    fn test_transient_network_is_retryable() {
        let err = StoreError::transient_network("CONN_RESET", "connection reset by peer");
        assert!(err.retryable);
        assert_eq!(err.kind, StoreErrorKind::TransientNetwork);
    }

    #[test]
    fn test_not_found_is_fatal() {
        let err = StoreError::not_found("ResourceNotFoundException", "no such table");
        assert!(!err.retryable);
        assert!(err.is_fatal());
    }

    #[test]
    fn test_schema_mismatch_is_fatal() {
        let err = StoreError::schema_mismatch("KEY_SCHEMA_MISMATCH", "keys differ");
        assert!(err.is_fatal());
        assert_eq!(err.kind, StoreErrorKind::SchemaMismatch);
    }

    #[test]
    fn test_display_includes_kind_code_message() {
        let err = StoreError::access_denied("AccessDeniedException", "not authorized");
        let msg = format!("{}", err);
        assert!(msg.contains("access_denied"));
        assert!(msg.contains("AccessDeniedException"));
        assert!(msg.contains("not authorized"));
    }
}
