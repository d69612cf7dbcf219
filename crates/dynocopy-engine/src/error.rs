//! Copy-job error model.

use dynocopy_types::error::StoreError;

/// Categorized copy-job error.
///
/// `Store` wraps a typed [`StoreError`] from the table service, which
/// carries its own retryable/fatal classification.
///
/// `Infrastructure` wraps opaque host-side errors (invalid
/// configuration, channel failures, task panics) that always abort the
/// job.
#[derive(Debug)]
pub enum CopyError {
    /// Typed table-service error.
    Store(StoreError),
    /// Host-side error (configuration, channel, task join).
    Infrastructure(anyhow::Error),
}

impl std::fmt::Display for CopyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(e) => write!(f, "{}", e),
            Self::Infrastructure(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CopyError {}

impl From<anyhow::Error> for CopyError {
    fn from(e: anyhow::Error) -> Self {
        Self::Infrastructure(e)
    }
}

impl From<StoreError> for CopyError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl CopyError {
    /// Returns `true` for throttling/transient store errors that are
    /// absorbed by backoff-and-retry inside a worker.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.retryable,
            Self::Infrastructure(_) => false,
        }
    }

    /// Returns `true` when the error must cancel every in-flight
    /// segment and abort the job.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Store(e) => e.is_fatal(),
            Self::Infrastructure(_) => true,
        }
    }

    /// Returns the typed store error if this is a `Store` variant.
    pub fn as_store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Store(e) => Some(e),
            Self::Infrastructure(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynocopy_types::error::StoreErrorKind;

    #[test]
    fn test_copy_error_store_throttling_is_retryable() {
        let err = CopyError::Store(StoreError::throttling(
            "ProvisionedThroughputExceededException",
            "rate exceeded",
        ));
        assert!(err.is_retryable());
        assert!(!err.is_fatal());
        let se = err.as_store_error().unwrap();
        assert_eq!(se.kind, StoreErrorKind::Throttling);
    }

    #[test]
    fn test_copy_error_store_not_found_is_fatal() {
        let err = CopyError::Store(StoreError::not_found(
            "ResourceNotFoundException",
            "table missing",
        ));
        assert!(!err.is_retryable());
        assert!(err.is_fatal());
    }

    #[test]
    fn test_copy_error_infrastructure_is_fatal() {
        let err = CopyError::Infrastructure(anyhow::anyhow!("segment task panicked"));
        assert!(!err.is_retryable());
        assert!(err.is_fatal());
        assert!(err.as_store_error().is_none());
    }

    #[test]
    fn test_copy_error_from_anyhow() {
        let e: CopyError = anyhow::anyhow!("something went wrong").into();
        assert!(matches!(e, CopyError::Infrastructure(_)));
    }

    #[test]
    fn test_copy_error_display_store() {
        let err = CopyError::Store(StoreError::schema_mismatch(
            "KEY_SCHEMA_MISMATCH",
            "keys differ",
        ));
        let msg = format!("{}", err);
        assert!(msg.contains("schema_mismatch"));
        assert!(msg.contains("KEY_SCHEMA_MISMATCH"));
        assert!(msg.contains("keys differ"));
    }

    #[test]
    fn test_copy_error_display_infrastructure() {
        let err = CopyError::Infrastructure(anyhow::anyhow!("channel closed"));
        assert!(format!("{}", err).contains("channel closed"));
    }
}
