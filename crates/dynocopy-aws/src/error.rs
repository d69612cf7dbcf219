//! Mapping from SDK failures to the engine's error taxonomy.

use aws_sdk_dynamodb::error::{BuildError, ProvideErrorMetadata, SdkError};

use dynocopy_types::error::StoreError;

/// Classify an SDK error into a [`StoreError`].
///
/// Transport-level failures (timeouts, dispatch errors) are retryable;
/// service errors are classified by their error code, mirroring how
/// the service reports throttling versus client faults.
pub(crate) fn classify<E>(op: &'static str, err: SdkError<E>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match &err {
        SdkError::TimeoutError(_) => {
            return StoreError::transient_network("TimeoutError", format!("{op} timed out"));
        }
        SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            return StoreError::transient_network(
                "ConnectionError",
                format!("{op} transport failure: {err}"),
            );
        }
        _ => {}
    }

    let code = err.code().unwrap_or("UnknownError").to_string();
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| format!("{op} failed: {err}"));

    match code.as_str() {
        "ProvisionedThroughputExceededException"
        | "ThrottlingException"
        | "RequestLimitExceeded"
        | "LimitExceededException" => StoreError::throttling(code, message),
        "InternalServerError" | "ServiceUnavailable" | "TransactionConflictException" => {
            StoreError::transient_network(code, message)
        }
        "ResourceNotFoundException" | "TableNotFoundException" => {
            StoreError::not_found(code, message)
        }
        "AccessDeniedException" | "UnrecognizedClientException" | "ExpiredTokenException"
        | "InvalidSignatureException" => StoreError::access_denied(code, message),
        "ValidationException" | "ConditionalCheckFailedException"
        | "ItemCollectionSizeLimitExceededException" => StoreError::invalid_request(code, message),
        _ => StoreError::internal(code, message),
    }
}

/// A request that cannot even be constructed is a client fault.
pub(crate) fn from_build(err: BuildError) -> StoreError {
    StoreError::invalid_request("InvalidParameter", err.to_string())
}
