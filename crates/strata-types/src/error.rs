use thiserror::Error;

use crate::provider::ProviderError;

/// Errors from repository operations (used by the storage ports in strata-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors surfaced by the memory engine's operations.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// A required provider credential or setting is missing. Raised before
    /// any provider call is attempted.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Non-success response or transport failure from an external provider.
    #[error("provider '{provider}' unavailable: {message}")]
    ProviderUnavailable { provider: String, message: String },

    /// Extraction output did not parse into `{ items: [...] }`.
    #[error("malformed extraction response: {0}")]
    MalformedExtractionResponse(String),

    /// A boundary request is missing required fields or has wrong types.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),

    /// The extraction queue rejected the job (full or shut down).
    #[error("extraction queue unavailable: {0}")]
    QueueUnavailable(String),
}

impl MemoryError {
    /// Wrap a provider failure, naming the provider that produced it.
    pub fn from_provider(provider: &str, err: ProviderError) -> Self {
        match err {
            ProviderError::MissingCredential(what) => MemoryError::Configuration(format!(
                "provider '{provider}' has no credential: {what}"
            )),
            other => MemoryError::ProviderUnavailable {
                provider: provider.to_string(),
                message: other.to_string(),
            },
        }
    }

    /// Whether a job that failed with this error may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MemoryError::ProviderUnavailable { .. } | MemoryError::Storage(RepositoryError::Connection)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_missing_credential_maps_to_configuration() {
        let err = MemoryError::from_provider(
            "openai-embeddings",
            ProviderError::MissingCredential("OPENAI_API_KEY".to_string()),
        );
        assert!(matches!(err, MemoryError::Configuration(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_status_maps_to_provider_unavailable() {
        let err = MemoryError::from_provider(
            "openai-embeddings",
            ProviderError::Status {
                status: 500,
                message: "boom".to_string(),
            },
        );
        match &err {
            MemoryError::ProviderUnavailable { provider, message } => {
                assert_eq!(provider, "openai-embeddings");
                assert!(message.contains("500"));
            }
            other => panic!("expected ProviderUnavailable, got {other}"),
        }
        assert!(err.is_retryable());
    }

    #[test]
    fn test_malformed_response_not_retryable() {
        let err = MemoryError::MalformedExtractionResponse("not json".to_string());
        assert!(!err.is_retryable());
    }
}
