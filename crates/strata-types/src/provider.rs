//! Provider request/error types.
//!
//! The embedding model and the chat-completion model are reachable only
//! through provider ports. These types model what crosses that boundary.

use serde::{Deserialize, Serialize};

/// Prompt handed to an extraction provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionPrompt {
    /// Fixed instruction describing the expected `{ items: [...] }` output.
    pub instruction: String,
    /// The message to extract memories from.
    pub message: String,
    /// Recent conversation history, possibly empty.
    pub context_window: String,
}

/// Errors from provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// No credential was configured for the provider.
    #[error("missing credential: {0}")]
    MissingCredential(String),

    #[error("authentication failed")]
    AuthenticationFailed,

    /// The provider answered with a non-success status.
    #[error("provider returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider's own response envelope could not be decoded.
    #[error("deserialization error: {0}")]
    Deserialization(String),
}
