//! Extraction provider trait.
//!
//! An extraction provider turns a message plus a context window into raw
//! text that is expected to parse as `{ "items": [...] }`. Parsing is the
//! caller's job: a provider that returns non-JSON text has not failed.

use strata_types::provider::{ExtractionPrompt, ProviderError};

/// Trait for the chat-completion model used to extract candidate memories.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
/// Implementations live in strata-infra.
pub trait ExtractionProvider: Send + Sync {
    /// Provider name for logs and error messages (e.g., "openai-compatible").
    fn name(&self) -> &str;

    /// Send the prompt and return the assistant's raw text.
    fn extract_candidates(
        &self,
        prompt: &ExtractionPrompt,
    ) -> impl std::future::Future<Output = Result<String, ProviderError>> + Send;
}
