//! BoxExtractionProvider -- object-safe wrapper for ExtractionProvider.

use std::future::Future;
use std::pin::Pin;

use strata_types::provider::{ExtractionPrompt, ProviderError};

use super::extractor::ExtractionProvider;

/// Object-safe version of [`ExtractionProvider`] with boxed futures.
pub trait ExtractionProviderDyn: Send + Sync {
    fn name_dyn(&self) -> &str;

    fn extract_candidates_boxed<'a>(
        &'a self,
        prompt: &'a ExtractionPrompt,
    ) -> Pin<Box<dyn Future<Output = Result<String, ProviderError>> + Send + 'a>>;
}

impl<T: ExtractionProvider> ExtractionProviderDyn for T {
    fn name_dyn(&self) -> &str {
        self.name()
    }

    fn extract_candidates_boxed<'a>(
        &'a self,
        prompt: &'a ExtractionPrompt,
    ) -> Pin<Box<dyn Future<Output = Result<String, ProviderError>> + Send + 'a>> {
        Box::pin(self.extract_candidates(prompt))
    }
}

/// Type-erased extraction provider.
pub struct BoxExtractionProvider {
    inner: Box<dyn ExtractionProviderDyn + Send + Sync>,
}

impl BoxExtractionProvider {
    pub fn new<T: ExtractionProvider + 'static>(provider: T) -> Self {
        Self {
            inner: Box::new(provider),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name_dyn()
    }

    pub async fn extract_candidates(
        &self,
        prompt: &ExtractionPrompt,
    ) -> Result<String, ProviderError> {
        self.inner.extract_candidates_boxed(prompt).await
    }
}
