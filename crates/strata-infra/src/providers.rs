//! Provider wiring from configuration.
//!
//! A provider whose credential is missing is replaced by [`Unconfigured`],
//! which fails every call with `MissingCredential`. Commands that never call
//! a provider (layer counts, health) keep working without keys.

use strata_core::provider::box_embedder::BoxEmbedder;
use strata_core::provider::box_extractor::BoxExtractionProvider;
use strata_core::provider::embedder::Embedder;
use strata_core::provider::extractor::ExtractionProvider;
use strata_types::config::StrataConfig;
use strata_types::error::MemoryError;
use strata_types::provider::{ExtractionPrompt, ProviderError};

use crate::embedding::openai::OpenAiEmbedder;
use crate::llm::openai_compat::OpenAiExtractionProvider;
use crate::secret::resolve_api_key_with;

/// Stand-in for a provider with no credential.
pub struct Unconfigured {
    name: String,
    api_key_env: String,
    dimension: usize,
}

impl Unconfigured {
    pub fn new(name: impl Into<String>, api_key_env: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            api_key_env: api_key_env.into(),
            dimension,
        }
    }

    fn missing(&self) -> ProviderError {
        ProviderError::MissingCredential(format!("set {}", self.api_key_env))
    }
}

impl Embedder for Unconfigured {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Err(self.missing())
    }

    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

impl ExtractionProvider for Unconfigured {
    fn name(&self) -> &str {
        &self.name
    }

    async fn extract_candidates(&self, _prompt: &ExtractionPrompt) -> Result<String, ProviderError> {
        Err(self.missing())
    }
}

/// Build the embedding and extraction providers named in `config`.
pub fn build_providers(
    config: &StrataConfig,
) -> Result<(BoxEmbedder, BoxExtractionProvider), MemoryError> {
    build_providers_with(config, |key| std::env::var(key).ok())
}

/// [`build_providers`] with an injectable environment lookup.
pub fn build_providers_with(
    config: &StrataConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(BoxEmbedder, BoxExtractionProvider), MemoryError> {
    let embedding = &config.embedding;
    let embedder = match resolve_api_key_with(&embedding.api_key_env, &lookup) {
        Ok(key) => BoxEmbedder::new(OpenAiEmbedder::new(embedding, key)?),
        Err(e) => {
            tracing::warn!(error = %e, "embedding provider has no credential");
            BoxEmbedder::new(Unconfigured::new(
                embedding.model.clone(),
                embedding.api_key_env.clone(),
                embedding.dimension,
            ))
        }
    };

    let extraction = &config.extraction;
    let extractor = match resolve_api_key_with(&extraction.api_key_env, &lookup) {
        Ok(key) => BoxExtractionProvider::new(OpenAiExtractionProvider::new(extraction, key)),
        Err(e) => {
            tracing::warn!(error = %e, "extraction provider has no credential");
            BoxExtractionProvider::new(Unconfigured::new(
                "openai-compatible",
                extraction.api_key_env.clone(),
                0,
            ))
        }
    };

    Ok((embedder, extractor))
}
