//! Stub providers and in-memory state for handler tests.

use std::path::PathBuf;

use strata_core::job::queue::ExtractionReceiver;
use strata_core::memory::registry::LayerRegistry;
use strata_core::provider::box_embedder::BoxEmbedder;
use strata_core::provider::box_extractor::BoxExtractionProvider;
use strata_core::provider::embedder::Embedder;
use strata_core::provider::extractor::ExtractionProvider;
use strata_core::store::box_layer_store::BoxLayerStore;
use strata_infra::vector::memory::InMemoryLayerStore;
use strata_types::config::StrataConfig;
use strata_types::provider::{ExtractionPrompt, ProviderError};

use crate::state::AppState;

/// Embeds coffee talk along one axis and everything else along another.
pub struct StubEmbedder;

impl Embedder for StubEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts
            .iter()
            .map(|t| {
                if t.to_lowercase().contains("coffee") {
                    vec![1.0, 0.0]
                } else {
                    vec![0.0, 1.0]
                }
            })
            .collect())
    }

    fn model_name(&self) -> &str {
        "stub-embedder"
    }

    fn dimension(&self) -> usize {
        2
    }
}

/// Every embedding call fails as if the provider were down.
pub struct DownEmbedder;

impl Embedder for DownEmbedder {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Err(ProviderError::Transport("connection refused".to_string()))
    }

    fn model_name(&self) -> &str {
        "down-embedder"
    }

    fn dimension(&self) -> usize {
        2
    }
}

/// Always answers with the same raw completion.
pub struct StubExtractor {
    pub raw: String,
}

impl ExtractionProvider for StubExtractor {
    fn name(&self) -> &str {
        "stub-extractor"
    }

    async fn extract_candidates(&self, _prompt: &ExtractionPrompt) -> Result<String, ProviderError> {
        Ok(self.raw.clone())
    }
}

/// State over in-memory stores; keep the receiver alive or submissions fail.
pub fn test_state(raw: &str, config: StrataConfig) -> (AppState, ExtractionReceiver) {
    let registry = LayerRegistry::new(|_| BoxLayerStore::new(InMemoryLayerStore::new()));
    AppState::from_parts(
        registry,
        BoxEmbedder::new(StubEmbedder),
        BoxExtractionProvider::new(StubExtractor { raw: raw.to_string() }),
        config,
        PathBuf::from("."),
    )
}

/// State whose embedder is unreachable.
pub fn failing_embedder_state(config: StrataConfig) -> (AppState, ExtractionReceiver) {
    let registry = LayerRegistry::new(|_| BoxLayerStore::new(InMemoryLayerStore::new()));
    AppState::from_parts(
        registry,
        BoxEmbedder::new(DownEmbedder),
        BoxExtractionProvider::new(StubExtractor { raw: String::new() }),
        config,
        PathBuf::from("."),
    )
}
