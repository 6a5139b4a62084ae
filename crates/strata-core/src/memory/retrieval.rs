//! Retrieval engine: fan out one similarity search per layer, then rank-merge.

use std::sync::Arc;

use futures_util::future::join_all;
use strata_types::error::MemoryError;
use strata_types::layer::Layer;
use strata_types::memory::{RetrievalQuery, RetrievedMemory};

use super::registry::LayerRegistry;
use crate::provider::box_embedder::BoxEmbedder;

/// Default number of matches each layer contributes.
pub const DEFAULT_PER_LAYER_LIMIT: usize = 3;

pub struct RetrievalEngine {
    registry: Arc<LayerRegistry>,
    embedder: Arc<BoxEmbedder>,
    per_layer_limit: usize,
}

impl RetrievalEngine {
    pub fn new(registry: Arc<LayerRegistry>, embedder: Arc<BoxEmbedder>, per_layer_limit: usize) -> Self {
        Self {
            registry,
            embedder,
            per_layer_limit,
        }
    }

    /// Upper bound on the merged result length.
    pub fn max_results(&self) -> usize {
        self.per_layer_limit * Layer::COUNT
    }

    /// Embed the query once, search every layer concurrently, and return all
    /// matches sorted by score, highest first.
    ///
    /// All searches run to completion before the merge. Retrieval is
    /// all-or-nothing: an embedding failure, or any single layer's search
    /// failure, fails the whole call.
    #[tracing::instrument(
        name = "retrieve_memories",
        skip(self, query),
        fields(owner_id = %query.owner_id)
    )]
    pub async fn retrieve(&self, query: &RetrievalQuery) -> Result<Vec<RetrievedMemory>, MemoryError> {
        let vector = self
            .embedder
            .embed_one(&query.text)
            .await
            .map_err(|e| MemoryError::from_provider(self.embedder.model_name(), e))?;

        let searches = self.registry.iter().map(|(layer, store)| {
            let vector = &vector;
            async move {
                let result = store
                    .vector_search(&query.owner_id, vector, self.per_layer_limit)
                    .await;
                (layer, result)
            }
        });
        let per_layer = join_all(searches).await;

        let mut merged = Vec::with_capacity(self.max_results());
        let mut first_error = None;
        for (layer, result) in per_layer {
            match result {
                Ok(hits) => merged.extend(
                    hits.into_iter()
                        .take(self.per_layer_limit)
                        .map(|hit| RetrievedMemory::from_scored(layer, hit)),
                ),
                Err(e) => {
                    tracing::error!(layer = %layer, error = %e, "Layer search failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e.into());
        }

        // Stable sort: equal scores keep registry order.
        merged.sort_by(|a, b| b.score.total_cmp(&a.score));

        tracing::debug!(results = merged.len(), "Retrieval complete");
        Ok(merged)
    }
}
