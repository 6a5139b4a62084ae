//! Application state wiring the memory engine together.
//!
//! AppState holds the service used by both CLI commands and REST handlers.
//! The extraction queue's receiving half is handed back separately so that
//! only `serve` starts workers.

use std::path::PathBuf;
use std::sync::Arc;

use strata_core::job::queue::{ChannelExtractionQueue, ExtractionReceiver};
use strata_core::memory::registry::LayerRegistry;
use strata_core::provider::box_embedder::BoxEmbedder;
use strata_core::provider::box_extractor::BoxExtractionProvider;
use strata_core::service::MemoryService;
use strata_infra::config::{load_config, resolve_data_dir};
use strata_infra::providers::build_providers;
use strata_infra::registry::build_layer_registry;
use strata_types::config::StrataConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub memory_service: Arc<MemoryService>,
    pub config: Arc<StrataConfig>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Load config, open storage and wire providers.
    pub async fn init() -> anyhow::Result<(Self, ExtractionReceiver)> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_config(&data_dir).await;
        let registry = build_layer_registry(&config, &data_dir).await?;
        let (embedder, extractor) = build_providers(&config)?;

        Ok(Self::from_parts(registry, embedder, extractor, config, data_dir))
    }

    /// Assemble state from already-built parts.
    pub fn from_parts(
        registry: LayerRegistry,
        embedder: BoxEmbedder,
        extractor: BoxExtractionProvider,
        config: StrataConfig,
        data_dir: PathBuf,
    ) -> (Self, ExtractionReceiver) {
        let (queue, receiver) = ChannelExtractionQueue::new(config.worker.queue_capacity);
        let memory_service = MemoryService::new(
            Arc::new(registry),
            Arc::new(extractor),
            Arc::new(embedder),
            Arc::new(queue),
            &config,
        );

        let state = Self {
            memory_service: Arc::new(memory_service),
            config: Arc::new(config),
            data_dir,
        };
        (state, receiver)
    }
}
