//! Builds the layer registry for the configured storage backend.

use std::path::Path;

use strata_core::memory::registry::LayerRegistry;
use strata_core::store::box_layer_store::BoxLayerStore;
use strata_types::config::{StorageBackend, StrataConfig};
use strata_types::error::{MemoryError, RepositoryError};

use strata_types::layer::Layer;

use crate::config::{database_path, vector_store_path};
use crate::sqlite::layer_store::SqliteLayerStore;
use crate::sqlite::pool::{DatabasePool, database_url};
use crate::vector::index::LanceLayerIndex;
use crate::vector::lance::LanceVectorStore;
use crate::vector::memory::InMemoryLayerStore;

/// Open one store per layer.
///
/// With the SQLite backend all six layers share one database file (one table
/// each) and one LanceDB directory (one vector table each); missing
/// directories are created.
pub async fn build_layer_registry(
    config: &StrataConfig,
    data_dir: &Path,
) -> Result<LayerRegistry, MemoryError> {
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::info!("using in-memory layer stores");
            Ok(LayerRegistry::new(|_| BoxLayerStore::new(InMemoryLayerStore::new())))
        }
        StorageBackend::Sqlite => {
            let path = database_path(data_dir, config);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    MemoryError::Configuration(format!(
                        "cannot create data directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }

            let pool = DatabasePool::new(&database_url(&path)).await.map_err(|e| {
                tracing::error!(path = %path.display(), error = %e, "failed to open database");
                MemoryError::Storage(RepositoryError::Connection)
            })?;
            tracing::info!(path = %path.display(), "opened layer database");

            let vector_path = vector_store_path(data_dir, config);
            let vectors = LanceVectorStore::new(&vector_path).await.map_err(|e| {
                tracing::error!(path = %vector_path.display(), error = %e, "failed to open vector store");
                MemoryError::Storage(RepositoryError::Connection)
            })?;

            let mut indexes = Vec::with_capacity(Layer::COUNT);
            for layer in Layer::ALL {
                indexes.push(LanceLayerIndex::open(&vectors, layer, config.embedding.dimension).await?);
            }
            tracing::info!(path = %vector_path.display(), "opened vector indexes");

            let mut indexes = indexes.into_iter();
            LayerRegistry::try_new(|layer| {
                let index = indexes.next().ok_or_else(|| {
                    MemoryError::Configuration(format!("no vector index opened for {layer}"))
                })?;
                Ok(BoxLayerStore::new(SqliteLayerStore::new(pool.clone(), layer, index)))
            })
        }
    }
}
