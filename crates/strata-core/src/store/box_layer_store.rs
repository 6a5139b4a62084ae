//! BoxLayerStore -- object-safe dynamic dispatch wrapper for LayerStore.
//!
//! Same blanket-impl pattern as [`BoxEmbedder`](crate::provider::box_embedder::BoxEmbedder).

use std::future::Future;
use std::pin::Pin;

use strata_types::error::RepositoryError;
use strata_types::memory::{Fingerprint, MemoryPatch, MemoryRecord, ScoredRecord};
use uuid::Uuid;

use super::layer_store::LayerStore;

/// Object-safe version of [`LayerStore`] with boxed futures.
pub trait LayerStoreDyn: Send + Sync {
    fn find_by_owner_and_fingerprint_boxed<'a>(
        &'a self,
        owner_id: &'a str,
        fingerprint: Fingerprint,
    ) -> Pin<Box<dyn Future<Output = Result<Option<MemoryRecord>, RepositoryError>> + Send + 'a>>;

    fn insert_boxed<'a>(
        &'a self,
        record: &'a MemoryRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), RepositoryError>> + Send + 'a>>;

    fn patch_by_id_boxed<'a>(
        &'a self,
        id: &'a Uuid,
        patch: &'a MemoryPatch,
    ) -> Pin<Box<dyn Future<Output = Result<(), RepositoryError>> + Send + 'a>>;

    fn vector_search_boxed<'a>(
        &'a self,
        owner_id: &'a str,
        query: &'a [f32],
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ScoredRecord>, RepositoryError>> + Send + 'a>>;

    fn count_by_owner_boxed<'a>(
        &'a self,
        owner_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<u64, RepositoryError>> + Send + 'a>>;
}

impl<T: LayerStore> LayerStoreDyn for T {
    fn find_by_owner_and_fingerprint_boxed<'a>(
        &'a self,
        owner_id: &'a str,
        fingerprint: Fingerprint,
    ) -> Pin<Box<dyn Future<Output = Result<Option<MemoryRecord>, RepositoryError>> + Send + 'a>>
    {
        Box::pin(self.find_by_owner_and_fingerprint(owner_id, fingerprint))
    }

    fn insert_boxed<'a>(
        &'a self,
        record: &'a MemoryRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), RepositoryError>> + Send + 'a>> {
        Box::pin(self.insert(record))
    }

    fn patch_by_id_boxed<'a>(
        &'a self,
        id: &'a Uuid,
        patch: &'a MemoryPatch,
    ) -> Pin<Box<dyn Future<Output = Result<(), RepositoryError>> + Send + 'a>> {
        Box::pin(self.patch_by_id(id, patch))
    }

    fn vector_search_boxed<'a>(
        &'a self,
        owner_id: &'a str,
        query: &'a [f32],
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ScoredRecord>, RepositoryError>> + Send + 'a>>
    {
        Box::pin(self.vector_search(owner_id, query, limit))
    }

    fn count_by_owner_boxed<'a>(
        &'a self,
        owner_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<u64, RepositoryError>> + Send + 'a>> {
        Box::pin(self.count_by_owner(owner_id))
    }
}

/// Type-erased layer store, so the registry can hold SQLite and in-memory
/// collections behind one type.
pub struct BoxLayerStore {
    inner: Box<dyn LayerStoreDyn + Send + Sync>,
}

impl BoxLayerStore {
    /// Wrap a concrete `LayerStore` in a type-erased box.
    pub fn new<T: LayerStore + 'static>(store: T) -> Self {
        Self {
            inner: Box::new(store),
        }
    }

    pub async fn find_by_owner_and_fingerprint(
        &self,
        owner_id: &str,
        fingerprint: Fingerprint,
    ) -> Result<Option<MemoryRecord>, RepositoryError> {
        self.inner
            .find_by_owner_and_fingerprint_boxed(owner_id, fingerprint)
            .await
    }

    pub async fn insert(&self, record: &MemoryRecord) -> Result<(), RepositoryError> {
        self.inner.insert_boxed(record).await
    }

    pub async fn patch_by_id(&self, id: &Uuid, patch: &MemoryPatch) -> Result<(), RepositoryError> {
        self.inner.patch_by_id_boxed(id, patch).await
    }

    pub async fn vector_search(
        &self,
        owner_id: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredRecord>, RepositoryError> {
        self.inner.vector_search_boxed(owner_id, query, limit).await
    }

    pub async fn count_by_owner(&self, owner_id: &str) -> Result<u64, RepositoryError> {
        self.inner.count_by_owner_boxed(owner_id).await
    }
}
