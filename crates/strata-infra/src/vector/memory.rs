//! DashMap-backed layer store.
//!
//! Holds one layer's records in process. Search is a brute-force cosine
//! scan over the owner's records. Used for `backend = "memory"` and tests;
//! the persistent backend searches through LanceDB instead.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use strata_core::store::layer_store::LayerStore;
use strata_types::error::RepositoryError;
use strata_types::memory::{Fingerprint, MemoryPatch, MemoryRecord, ScoredRecord};
use uuid::Uuid;

type DedupKey = (String, Fingerprint);

#[derive(Default)]
pub struct InMemoryLayerStore {
    records: DashMap<DedupKey, MemoryRecord>,
    /// Record id -> dedup key, for patch-by-id.
    by_id: DashMap<Uuid, DedupKey>,
}

impl InMemoryLayerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LayerStore for InMemoryLayerStore {
    async fn find_by_owner_and_fingerprint(
        &self,
        owner_id: &str,
        fingerprint: Fingerprint,
    ) -> Result<Option<MemoryRecord>, RepositoryError> {
        Ok(self
            .records
            .get(&(owner_id.to_string(), fingerprint))
            .map(|r| r.value().clone()))
    }

    async fn insert(&self, record: &MemoryRecord) -> Result<(), RepositoryError> {
        let key = (record.owner_id.clone(), record.fingerprint);
        match self.records.entry(key.clone()) {
            Entry::Occupied(_) => Err(RepositoryError::Conflict(format!(
                "owner '{}' already has fingerprint {}",
                record.owner_id, record.fingerprint
            ))),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                self.by_id.insert(record.id, key);
                Ok(())
            }
        }
    }

    async fn patch_by_id(&self, id: &Uuid, patch: &MemoryPatch) -> Result<(), RepositoryError> {
        let key = self
            .by_id
            .get(id)
            .map(|k| k.value().clone())
            .ok_or(RepositoryError::NotFound)?;
        let mut record = self.records.get_mut(&key).ok_or(RepositoryError::NotFound)?;
        record.apply_patch(patch.clone());
        Ok(())
    }

    async fn vector_search(
        &self,
        owner_id: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredRecord>, RepositoryError> {
        let mut scored: Vec<ScoredRecord> = self
            .records
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .map(|r| ScoredRecord {
                score: cosine_similarity(&r.embedding, query),
                record: r.value().clone(),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn count_by_owner(&self, owner_id: &str) -> Result<u64, RepositoryError> {
        Ok(self.records.iter().filter(|r| r.owner_id == owner_id).count() as u64)
    }
}

/// Cosine similarity in `[-1, 1]`.
///
/// Mismatched lengths compare over the shorter prefix. A zero-norm vector
/// scores `0.0` against anything.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}
