//! Hand-written port doubles shared by the engine's unit tests.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use strata_types::error::RepositoryError;
use strata_types::layer::Layer;
use strata_types::memory::{Fingerprint, MemoryDraft, MemoryPatch, MemoryRecord, ScoredRecord};
use strata_types::provider::{ExtractionPrompt, ProviderError};
use uuid::Uuid;

use crate::memory::fingerprint::fingerprint;
use crate::memory::registry::LayerRegistry;
use crate::provider::embedder::Embedder;
use crate::provider::extractor::ExtractionProvider;
use crate::store::box_layer_store::BoxLayerStore;
use crate::store::layer_store::LayerStore;

pub const TEST_DIMENSION: usize = 4;

#[derive(Default)]
struct MockState {
    records: Mutex<Vec<MemoryRecord>>,
    /// Fixed search answer; when unset, search ranks stored records by dot product.
    search_results: Mutex<Option<Vec<ScoredRecord>>>,
    miss_next_lookup: AtomicBool,
    fail_writes: AtomicBool,
    fail_search: AtomicBool,
    writes: AtomicUsize,
}

/// In-process layer store with failure switches. Clones share state.
#[derive(Clone, Default)]
pub struct MockLayerStore {
    state: Arc<MockState>,
}

impl MockLayerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.records.lock().unwrap().len()
    }

    pub fn records(&self) -> Vec<MemoryRecord> {
        self.state.records.lock().unwrap().clone()
    }

    /// Successful inserts plus successful patches.
    pub fn writes(&self) -> usize {
        self.state.writes.load(Ordering::SeqCst)
    }

    pub fn set_search_results(&self, results: Vec<ScoredRecord>) {
        *self.state.search_results.lock().unwrap() = Some(results);
    }

    pub fn miss_next_lookup(&self) {
        self.state.miss_next_lookup.store(true, Ordering::SeqCst);
    }

    pub fn fail_writes(&self) {
        self.state.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn fail_search(&self) {
        self.state.fail_search.store(true, Ordering::SeqCst);
    }
}

impl LayerStore for MockLayerStore {
    async fn find_by_owner_and_fingerprint(
        &self,
        owner_id: &str,
        fingerprint: Fingerprint,
    ) -> Result<Option<MemoryRecord>, RepositoryError> {
        if self.state.miss_next_lookup.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        let records = self.state.records.lock().unwrap();
        Ok(records
            .iter()
            .find(|r| r.owner_id == owner_id && r.fingerprint == fingerprint)
            .cloned())
    }

    async fn insert(&self, record: &MemoryRecord) -> Result<(), RepositoryError> {
        if self.state.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Query("insert failed".to_string()));
        }
        let mut records = self.state.records.lock().unwrap();
        if records
            .iter()
            .any(|r| r.owner_id == record.owner_id && r.fingerprint == record.fingerprint)
        {
            return Err(RepositoryError::Conflict(record.fingerprint.to_string()));
        }
        records.push(record.clone());
        self.state.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn patch_by_id(&self, id: &Uuid, patch: &MemoryPatch) -> Result<(), RepositoryError> {
        if self.state.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Query("patch failed".to_string()));
        }
        let mut records = self.state.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == *id)
            .ok_or(RepositoryError::NotFound)?;
        record.apply_patch(patch.clone());
        self.state.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn vector_search(
        &self,
        owner_id: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredRecord>, RepositoryError> {
        if self.state.fail_search.load(Ordering::SeqCst) {
            return Err(RepositoryError::Query("search failed".to_string()));
        }
        if let Some(fixed) = self.state.search_results.lock().unwrap().clone() {
            return Ok(fixed);
        }
        let records = self.state.records.lock().unwrap();
        let mut scored: Vec<ScoredRecord> = records
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .map(|r| ScoredRecord {
                score: r.embedding.iter().zip(query).map(|(a, b)| a * b).sum(),
                record: r.clone(),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn count_by_owner(&self, owner_id: &str) -> Result<u64, RepositoryError> {
        let records = self.state.records.lock().unwrap();
        Ok(records.iter().filter(|r| r.owner_id == owner_id).count() as u64)
    }
}

/// Registry of six independent mock stores, plus handles for inspection
/// indexed by [`Layer::index`].
pub fn mock_registry() -> (Arc<LayerRegistry>, Vec<MockLayerStore>) {
    let stores: Vec<MockLayerStore> = Layer::ALL.iter().map(|_| MockLayerStore::new()).collect();
    let registry = LayerRegistry::new(|layer| BoxLayerStore::new(stores[layer.index()].clone()));
    (Arc::new(registry), stores)
}

pub fn draft(layer: Layer, owner_id: &str, text: &str) -> MemoryDraft {
    MemoryDraft {
        layer,
        owner_id: owner_id.to_string(),
        source_chat_id: "chat-1".to_string(),
        source_message_id: "msg-1".to_string(),
        text: text.to_string(),
        abstract_text: text.to_string(),
        tags: Vec::new(),
        embedding: vec![1.0, 0.0, 0.0, 0.0],
    }
}

pub fn record(layer: Layer, owner_id: &str, text: &str) -> MemoryRecord {
    let now = Utc::now();
    MemoryRecord {
        id: Uuid::now_v7(),
        layer,
        owner_id: owner_id.to_string(),
        source_chat_id: "chat-1".to_string(),
        source_message_id: "msg-1".to_string(),
        text: text.to_string(),
        abstract_text: text.to_string(),
        tags: BTreeSet::new(),
        embedding: vec![1.0, 0.0, 0.0, 0.0],
        fingerprint: fingerprint(layer, text),
        created_at: now,
        updated_at: now,
    }
}

pub fn scored(layer: Layer, text: &str, score: f32) -> ScoredRecord {
    ScoredRecord {
        record: record(layer, "u1", text),
        score,
    }
}

/// Embedder returning a fixed unit vector, optionally failing.
#[derive(Clone, Default)]
pub struct ScriptedEmbedder {
    calls: Arc<Mutex<Vec<String>>>,
    fail_all: bool,
    fail_on: Option<String>,
}

impl ScriptedEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    /// Fail only when asked to embed exactly `text`.
    pub fn failing_on(text: &str) -> Self {
        Self {
            fail_on: Some(text.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Embedder for ScriptedEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        self.calls.lock().unwrap().extend(texts.iter().cloned());
        if self.fail_all || texts.iter().any(|t| Some(t) == self.fail_on.as_ref()) {
            return Err(ProviderError::Status {
                status: 503,
                message: "embedding backend down".to_string(),
            });
        }
        Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0, 0.0]).collect())
    }

    fn model_name(&self) -> &str {
        "scripted-embedder"
    }

    fn dimension(&self) -> usize {
        TEST_DIMENSION
    }
}

/// Extraction provider answering every prompt with the same script.
#[derive(Clone)]
pub struct ScriptedExtractor {
    /// `Ok(raw text)` or `Err(http status)`.
    response: Result<String, u16>,
    prompts: Arc<Mutex<Vec<ExtractionPrompt>>>,
    /// Remaining calls that fail with 503 before the script applies.
    transient_failures: Arc<AtomicUsize>,
}

impl ScriptedExtractor {
    pub fn responding(raw: &str) -> Self {
        Self {
            response: Ok(raw.to_string()),
            prompts: Arc::new(Mutex::new(Vec::new())),
            transient_failures: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            response: Err(status),
            prompts: Arc::new(Mutex::new(Vec::new())),
            transient_failures: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fail the first `n` calls with a 503, then follow the script.
    pub fn with_transient_failures(self, n: usize) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn prompts(&self) -> Vec<ExtractionPrompt> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

impl ExtractionProvider for ScriptedExtractor {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn extract_candidates(&self, prompt: &ExtractionPrompt) -> Result<String, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.clone());
        let transient = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if transient {
            return Err(ProviderError::Status {
                status: 503,
                message: "try again".to_string(),
            });
        }
        match &self.response {
            Ok(raw) => Ok(raw.clone()),
            Err(status) => Err(ProviderError::Status {
                status: *status,
                message: "scripted failure".to_string(),
            }),
        }
    }
}
