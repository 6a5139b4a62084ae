//! MemoryService -- the two boundary operations of the engine.
//!
//! "Submit extraction" validates, rate-gates and enqueues; it never waits
//! for the extraction itself. "Submit retrieval" runs synchronously and
//! returns ranked memories plus an optional rendered context block.

use std::sync::Arc;

use chrono::Utc;
use strata_types::config::StrataConfig;
use strata_types::error::MemoryError;
use strata_types::layer::Layer;
use strata_types::memory::{
    ExtractionJob, ExtractionReport, ExtractionRequest, RetrievalQuery, RetrievedMemory,
    SubmitExtraction, SubmitOutcome,
};

use crate::job::queue::ExtractionQueue;
use crate::memory::context::ContextFormatter;
use crate::memory::extraction::ExtractionOrchestrator;
use crate::memory::rate_gate::RateGate;
use crate::memory::registry::LayerRegistry;
use crate::memory::retrieval::RetrievalEngine;
use crate::provider::box_embedder::BoxEmbedder;
use crate::provider::box_extractor::BoxExtractionProvider;

pub struct MemoryService {
    registry: Arc<LayerRegistry>,
    orchestrator: Arc<ExtractionOrchestrator>,
    retrieval: RetrievalEngine,
    formatter: ContextFormatter,
    gate: RateGate,
    queue: Arc<dyn ExtractionQueue>,
    max_context_window_chars: usize,
}

impl MemoryService {
    pub fn new(
        registry: Arc<LayerRegistry>,
        provider: Arc<BoxExtractionProvider>,
        embedder: Arc<BoxEmbedder>,
        queue: Arc<dyn ExtractionQueue>,
        config: &StrataConfig,
    ) -> Self {
        let orchestrator = Arc::new(ExtractionOrchestrator::new(
            Arc::clone(&registry),
            provider,
            Arc::clone(&embedder),
            config.memory.item_failure,
        ));
        Self {
            retrieval: RetrievalEngine::new(
                Arc::clone(&registry),
                embedder,
                config.memory.per_layer_limit,
            ),
            formatter: ContextFormatter::new(config.memory.max_context_chars),
            gate: RateGate::new(config.rate_gate.min_interval_secs),
            max_context_window_chars: config.memory.max_context_window_chars,
            registry,
            orchestrator,
            queue,
        }
    }

    /// The orchestrator jobs should run against (shared with the worker pool).
    pub fn orchestrator(&self) -> Arc<ExtractionOrchestrator> {
        Arc::clone(&self.orchestrator)
    }

    pub fn rate_gate(&self) -> &RateGate {
        &self.gate
    }

    /// Accept a message for background extraction.
    ///
    /// Returns as soon as the job is queued (or throttled). The extraction's
    /// own success or failure is never reported here.
    #[tracing::instrument(
        name = "submit_extraction",
        skip(self, payload),
        fields(chat_id = %payload.chat_id, message_id = %payload.message_id)
    )]
    pub fn submit_extraction(&self, payload: SubmitExtraction) -> Result<SubmitOutcome, MemoryError> {
        require("chat_id", &payload.chat_id)?;
        require("message_id", &payload.message_id)?;
        require("text", &payload.text)?;

        let owner_id = ExtractionRequest::resolve_owner(payload.owner_id.as_deref(), &payload.chat_id);

        let now = Utc::now();
        if !self.gate.should_extract_at(&owner_id, now) {
            return Ok(SubmitOutcome::Throttled);
        }

        let request = ExtractionRequest {
            owner_id: owner_id.clone(),
            source_chat_id: payload.chat_id,
            source_message_id: payload.message_id,
            text: payload.text,
            context_window: recent_tail(&payload.context, self.max_context_window_chars),
        };
        match self.queue.enqueue(ExtractionJob::new(request)) {
            Ok(job_id) => Ok(SubmitOutcome::Enqueued { job_id }),
            Err(e) => {
                // Nothing was queued, so the owner keeps their window.
                self.gate.release(&owner_id, now);
                Err(e)
            }
        }
    }

    /// Run an extraction in the caller's task, bypassing queue and gate.
    pub async fn extract_now(&self, mut request: ExtractionRequest) -> Result<ExtractionReport, MemoryError> {
        require("owner_id", &request.owner_id)?;
        require("text", &request.text)?;
        request.context_window = recent_tail(&request.context_window, self.max_context_window_chars);
        self.orchestrator.extract(&request).await
    }

    /// Ranked memories for a query across every layer.
    pub async fn retrieve(&self, query: &RetrievalQuery) -> Result<Vec<RetrievedMemory>, MemoryError> {
        require("owner_id", &query.owner_id)?;
        require("text", &query.text)?;
        self.retrieval.retrieve(query).await
    }

    /// Render retrieved memories with the configured length cap.
    pub fn format_context(&self, memories: &[RetrievedMemory]) -> String {
        self.formatter.format(memories)
    }

    /// Prompt-ready memory block for a query.
    ///
    /// Any failure yields an empty block: callers proceed without memory
    /// enrichment rather than failing.
    pub async fn recall_context(&self, query: &RetrievalQuery) -> String {
        match self.retrieve(query).await {
            Ok(memories) => self.format_context(&memories),
            Err(e) => {
                tracing::warn!(owner_id = %query.owner_id, error = %e, "Recall failed; continuing without memory");
                String::new()
            }
        }
    }

    /// Number of records `owner_id` holds in each layer.
    pub async fn layer_counts(&self, owner_id: &str) -> Result<Vec<(Layer, u64)>, MemoryError> {
        let mut counts = Vec::with_capacity(Layer::COUNT);
        for (layer, store) in self.registry.iter() {
            counts.push((layer, store.count_by_owner(owner_id).await?));
        }
        Ok(counts)
    }
}

fn require(field: &str, value: &str) -> Result<(), MemoryError> {
    if value.trim().is_empty() {
        return Err(MemoryError::InvalidPayload(format!("'{field}' must not be empty")));
    }
    Ok(())
}

/// The last `max` characters of `history`; recent turns matter most.
fn recent_tail(history: &str, max: usize) -> String {
    let len = history.chars().count();
    if len <= max {
        return history.to_string();
    }
    history.chars().skip(len - max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::queue::ChannelExtractionQueue;
    use crate::test_support::{MockLayerStore, ScriptedEmbedder, ScriptedExtractor, mock_registry};
    use tokio::sync::mpsc;

    const REPLY: &str = r#"{"items":[{"layer":"preferences","text":"Loves espresso","abstract":"Likes espresso","tags":["coffee"]}]}"#;

    struct Harness {
        service: MemoryService,
        stores: Vec<MockLayerStore>,
        jobs: mpsc::Receiver<ExtractionJob>,
    }

    fn harness(config: StrataConfig, extractor: ScriptedExtractor, embedder: ScriptedEmbedder) -> Harness {
        let (registry, stores) = mock_registry();
        let (queue, jobs) = ChannelExtractionQueue::new(16);
        let service = MemoryService::new(
            registry,
            Arc::new(BoxExtractionProvider::new(extractor)),
            Arc::new(BoxEmbedder::new(embedder)),
            Arc::new(queue),
            &config,
        );
        Harness { service, stores, jobs }
    }

    fn default_harness() -> Harness {
        harness(
            StrataConfig::default(),
            ScriptedExtractor::responding(REPLY),
            ScriptedEmbedder::new(),
        )
    }

    fn submission(owner: Option<&str>) -> SubmitExtraction {
        SubmitExtraction {
            owner_id: owner.map(str::to_string),
            chat_id: "chat-9".to_string(),
            message_id: "msg-1".to_string(),
            text: "I love espresso".to_string(),
            context: "hi there".to_string(),
        }
    }

    #[tokio::test]
    async fn test_submit_enqueues_without_running() {
        let mut h = default_harness();

        let outcome = h.service.submit_extraction(submission(Some("ana"))).unwrap();

        let SubmitOutcome::Enqueued { job_id } = outcome else {
            panic!("expected Enqueued, got {outcome:?}");
        };
        let job = h.jobs.try_recv().unwrap();
        assert_eq!(job.id, job_id);
        assert_eq!(job.request.owner_id, "ana");
        assert_eq!(job.request.context_window, "hi there");
        // Nothing is written until a worker runs the job.
        assert_eq!(h.stores.iter().map(|s| s.writes()).sum::<usize>(), 0);
    }

    #[tokio::test]
    async fn test_owner_falls_back_to_chat() {
        let mut h = default_harness();
        h.service.submit_extraction(submission(None)).unwrap();
        assert_eq!(h.jobs.try_recv().unwrap().request.owner_id, "chat-9");
    }

    #[tokio::test]
    async fn test_missing_fields_are_invalid_payload() {
        let h = default_harness();
        let mut payload = submission(Some("ana"));
        payload.text = "   ".to_string();

        let err = h.service.submit_extraction(payload).unwrap_err();
        assert!(matches!(err, MemoryError::InvalidPayload(_)));

        let mut payload = submission(Some("ana"));
        payload.message_id = String::new();
        let err = h.service.submit_extraction(payload).unwrap_err();
        assert!(matches!(err, MemoryError::InvalidPayload(_)));
    }

    #[tokio::test]
    async fn test_gate_throttles_second_submission() {
        let mut config = StrataConfig::default();
        config.rate_gate.min_interval_secs = 60;
        let mut h = harness(config, ScriptedExtractor::responding(REPLY), ScriptedEmbedder::new());

        let first = h.service.submit_extraction(submission(Some("ana"))).unwrap();
        let second = h.service.submit_extraction(submission(Some("ana"))).unwrap();
        let other = h.service.submit_extraction(submission(Some("ben"))).unwrap();

        assert!(matches!(first, SubmitOutcome::Enqueued { .. }));
        assert_eq!(second, SubmitOutcome::Throttled);
        assert!(matches!(other, SubmitOutcome::Enqueued { .. }));
        assert!(h.jobs.try_recv().is_ok());
        assert!(h.jobs.try_recv().is_ok());
        assert!(h.jobs.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failed_enqueue_does_not_consume_gate() {
        let mut config = StrataConfig::default();
        config.rate_gate.min_interval_secs = 60;
        let Harness { service, jobs, .. } =
            harness(config, ScriptedExtractor::responding(REPLY), ScriptedEmbedder::new());
        drop(jobs);

        let first = service.submit_extraction(submission(Some("ana"))).unwrap_err();
        assert!(matches!(first, MemoryError::QueueUnavailable(_)));
        assert_eq!(service.rate_gate().tracked(), 0);

        // Still refused by the queue, never throttled by the gate.
        let second = service.submit_extraction(submission(Some("ana")));
        assert!(matches!(second, Err(MemoryError::QueueUnavailable(_))));
    }

    #[tokio::test]
    async fn test_context_window_keeps_recent_tail() {
        let mut config = StrataConfig::default();
        config.memory.max_context_window_chars = 5;
        let mut h = harness(config, ScriptedExtractor::responding(REPLY), ScriptedEmbedder::new());

        let mut payload = submission(Some("ana"));
        payload.context = "old stuff, new!".to_string();
        h.service.submit_extraction(payload).unwrap();

        assert_eq!(h.jobs.try_recv().unwrap().request.context_window, " new!");
    }

    #[tokio::test]
    async fn test_extract_then_recall() {
        let h = default_harness();

        let report = h
            .service
            .extract_now(ExtractionRequest {
                owner_id: "ana".to_string(),
                source_chat_id: "chat-9".to_string(),
                source_message_id: "msg-1".to_string(),
                text: "I love espresso".to_string(),
                context_window: String::new(),
            })
            .await
            .unwrap();
        assert_eq!(report.inserted, 1);

        let query = RetrievalQuery {
            owner_id: "ana".to_string(),
            text: "coffee?".to_string(),
        };
        let memories = h.service.retrieve(&query).await.unwrap();
        assert_eq!(memories.len(), 1);
        assert_eq!(memories[0].layer, Layer::Preferences);

        let context = h.service.recall_context(&query).await;
        assert!(context.contains("[preferences] Likes espresso (tags: coffee)"));

        let counts = h.service.layer_counts("ana").await.unwrap();
        assert_eq!(counts.len(), Layer::COUNT);
        assert!(counts.contains(&(Layer::Preferences, 1)));
        assert!(counts.contains(&(Layer::Identities, 0)));
    }

    #[tokio::test]
    async fn test_recall_failure_yields_empty_context() {
        let h = harness(
            StrataConfig::default(),
            ScriptedExtractor::responding(REPLY),
            ScriptedEmbedder::failing(),
        );
        let query = RetrievalQuery {
            owner_id: "ana".to_string(),
            text: "coffee?".to_string(),
        };

        assert!(h.service.retrieve(&query).await.is_err());
        assert_eq!(h.service.recall_context(&query).await, "");
    }

    #[tokio::test]
    async fn test_retrieve_rejects_empty_query() {
        let h = default_harness();
        let query = RetrievalQuery {
            owner_id: "ana".to_string(),
            text: " ".to_string(),
        };
        let err = h.service.retrieve(&query).await.unwrap_err();
        assert!(matches!(err, MemoryError::InvalidPayload(_)));
    }

    #[test]
    fn test_recent_tail_counts_chars() {
        assert_eq!(recent_tail("héllo", 10), "héllo");
        assert_eq!(recent_tail("héllo", 4), "éllo");
        assert_eq!(recent_tail("abc", 0), "");
    }
}
