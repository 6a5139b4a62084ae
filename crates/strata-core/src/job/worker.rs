//! Extraction worker pool.
//!
//! A single dispatcher receives jobs from the queue and runs each on its own
//! task, with at most `concurrency` running at once. Failures stay inside
//! the pool: retryable errors are retried with exponential back-off up to
//! `max_attempts`, everything else is logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use strata_types::config::WorkerSettings;
use strata_types::memory::ExtractionJob;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use super::queue::ExtractionReceiver;
use crate::memory::extraction::ExtractionOrchestrator;

pub struct ExtractionWorkerPool {
    orchestrator: Arc<ExtractionOrchestrator>,
    receiver: ExtractionReceiver,
    settings: WorkerSettings,
    cancel: CancellationToken,
}

impl ExtractionWorkerPool {
    pub fn new(
        orchestrator: Arc<ExtractionOrchestrator>,
        receiver: ExtractionReceiver,
        settings: WorkerSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            orchestrator,
            receiver,
            settings,
            cancel,
        }
    }

    /// Run the dispatcher on the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Dispatch jobs until the token is cancelled or every queue handle is
    /// dropped, then wait for in-flight jobs to finish.
    pub async fn run(mut self) {
        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let mut in_flight = JoinSet::new();

        tracing::info!(concurrency = self.settings.concurrency, "Extraction workers started");

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
                job = self.receiver.recv() => {
                    let Some(job) = job else { break };
                    let permit = tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                            Ok(permit) => permit,
                            Err(_) => break,
                        },
                    };
                    let orchestrator = Arc::clone(&self.orchestrator);
                    let settings = self.settings.clone();
                    let cancel = self.cancel.clone();
                    in_flight.spawn(async move {
                        run_job(&orchestrator, job, &settings, &cancel).await;
                        drop(permit);
                    });
                }
            }
        }

        // Stop accepting; enqueuers now see a closed queue.
        self.receiver.close();
        while in_flight.join_next().await.is_some() {}
        tracing::info!("Extraction workers stopped");
    }
}

/// Execute one job, retrying retryable failures.
async fn run_job(
    orchestrator: &ExtractionOrchestrator,
    mut job: ExtractionJob,
    settings: &WorkerSettings,
    cancel: &CancellationToken,
) {
    loop {
        match orchestrator.extract(&job.request).await {
            Ok(report) => {
                tracing::debug!(
                    job_id = %job.id,
                    attempt = job.attempt,
                    written = report.written(),
                    "Extraction job finished"
                );
                return;
            }
            Err(e) if e.is_retryable() && job.attempt < settings.max_attempts => {
                let delay = backoff(settings.retry_base_delay_ms, job.attempt);
                tracing::warn!(
                    job_id = %job.id,
                    attempt = job.attempt,
                    delay_ms = millis(delay),
                    error = %e,
                    "Extraction job failed; retrying"
                );
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::warn!(job_id = %job.id, "Retry abandoned on shutdown");
                        return;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
                job.attempt += 1;
            }
            Err(e) => {
                tracing::error!(
                    job_id = %job.id,
                    owner_id = %job.request.owner_id,
                    attempt = job.attempt,
                    error = %e,
                    "Extraction job failed"
                );
                return;
            }
        }
    }
}

/// `base * 2^(attempt - 1)`, saturating.
fn backoff(base_ms: u64, attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor))
}

/// Whole milliseconds in `delay`, saturating at `u64::MAX`.
fn millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::queue::{ChannelExtractionQueue, ExtractionQueue};
    use crate::provider::box_embedder::BoxEmbedder;
    use crate::provider::box_extractor::BoxExtractionProvider;
    use crate::test_support::{MockLayerStore, ScriptedEmbedder, ScriptedExtractor, mock_registry};
    use strata_types::config::ItemFailurePolicy;
    use strata_types::error::MemoryError;
    use strata_types::layer::Layer;
    use strata_types::memory::ExtractionRequest;

    const REPLY: &str = r#"{"items":[{"layer":"preferences","text":"Loves espresso","abstract":"Likes espresso","tags":["coffee"]}]}"#;

    fn settings() -> WorkerSettings {
        WorkerSettings {
            queue_capacity: 8,
            concurrency: 2,
            max_attempts: 3,
            retry_base_delay_ms: 1,
        }
    }

    fn pool(
        extractor: ScriptedExtractor,
        cancel: CancellationToken,
    ) -> (ExtractionWorkerPool, ChannelExtractionQueue, Vec<MockLayerStore>) {
        let (registry, stores) = mock_registry();
        let orchestrator = Arc::new(ExtractionOrchestrator::new(
            registry,
            Arc::new(BoxExtractionProvider::new(extractor)),
            Arc::new(BoxEmbedder::new(ScriptedEmbedder::new())),
            ItemFailurePolicy::Abort,
        ));
        let (queue, rx) = ChannelExtractionQueue::new(settings().queue_capacity);
        (ExtractionWorkerPool::new(orchestrator, rx, settings(), cancel), queue, stores)
    }

    fn job(owner: &str) -> ExtractionJob {
        ExtractionJob::new(ExtractionRequest {
            owner_id: owner.to_string(),
            source_chat_id: "c1".to_string(),
            source_message_id: "m1".to_string(),
            text: "I love espresso".to_string(),
            context_window: String::new(),
        })
    }

    #[tokio::test]
    async fn test_jobs_run_to_completion() {
        let extractor = ScriptedExtractor::responding(REPLY);
        let (pool, queue, stores) = pool(extractor.clone(), CancellationToken::new());
        let handle = pool.spawn();

        queue.enqueue(job("u1")).unwrap();
        queue.enqueue(job("u2")).unwrap();
        drop(queue);
        handle.await.unwrap();

        assert_eq!(extractor.call_count(), 2);
        assert_eq!(stores[Layer::Preferences.index()].len(), 2);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let extractor = ScriptedExtractor::responding(REPLY).with_transient_failures(1);
        let (pool, queue, stores) = pool(extractor.clone(), CancellationToken::new());
        let handle = pool.spawn();

        queue.enqueue(job("u1")).unwrap();
        drop(queue);
        handle.await.unwrap();

        assert_eq!(extractor.call_count(), 2);
        assert_eq!(stores[Layer::Preferences.index()].len(), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let extractor = ScriptedExtractor::failing(503);
        let (pool, queue, stores) = pool(extractor.clone(), CancellationToken::new());
        let handle = pool.spawn();

        queue.enqueue(job("u1")).unwrap();
        drop(queue);
        handle.await.unwrap();

        assert_eq!(extractor.call_count(), 3);
        assert_eq!(stores[Layer::Preferences.index()].len(), 0);
    }

    #[tokio::test]
    async fn test_malformed_reply_not_retried() {
        let extractor = ScriptedExtractor::responding("not json");
        let (pool, queue, _stores) = pool(extractor.clone(), CancellationToken::new());
        let handle = pool.spawn();

        queue.enqueue(job("u1")).unwrap();
        drop(queue);
        handle.await.unwrap();

        assert_eq!(extractor.call_count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_stops_pool_and_closes_queue() {
        let cancel = CancellationToken::new();
        let (pool, queue, _stores) = pool(ScriptedExtractor::responding(REPLY), cancel.clone());
        let handle = pool.spawn();

        cancel.cancel();
        handle.await.unwrap();

        let err = queue.enqueue(job("u1")).unwrap_err();
        assert!(matches!(err, MemoryError::QueueUnavailable(_)));
    }

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(backoff(500, 1), Duration::from_millis(500));
        assert_eq!(backoff(500, 2), Duration::from_millis(1000));
        assert_eq!(backoff(500, 3), Duration::from_millis(2000));
        assert_eq!(backoff(500, 200), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_delay_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(backoff(u64::MAX, 64)), u64::MAX);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }
}
