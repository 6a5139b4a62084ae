//! Extraction job queue.

use strata_types::error::MemoryError;
use strata_types::memory::ExtractionJob;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

/// Hands an extraction job to whatever executes it later.
///
/// `enqueue` must not wait for the job to run; success means "accepted",
/// never "extracted".
pub trait ExtractionQueue: Send + Sync {
    fn enqueue(&self, job: ExtractionJob) -> Result<Uuid, MemoryError>;
}

/// Receiving half handed to the worker pool.
pub type ExtractionReceiver = mpsc::Receiver<ExtractionJob>;

/// Bounded in-process queue backed by a tokio mpsc channel.
#[derive(Clone)]
pub struct ChannelExtractionQueue {
    tx: mpsc::Sender<ExtractionJob>,
}

impl ChannelExtractionQueue {
    /// Create a queue holding at most `capacity` pending jobs.
    pub fn new(capacity: usize) -> (Self, ExtractionReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl ExtractionQueue for ChannelExtractionQueue {
    fn enqueue(&self, job: ExtractionJob) -> Result<Uuid, MemoryError> {
        let id = job.id;
        match self.tx.try_send(job) {
            Ok(()) => {
                tracing::debug!(job_id = %id, "Extraction job enqueued");
                Ok(id)
            }
            Err(TrySendError::Full(_)) => Err(MemoryError::QueueUnavailable(
                "extraction queue is full".to_string(),
            )),
            Err(TrySendError::Closed(_)) => Err(MemoryError::QueueUnavailable(
                "extraction workers have shut down".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_types::memory::ExtractionRequest;

    fn job() -> ExtractionJob {
        ExtractionJob::new(ExtractionRequest {
            owner_id: "u1".to_string(),
            source_chat_id: "c1".to_string(),
            source_message_id: "m1".to_string(),
            text: "hello".to_string(),
            context_window: String::new(),
        })
    }

    #[tokio::test]
    async fn test_enqueue_returns_job_id() {
        let (queue, mut rx) = ChannelExtractionQueue::new(4);
        let job = job();
        let expected = job.id;

        let id = queue.enqueue(job).unwrap();

        assert_eq!(id, expected);
        assert_eq!(rx.recv().await.unwrap().id, expected);
    }

    #[test]
    fn test_full_queue_rejects() {
        let (queue, _rx) = ChannelExtractionQueue::new(1);
        queue.enqueue(job()).unwrap();
        let err = queue.enqueue(job()).unwrap_err();
        assert!(matches!(err, MemoryError::QueueUnavailable(_)));
    }

    #[test]
    fn test_closed_queue_rejects() {
        let (queue, rx) = ChannelExtractionQueue::new(4);
        drop(rx);
        let err = queue.enqueue(job()).unwrap_err();
        assert!(matches!(err, MemoryError::QueueUnavailable(_)));
    }
}
