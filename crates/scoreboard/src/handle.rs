//! SinkHandle - owns a sink on its own worker task

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{ContractError, ScoreCard, ScoreSink, SubmissionReceipt};

use crate::error::{Result, ScoreboardError};
use crate::metrics::{SinkMetrics, SubmissionStatus};

type Reply = oneshot::Sender<std::result::Result<SubmissionReceipt, ContractError>>;

/// Handle to a running sink worker
pub struct SinkHandle {
    /// Sink name
    name: String,
    /// Channel to send cards to worker
    tx: mpsc::Sender<(ScoreCard, Reply)>,
    /// Shared metrics
    metrics: Arc<SinkMetrics>,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Create a new SinkHandle and spawn the worker task
    pub fn spawn<S: ScoreSink + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            sink_worker(sink, rx, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx,
            metrics,
            worker_handle,
        }
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Submit a card and wait for the sink's answer
    pub async fn submit(&self, card: ScoreCard) -> Result<SubmissionReceipt> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send((card, reply_tx))
            .await
            .map_err(|_| self.worker_stopped())?;

        let receipt = reply_rx.await.map_err(|_| self.worker_stopped())??;
        Ok(receipt)
    }

    fn worker_stopped(&self) -> ScoreboardError {
        error!(sink = %self.name, "Sink worker closed unexpectedly");
        ScoreboardError::WorkerStopped {
            sink_name: self.name.clone(),
        }
    }

    /// Shutdown the sink worker gracefully
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        // Closing the queue lets the worker drain and close the sink
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }
}

/// Worker task that submits cards to the sink one at a time
#[instrument(
    name = "sink_worker_loop",
    skip(sink, rx, metrics),
    fields(sink = %name)
)]
async fn sink_worker<S: ScoreSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<(ScoreCard, Reply)>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!(sink = %name, "Sink worker started");

    while let Some((card, reply)) = rx.recv().await {
        let result = sink.submit(&card).await;
        metrics.record(&name, SubmissionStatus::of(&result));

        if let Err(e) = &result {
            error!(sink = %name, error = %e, "Submission failed");
        }
        if reply.send(result).is_err() {
            warn!(sink = %name, "Submitter went away before the answer");
        }
    }

    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "Close failed on shutdown");
    }

    debug!(sink = %name, "Sink worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{LapRecord, TrackDirection};
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::time::Duration;

    /// Mock sink for testing
    struct MockSink {
        name: String,
        submit_count: Arc<AtomicU64>,
        closed: Arc<AtomicBool>,
        outcome: Outcome,
    }

    #[derive(Clone, Copy)]
    enum Outcome {
        Accept,
        Reject,
        Fail,
    }

    impl MockSink {
        fn new(name: &str, outcome: Outcome) -> Self {
            Self {
                name: name.to_string(),
                submit_count: Arc::default(),
                closed: Arc::default(),
                outcome,
            }
        }
    }

    impl ScoreSink for MockSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn submit(
            &mut self,
            _card: &ScoreCard,
        ) -> std::result::Result<SubmissionReceipt, ContractError> {
            self.submit_count.fetch_add(1, Ordering::Relaxed);
            let accepted = match self.outcome {
                Outcome::Accept => true,
                Outcome::Reject => false,
                Outcome::Fail => return Err(ContractError::sink_write(&self.name, "mock failure")),
            };
            Ok(SubmissionReceipt {
                sink_name: self.name.clone(),
                accepted,
                status: Some(if accepted { 200 } else { 403 }),
                detail: String::new(),
            })
        }

        async fn close(&mut self) -> std::result::Result<(), ContractError> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    fn card() -> ScoreCard {
        ScoreCard::from_laps(
            LapRecord::new(TrackDirection::Forward, Duration::from_secs(60)),
            LapRecord::new(TrackDirection::Backward, Duration::from_secs(65)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_sink_handle_basic() {
        let sink = MockSink::new("test", Outcome::Accept);
        let submit_count = Arc::clone(&sink.submit_count);
        let closed = Arc::clone(&sink.closed);

        let handle = SinkHandle::spawn(sink, 4);
        for _ in 0..3 {
            assert!(handle.submit(card()).await.unwrap().accepted);
        }
        assert_eq!(handle.metrics().accepted_count(), 3);

        handle.shutdown().await;
        assert_eq!(submit_count.load(Ordering::Relaxed), 3);
        assert!(closed.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn test_rejection_is_not_an_error() {
        let handle = SinkHandle::spawn(MockSink::new("strict", Outcome::Reject), 4);

        let receipt = handle.submit(card()).await.unwrap();
        assert!(!receipt.accepted);
        assert_eq!(receipt.status, Some(403));
        assert_eq!(handle.metrics().rejected_count(), 1);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_failure_keeps_worker_alive() {
        let handle = SinkHandle::spawn(MockSink::new("failing", Outcome::Fail), 4);

        for _ in 0..2 {
            let err = handle.submit(card()).await.unwrap_err();
            assert!(matches!(err, ScoreboardError::Contract(_)));
        }
        assert_eq!(handle.metrics().failure_count(), 2);

        handle.shutdown().await;
    }
}
