//! ScoreReporter - fans a score card out to every configured sink

use futures_util::future::join_all;
use tracing::{info, instrument, warn};

use contracts::{ScoreCard, SinkConfig, SinkType, SubmissionReceipt};

use crate::error::{Result, ScoreboardError};
use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::{FileSink, HttpScoreSink, LogSink};

/// A score card goes out once per run, so sink queues stay tiny.
const SINK_QUEUE_CAPACITY: usize = 4;

/// Result of reporting one card to all sinks
#[derive(Debug, Clone, Default)]
pub struct ReportSummary {
    /// Answers from sinks that were reached
    pub receipts: Vec<SubmissionReceipt>,
    /// `(sink name, error)` for sinks that failed outright
    pub failures: Vec<(String, String)>,
}

impl ReportSummary {
    /// Number of sinks that accepted the card
    pub fn accepted_count(&self) -> usize {
        self.receipts.iter().filter(|r| r.accepted).count()
    }

    /// True when every sink accepted
    pub fn all_accepted(&self) -> bool {
        self.failures.is_empty() && self.receipts.iter().all(|r| r.accepted)
    }

    /// Receipts the receiving side refused
    pub fn rejected(&self) -> impl Iterator<Item = &SubmissionReceipt> {
        self.receipts.iter().filter(|r| !r.accepted)
    }
}

/// Create a SinkHandle from configuration
#[instrument(
    name = "scoreboard_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle> {
    match config.sink_type {
        SinkType::Log => Ok(SinkHandle::spawn(
            LogSink::new(&config.name),
            SINK_QUEUE_CAPACITY,
        )),
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| ScoreboardError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, SINK_QUEUE_CAPACITY))
        }
        SinkType::Http => {
            let sink = HttpScoreSink::from_params(&config.name, &config.params)
                .map_err(|e| ScoreboardError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, SINK_QUEUE_CAPACITY))
        }
    }
}

/// Fan-out over score sinks
pub struct ScoreReporter {
    handles: Vec<SinkHandle>,
}

impl ScoreReporter {
    /// Build one worker per configured sink.
    ///
    /// Must be called inside a tokio runtime.
    #[instrument(name = "scoreboard_create", skip(configs), fields(sink_count = configs.len()))]
    pub fn from_configs(configs: &[SinkConfig]) -> Result<Self> {
        // On error, dropping the handles built so far closes their queues
        // and the detached workers close their sinks.
        let handles = configs
            .iter()
            .map(create_sink_handle)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { handles })
    }

    /// Create a reporter with custom sink handles (for testing)
    pub fn with_handles(handles: Vec<SinkHandle>) -> Self {
        Self { handles }
    }

    /// Names of the configured sinks
    pub fn sink_names(&self) -> Vec<&str> {
        self.handles.iter().map(SinkHandle::name).collect()
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Submit the card to every sink concurrently.
    ///
    /// A failing sink is recorded in the summary and never stops the others.
    #[instrument(
        name = "scoreboard_report",
        skip(self, card),
        fields(
            forward_laptime = card.forward_laptime,
            backward_laptime = card.backward_laptime
        )
    )]
    pub async fn report(&self, card: &ScoreCard) -> ReportSummary {
        let results = join_all(self.handles.iter().map(|h| h.submit(card.clone()))).await;

        let mut summary = ReportSummary::default();
        for (handle, result) in self.handles.iter().zip(results) {
            match result {
                Ok(receipt) => summary.receipts.push(receipt),
                Err(e) => {
                    warn!(sink = %handle.name(), error = %e, "Score not delivered");
                    summary.failures.push((handle.name().to_string(), e.to_string()));
                }
            }
        }

        info!(
            sinks = self.handles.len(),
            accepted = summary.accepted_count(),
            failed = summary.failures.len(),
            "Score reported"
        );
        summary
    }

    /// Close every sink
    #[instrument(name = "scoreboard_shutdown", skip(self))]
    pub async fn shutdown(self) {
        join_all(self.handles.into_iter().map(SinkHandle::shutdown)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{LapRecord, TrackDirection};
    use std::collections::HashMap;
    use std::time::Duration;

    fn card() -> ScoreCard {
        ScoreCard::from_laps(
            LapRecord::new(TrackDirection::Forward, Duration::from_secs(60)),
            LapRecord::new(TrackDirection::Backward, Duration::from_secs(61)),
        )
        .unwrap()
    }

    fn sink(name: &str, sink_type: SinkType, params: &[(&str, String)]) -> SinkConfig {
        SinkConfig {
            name: name.to_string(),
            sink_type,
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[tokio::test]
    async fn test_fanout_isolates_failing_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.jsonl");

        // Nothing listens on this port
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let dead = format!("http://{}/saveData.php", listener.local_addr().unwrap());
        drop(listener);

        let configs = vec![
            sink("console", SinkType::Log, &[]),
            sink("archive", SinkType::File, &[("path", path.display().to_string())]),
            sink(
                "leaderboard",
                SinkType::Http,
                &[("endpoint", dead), ("team_code", "123456789".into())],
            ),
        ];

        let reporter = ScoreReporter::from_configs(&configs).unwrap();
        assert_eq!(reporter.sink_names(), ["console", "archive", "leaderboard"]);

        let summary = reporter.report(&card()).await;
        assert_eq!(summary.accepted_count(), 2);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].0, "leaderboard");
        assert!(!summary.all_accepted());

        let metrics = reporter.metrics();
        assert_eq!(metrics[2].1.failure_count, 1);

        reporter.shutdown().await;
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_sink_config() {
        let configs = vec![sink("archive", SinkType::File, &[])];
        let err = ScoreReporter::from_configs(&configs).err().unwrap();
        assert!(matches!(err, ScoreboardError::SinkCreation { .. }));
    }

    #[tokio::test]
    async fn test_no_sinks() {
        let reporter = ScoreReporter::with_handles(Vec::new());
        let summary = reporter.report(&card()).await;
        assert!(summary.all_accepted());
        assert_eq!(summary.accepted_count(), 0);
        reporter.shutdown().await;
    }
}
