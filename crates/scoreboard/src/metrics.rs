//! Sink metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::SubmissionReceipt;

/// Outcome label of one submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStatus {
    /// Receiver accepted the score
    Accepted,
    /// Receiver answered but refused the score
    Rejected,
    /// Transport or IO failure
    Error,
}

impl SubmissionStatus {
    pub fn of(result: &Result<SubmissionReceipt, contracts::ContractError>) -> Self {
        match result {
            Ok(receipt) if receipt.accepted => Self::Accepted,
            Ok(_) => Self::Rejected,
            Err(_) => Self::Error,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Error => "error",
        }
    }
}

/// Metrics for a single sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Total accepted submissions
    accepted_count: AtomicU64,
    /// Total rejected submissions
    rejected_count: AtomicU64,
    /// Total submission failures
    failure_count: AtomicU64,
}

impl SinkMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one submission outcome
    pub fn record(&self, sink_name: &str, status: SubmissionStatus) {
        let counter = match status {
            SubmissionStatus::Accepted => &self.accepted_count,
            SubmissionStatus::Rejected => &self.rejected_count,
            SubmissionStatus::Error => &self.failure_count,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!(
            "lap_judge_score_submissions_total",
            "sink" => sink_name.to_string(),
            "status" => status.as_str()
        )
        .increment(1);
    }

    /// Get accepted count
    pub fn accepted_count(&self) -> u64 {
        self.accepted_count.load(Ordering::Relaxed)
    }

    /// Get rejected count
    pub fn rejected_count(&self) -> u64 {
        self.rejected_count.load(Ordering::Relaxed)
    }

    /// Get failure count
    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            accepted_count: self.accepted_count(),
            rejected_count: self.rejected_count(),
            failure_count: self.failure_count(),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub accepted_count: u64,
    pub rejected_count: u64,
    pub failure_count: u64,
}
