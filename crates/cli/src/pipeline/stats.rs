//! Judging run statistics.

use std::time::Duration;

use contracts::{ScoreCard, TrackDirection};
use observability::LapMetricsAggregator;
use scoreboard::ReportSummary;

/// How the run ended
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RunOutcome {
    /// Both laps timed
    #[default]
    Scored,
    /// An attempt ended without a lap
    Aborted {
        direction: TrackDirection,
        reason: String,
    },
    /// Stopped by a signal
    Interrupted,
}

/// One timed attempt
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    pub direction: TrackDirection,
    /// `Ok(lap time)` or the reason the attempt ended
    pub result: Result<Duration, String>,
    pub polls: u64,
}

/// Statistics from a judging run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Attempts in the order they were driven
    pub attempts: Vec<AttemptRecord>,

    /// Final score, when both laps completed
    pub score: Option<ScoreCard>,

    /// Sink answers, when the score was submitted
    pub report: Option<ReportSummary>,

    pub outcome: RunOutcome,

    /// In-memory lap metrics
    pub lap_metrics: LapMetricsAggregator,
}

impl RunStats {
    /// Lap time for one direction, if that attempt completed
    pub fn lap_time(&self, direction: TrackDirection) -> Option<Duration> {
        self.attempts
            .iter()
            .find(|a| a.direction == direction)
            .and_then(|a| a.result.as_ref().ok().copied())
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                      Lap Judge Results                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("🏁 Attempts");
        for (i, attempt) in self.attempts.iter().enumerate() {
            let prefix = if i + 1 == self.attempts.len() { "└─" } else { "├─" };
            match &attempt.result {
                Ok(lap) => println!(
                    "   {} {}: {:.3}s ({} polls)",
                    prefix,
                    attempt.direction,
                    lap.as_secs_f64(),
                    attempt.polls
                ),
                Err(reason) => println!("   {} {}: {}", prefix, attempt.direction, reason),
            }
        }

        match &self.score {
            Some(card) => {
                println!("\n📊 Score");
                println!("   ├─ Forward lap: {:.3}s", card.forward_laptime);
                println!("   └─ Backward lap: {:.3}s", card.backward_laptime);
            }
            None => match &self.outcome {
                RunOutcome::Aborted { direction, reason } => {
                    println!("\n⚠️  No score: {direction} attempt aborted ({reason})");
                }
                RunOutcome::Interrupted => println!("\n⚠️  No score: run interrupted"),
                RunOutcome::Scored => {}
            },
        }

        if let Some(report) = &self.report {
            println!("\n📤 Submission");
            for receipt in &report.receipts {
                let status = receipt
                    .status
                    .map(|s| format!(" [{s}]"))
                    .unwrap_or_default();
                let verdict = if receipt.accepted { "accepted" } else { "rejected" };
                println!("   ├─ {}{}: {}", receipt.sink_name, status, verdict);
            }
            for (sink, error) in &report.failures {
                println!("   ├─ {sink}: failed ({error})");
            }
            println!(
                "   └─ {} of {} sinks accepted",
                report.accepted_count(),
                report.receipts.len() + report.failures.len()
            );
        }

        println!("\n⏱  Duration: {:.2}s", self.duration.as_secs_f64());
        println!("\n{}", self.lap_metrics.summary());
    }
}
