//! LogSink - logs the score card via tracing

use contracts::{ContractError, ScoreCard, ScoreSink, SubmissionReceipt};
use tracing::{info, instrument};

/// Sink that logs score cards
pub struct LogSink {
    name: String,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ScoreSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "log_sink_submit", skip(self, card), fields(sink = %self.name))]
    async fn submit(&mut self, card: &ScoreCard) -> Result<SubmissionReceipt, ContractError> {
        info!(
            sink = %self.name,
            forward_laptime = card.forward_laptime,
            backward_laptime = card.backward_laptime,
            recorded_at = %card.recorded_at,
            "Score card"
        );
        Ok(SubmissionReceipt {
            sink_name: self.name.clone(),
            accepted: true,
            status: None,
            detail: "logged".into(),
        })
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{LapRecord, TrackDirection};
    use std::time::Duration;

    #[tokio::test]
    async fn test_log_sink_submit() {
        let mut sink = LogSink::new("console");
        let card = ScoreCard::from_laps(
            LapRecord::new(TrackDirection::Forward, Duration::from_secs(60)),
            LapRecord::new(TrackDirection::Backward, Duration::from_secs(61)),
        )
        .unwrap();

        let receipt = sink.submit(&card).await.unwrap();
        assert!(receipt.accepted);
        assert_eq!(receipt.sink_name, "console");
        assert_eq!(sink.name(), "console");
    }
}
