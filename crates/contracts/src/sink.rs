//! ScoreSink trait - score reporting output interface
//!
//! Defines the abstract interface for score sinks.

use crate::{ContractError, ScoreCard, SubmissionReceipt};

/// Score output trait
///
/// All sink implementations must implement this trait. A submission is a
/// single attempt; sinks never retry on their own.
#[trait_variant::make(ScoreSink: Send)]
pub trait LocalScoreSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Submit a score card
    ///
    /// A rejected submission (e.g. non-2xx response) is returned as a
    /// receipt with `accepted == false`, not as an error.
    ///
    /// # Errors
    /// Returns transport or IO errors (should include context)
    async fn submit(&mut self, card: &ScoreCard) -> Result<SubmissionReceipt, ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
