//! Lap results and score submissions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::TrackDirection;

/// One completed lap
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LapRecord {
    /// Direction the lap was driven in
    pub direction: TrackDirection,

    /// Lap time in seconds
    pub duration_s: f64,
}

impl LapRecord {
    pub fn new(direction: TrackDirection, duration: Duration) -> Self {
        Self {
            direction,
            duration_s: duration.as_secs_f64(),
        }
    }
}

/// Final score of a judging run: one lap per direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    /// Lap time driving the forward direction (seconds)
    pub forward_laptime: f64,

    /// Lap time driving the backward direction (seconds)
    pub backward_laptime: f64,

    /// When the card was produced
    pub recorded_at: DateTime<Utc>,
}

impl ScoreCard {
    /// Build a card from two laps, in whichever order they were driven.
    ///
    /// Returns `None` unless exactly one lap per direction is given.
    pub fn from_laps(first: LapRecord, second: LapRecord) -> Option<Self> {
        let (forward, backward) = match (first.direction, second.direction) {
            (TrackDirection::Forward, TrackDirection::Backward) => (first, second),
            (TrackDirection::Backward, TrackDirection::Forward) => (second, first),
            _ => return None,
        };

        Some(Self {
            forward_laptime: forward.duration_s,
            backward_laptime: backward.duration_s,
            recorded_at: Utc::now(),
        })
    }
}

/// Outcome of one sink's submission attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    /// Sink name
    pub sink_name: String,

    /// Whether the receiving side accepted the score
    pub accepted: bool,

    /// Transport status (HTTP status code for HTTP sinks)
    pub status: Option<u16>,

    /// Human-readable detail (response body, file path, ...)
    pub detail: String,
}
