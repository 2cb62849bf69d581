//! Track planning: which direction is driven first, and from where.

use contracts::{Pose, TrackConfig, TrackDirection};
use rand::Rng;

/// One attempt of a judging run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedAttempt {
    pub direction: TrackDirection,
    pub pose: Pose,
}

/// Orders the two track directions for a run
#[derive(Debug, Clone)]
pub struct TrackPlanner {
    tracks: TrackConfig,
}

impl TrackPlanner {
    pub fn new(tracks: TrackConfig) -> Self {
        Self { tracks }
    }

    /// Plan both attempts using the thread RNG
    pub fn plan(&self) -> [PlannedAttempt; 2] {
        self.plan_with(&mut rand::rng())
    }

    /// Plan both attempts; the first direction is random unless
    /// `randomize_order` is off, in which case forward goes first.
    pub fn plan_with<R: Rng>(&self, rng: &mut R) -> [PlannedAttempt; 2] {
        let first = if self.tracks.randomize_order && rng.random_bool(0.5) {
            TrackDirection::Backward
        } else {
            TrackDirection::Forward
        };
        [first, first.opposite()].map(|direction| PlannedAttempt {
            direction,
            pose: self.tracks.pose(direction),
        })
    }
}
