//! Track geometry: starting poses and driving directions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Driving direction around the circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackDirection {
    Forward,
    Backward,
}

impl TrackDirection {
    /// The other direction
    pub const fn opposite(self) -> Self {
        match self {
            TrackDirection::Forward => TrackDirection::Backward,
            TrackDirection::Backward => TrackDirection::Forward,
        }
    }

    /// Stable label for logs and metric labels
    pub const fn as_str(self) -> &'static str {
        match self {
            TrackDirection::Forward => "forward",
            TrackDirection::Backward => "backward",
        }
    }
}

impl fmt::Display for TrackDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Absolute pose in the simulated world frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    /// Position (x, y, z) in meters
    pub position: [f64; 3],

    /// Euler angles (alpha, beta, gamma) in radians
    pub orientation: [f64; 3],
}

impl Pose {
    /// Build a pose from a position and a yaw given in degrees
    pub fn with_yaw_degrees(position: [f64; 3], yaw_deg: f64) -> Self {
        Self {
            position,
            orientation: [0.0, 0.0, yaw_deg.to_radians()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposite() {
        assert_eq!(TrackDirection::Forward.opposite(), TrackDirection::Backward);
        assert_eq!(
            TrackDirection::Backward.opposite().opposite(),
            TrackDirection::Backward
        );
    }

    #[test]
    fn test_yaw_degrees() {
        let pose = Pose::with_yaw_degrees([2.25, 33.5, -13.5], -150.0);
        assert!((pose.orientation[2] + 150.0_f64.to_radians()).abs() < 1e-12);
        assert_eq!(pose.orientation[0], 0.0);
    }
}
