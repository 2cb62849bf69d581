//! Simulation control interface
//!
//! Defines the operations the judge and driving policies use on the
//! simulator, so the timing core never touches a concrete connection.

use contracts::Pose;
use serde::{Deserialize, Serialize};

use crate::camera::CameraFrame;
use crate::error::Result;

/// Vehicle state as reported by the simulator
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CarState {
    /// Current steering angle (rad)
    pub steering: f64,

    /// Linear velocity (m/s)
    pub linear_velocity: f64,
}

impl CarState {
    /// Derive linear velocity from the rear wheels' angular velocities (rad/s)
    pub fn from_rear_wheels(steering: f64, rear_left: f64, rear_right: f64, wheel_radius: f64) -> Self {
        Self {
            steering,
            linear_velocity: (rear_left + rear_right) / 2.0 * wheel_radius,
        }
    }
}

/// Simulator trait
///
/// Blocking by design: it is driven from the lap timer's polling loop.
///
/// # Example
///
/// ```ignore
/// sim.start()?;
/// sim.reset_car_pose(&blueprint.tracks.forward)?;
/// sim.set_car_velocity(5.0)?;
/// let frame = sim.get_image()?;
/// ```
pub trait Simulator: Send {
    /// Start the simulation
    fn start(&mut self) -> Result<()>;

    /// Stop the simulation
    fn stop(&mut self) -> Result<()>;

    /// Steering command (rad), clamped to the vehicle limit
    ///
    /// Only forwarded when it differs from the previous command.
    fn set_car_steering(&mut self, steering: f64) -> Result<()>;

    /// Velocity command (m/s), capped at the vehicle limit
    ///
    /// Only forwarded when it differs from the previous command.
    fn set_car_velocity(&mut self, velocity: f64) -> Result<()>;

    /// Current camera frame
    fn get_image(&mut self) -> Result<CameraFrame>;

    /// Current steering and linear velocity
    fn get_state(&mut self) -> Result<CarState>;

    /// Move the car to `pose` in world coordinates
    fn reset_car_pose(&mut self, pose: &Pose) -> Result<()>;
}

impl<T: Simulator + ?Sized> Simulator for Box<T> {
    fn start(&mut self) -> Result<()> {
        (**self).start()
    }

    fn stop(&mut self) -> Result<()> {
        (**self).stop()
    }

    fn set_car_steering(&mut self, steering: f64) -> Result<()> {
        (**self).set_car_steering(steering)
    }

    fn set_car_velocity(&mut self, velocity: f64) -> Result<()> {
        (**self).set_car_velocity(velocity)
    }

    fn get_image(&mut self) -> Result<CameraFrame> {
        (**self).get_image()
    }

    fn get_state(&mut self) -> Result<CarState> {
        (**self).get_state()
    }

    fn reset_car_pose(&mut self, pose: &Pose) -> Result<()> {
        (**self).reset_car_pose(pose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_velocity_from_rear_wheels() {
        let state = CarState::from_rear_wheels(0.1, 100.0, 120.0, 0.09);
        assert!((state.linear_velocity - 9.9).abs() < 1e-9);
        assert_eq!(state.steering, 0.1);
    }
}
