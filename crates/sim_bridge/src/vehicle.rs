//! Vehicle limits and command de-duplication

use contracts::VehicleConfig;

/// Physical limits of the judged vehicle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleLimits {
    /// Linear velocity cap (m/s)
    pub max_velocity: f64,
    /// Steering limit, symmetric (rad)
    pub max_steer_angle: f64,
    /// Wheel radius (m)
    pub wheel_radius: f64,
    /// Motor torque applied on start
    pub motor_torque: f64,
}

impl Default for VehicleLimits {
    fn default() -> Self {
        Self::from(&VehicleConfig::default())
    }
}

impl From<&VehicleConfig> for VehicleLimits {
    fn from(config: &VehicleConfig) -> Self {
        Self {
            max_velocity: config.max_velocity,
            max_steer_angle: config.max_steer_angle,
            wheel_radius: config.wheel_radius,
            motor_torque: config.motor_torque,
        }
    }
}

/// Turns raw driver commands into the values actually sent to the
/// simulator, dropping repeats of the last sent value.
#[derive(Debug, Clone)]
pub struct CommandFilter {
    limits: VehicleLimits,
    last_steering: f64,
    last_motor_velocity: f64,
}

impl CommandFilter {
    pub fn new(limits: VehicleLimits) -> Self {
        Self {
            limits,
            last_steering: 0.0,
            last_motor_velocity: 0.0,
        }
    }

    pub fn limits(&self) -> &VehicleLimits {
        &self.limits
    }

    /// Clamped steering angle to send, or `None` if unchanged
    pub fn steering(&mut self, steering: f64) -> Option<f64> {
        let max = self.limits.max_steer_angle;
        let steering = steering.clamp(-max, max);
        if steering == self.last_steering {
            return None;
        }
        self.last_steering = steering;
        Some(steering)
    }

    /// Motor angular velocity (rad/s) to send, or `None` if unchanged.
    ///
    /// Only the forward speed is capped; reverse commands pass through.
    pub fn velocity(&mut self, velocity: f64) -> Option<f64> {
        let velocity = velocity.min(self.limits.max_velocity);
        let motor_velocity = velocity / self.limits.wheel_radius;
        if motor_velocity == self.last_motor_velocity {
            return None;
        }
        self.last_motor_velocity = motor_velocity;
        Some(motor_velocity)
    }

    /// Last steering angle sent
    pub fn last_steering(&self) -> f64 {
        self.last_steering
    }

    /// Last motor angular velocity sent
    pub fn last_motor_velocity(&self) -> f64 {
        self.last_motor_velocity
    }

    /// Forget previously sent commands (after a simulation restart)
    pub fn reset(&mut self) {
        self.last_steering = 0.0;
        self.last_motor_velocity = 0.0;
    }
}
