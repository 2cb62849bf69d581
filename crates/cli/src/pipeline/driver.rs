//! Built-in driving policy.

use lap_timer::DriverHook;
use sim_bridge::Simulator;
use tracing::warn;

/// Drives straight at a constant speed.
///
/// Stands in for a competitor's solution when judging against the mock
/// course. Command failures are logged once and otherwise ignored; the
/// timer decides when the attempt ends.
#[derive(Debug, Clone)]
pub struct CruisePolicy {
    velocity: f64,
    steps: u64,
    failures: u64,
}

impl CruisePolicy {
    pub fn new(velocity: f64) -> Self {
        Self {
            velocity,
            steps: 0,
            failures: 0,
        }
    }
}

impl<S: Simulator + ?Sized> DriverHook<S> for CruisePolicy {
    fn step(&mut self, sim: &mut S) {
        self.steps += 1;
        let result = sim
            .set_car_steering(0.0)
            .and_then(|()| sim.set_car_velocity(self.velocity));

        if let Err(e) = result {
            if self.failures == 0 {
                warn!(error = %e, "cruise policy command failed");
            }
            self.failures += 1;
        }
    }
}
