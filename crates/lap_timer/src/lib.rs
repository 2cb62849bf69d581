//! # Lap Timer
//!
//! 基于检查点碰撞的圈速计时器。
//!
//! 负责：
//! - 交替等待起终点 / 中点检查点的状态机
//! - 每次轮询后调用一次驾驶策略 hook
//! - 超时与检查点故障终止本次尝试
//!
//! ## 使用示例
//!
//! ```ignore
//! use lap_timer::{LapTimer, LapTimerConfig};
//!
//! let timer = LapTimer::new(LapTimerConfig::try_from(&blueprint.timing)?);
//! let outcome = timer.run(&monitor, &mut simulator, &mut |sim: &mut MockSimulator| {
//!     let _ = sim.set_car_velocity(2.0);
//! })?;
//! println!("lap time: {:?}", outcome.lap_time);
//! ```

mod clock;
mod error;
mod hook;
mod state;
mod timer;

// Re-exports
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::{LapError, Result};
pub use hook::{DriverHook, IdleHook};
pub use state::{LapPhase, LapState, Transition};
pub use timer::{LapOutcome, LapTimer, LapTimerConfig, StopHandle};
