//! Judging run orchestration module.

mod driver;
mod orchestrator;
mod stats;

pub use driver::CruisePolicy;
pub use orchestrator::{JudgeConfig, JudgeRun};
pub use stats::{AttemptRecord, RunOutcome, RunStats};
