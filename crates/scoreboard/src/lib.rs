//! # Scoreboard
//!
//! 成绩上报模块。
//!
//! 负责：
//! - 将 `ScoreCard` 扇出到多个 sink（排行榜 HTTP、日志、文件）
//! - 每个 sink 独立 worker，单个 sink 失败不影响其他 sink
//! - 单次提交，不重试

pub mod error;
pub mod handle;
pub mod metrics;
pub mod reporter;
pub mod sinks;

pub use contracts::{ScoreCard, ScoreSink, SubmissionReceipt};
pub use error::{Result, ScoreboardError};
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics, SubmissionStatus};
pub use reporter::{ReportSummary, ScoreReporter};
pub use sinks::{FileSink, FileSinkConfig, HttpScoreSink, HttpSinkConfig, LogSink};
