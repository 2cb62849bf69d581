//! 圈速评测指标收集模块
//!
//! 记录每次计时尝试的结果，并在内存中聚合统计。

use std::collections::BTreeMap;
use std::time::Duration;

use contracts::{CheckpointFault, TrackDirection};
use metrics::{counter, gauge, histogram};

/// 单次计时尝试的结果类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// 完成一圈
    Completed,
    /// 超时
    TimedOut,
    /// 检查点故障
    Faulted,
    /// 被中断 (Ctrl-C)
    Interrupted,
}

impl AttemptOutcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::TimedOut => "timed_out",
            Self::Faulted => "faulted",
            Self::Interrupted => "interrupted",
        }
    }
}

/// 记录一圈完成
pub fn record_lap(direction: TrackDirection, lap_time: Duration) {
    histogram!("lap_judge_lap_seconds", "direction" => direction.as_str())
        .record(lap_time.as_secs_f64());
    gauge!("lap_judge_last_lap_seconds", "direction" => direction.as_str())
        .set(lap_time.as_secs_f64());
}

/// 记录一次计时尝试的结果
pub fn record_attempt(direction: TrackDirection, outcome: AttemptOutcome) {
    counter!(
        "lap_judge_attempts_total",
        "direction" => direction.as_str(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// 记录成绩上报结果
pub fn record_report(accepted: usize, failed: usize) {
    gauge!("lap_judge_report_accepted_sinks").set(accepted as f64);
    gauge!("lap_judge_report_failed_sinks").set(failed as f64);
}

/// 圈速指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct LapMetricsAggregator {
    /// 尝试总数
    pub total_attempts: u64,

    /// 完成圈数
    pub completed: u64,

    /// 超时次数
    pub timeouts: u64,

    /// 检查点故障次数
    pub faults: u64,

    /// 中断次数
    pub interrupted: u64,

    /// 各方向圈速统计 (秒)
    pub lap_stats: BTreeMap<&'static str, RunningStats>,

    /// 每次尝试的轮询次数
    pub poll_stats: RunningStats,

    /// 故障描述
    pub fault_messages: Vec<String>,
}

impl LapMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 完成一圈
    pub fn record_lap(&mut self, direction: TrackDirection, lap_time: Duration, polls: u64) {
        self.total_attempts += 1;
        self.completed += 1;
        self.lap_stats
            .entry(direction.as_str())
            .or_default()
            .push(lap_time.as_secs_f64());
        self.poll_stats.push(polls as f64);
    }

    /// 超时
    pub fn record_timeout(&mut self) {
        self.total_attempts += 1;
        self.timeouts += 1;
    }

    /// 检查点故障
    pub fn record_fault(&mut self, fault: &CheckpointFault) {
        self.total_attempts += 1;
        self.faults += 1;
        self.fault_messages.push(fault.to_string());
    }

    pub fn record_interrupted(&mut self) {
        self.total_attempts += 1;
        self.interrupted += 1;
    }

    /// 生成摘要报告
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            total_attempts: self.total_attempts,
            completed: self.completed,
            timeouts: self.timeouts,
            faults: self.faults,
            interrupted: self.interrupted,
            completion_rate: if self.total_attempts > 0 {
                self.completed as f64 / self.total_attempts as f64 * 100.0
            } else {
                0.0
            },
            lap_seconds: self
                .lap_stats
                .iter()
                .map(|(direction, stats)| (*direction, StatsSummary::from(stats)))
                .collect(),
            polls_per_attempt: StatsSummary::from(&self.poll_stats),
            fault_messages: self.fault_messages.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub total_attempts: u64,
    pub completed: u64,
    pub timeouts: u64,
    pub faults: u64,
    pub interrupted: u64,
    pub completion_rate: f64,
    pub lap_seconds: BTreeMap<&'static str, StatsSummary>,
    pub polls_per_attempt: StatsSummary,
    pub fault_messages: Vec<String>,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Lap Judge Summary ===")?;
        writeln!(
            f,
            "Attempts: {} (completed {}, {:.2}%)",
            self.total_attempts, self.completed, self.completion_rate
        )?;
        writeln!(f, "Timeouts: {}", self.timeouts)?;
        writeln!(f, "Checkpoint faults: {}", self.faults)?;
        if self.interrupted > 0 {
            writeln!(f, "Interrupted: {}", self.interrupted)?;
        }
        for (direction, stats) in &self.lap_seconds {
            writeln!(f, "Lap time {direction} (s): {stats}")?;
        }
        writeln!(f, "Polls per attempt: {}", self.polls_per_attempt)?;

        if !self.fault_messages.is_empty() {
            writeln!(f, "Faults:")?;
            for message in &self.fault_messages {
                writeln!(f, "  {message}")?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.count {
            0 => write!(f, "N/A"),
            1 => write!(f, "{:.3}", self.mean),
            n => write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, n
            ),
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
