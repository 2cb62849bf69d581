//! JudgeBlueprint - Config Loader 输出
//!
//! 描述完整的评判配置：仿真器连接、检查点、计时、赛道起点、车辆参数、成绩输出。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use validator::Validate;

use crate::{CheckpointId, ContractError, Pose, TrackDirection};

/// 单次尝试超时上限 (秒)，一天
pub const MAX_TIMEOUT_S: f64 = 86_400.0;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的评判配置蓝图
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct JudgeBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 仿真器连接设置
    #[serde(default)]
    #[validate(nested)]
    pub simulator: SimulatorConfig,

    /// 检查点事件源
    #[serde(default)]
    #[validate(nested)]
    pub checkpoints: CheckpointConfig,

    /// 计时设置
    #[serde(default)]
    #[validate(nested)]
    pub timing: TimingConfig,

    /// 赛道起点
    #[serde(default)]
    pub tracks: TrackConfig,

    /// 车辆参数
    #[serde(default)]
    #[validate(nested)]
    pub vehicle: VehicleConfig,

    /// 成绩输出路由
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// 仿真器远程 API 连接
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SimulatorConfig {
    /// 仿真器地址
    #[serde(default = "default_host")]
    #[validate(length(min = 1))]
    pub host: String,

    /// 远程 API 端口
    #[serde(default = "default_simulator_port")]
    pub port: u16,

    /// stop 之后等待仿真器停稳 (ms)
    #[serde(default = "default_settle_after_stop_ms")]
    pub settle_after_stop_ms: u64,

    /// start 之后等待检查点服务就绪 (ms)
    #[serde(default = "default_settle_after_start_ms")]
    pub settle_after_start_ms: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_simulator_port(),
            settle_after_stop_ms: default_settle_after_stop_ms(),
            settle_after_start_ms: default_settle_after_start_ms(),
        }
    }
}

/// 检查点碰撞事件源配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CheckpointConfig {
    /// 事件源地址
    #[serde(default = "default_host")]
    #[validate(length(min = 1))]
    pub host: String,

    /// 起终点检查点端口
    #[serde(default = "default_start_finish_port")]
    #[validate(range(min = 1))]
    pub start_finish_port: u16,

    /// 中点检查点端口
    #[serde(default = "default_mid_port")]
    #[validate(range(min = 1))]
    pub mid_port: u16,

    /// 碰撞标志保持时间 (ms)，需大于消费者轮询间隔
    #[serde(default = "default_settle_delay_ms")]
    #[validate(range(min = 1, max = 10_000))]
    pub settle_delay_ms: u64,

    /// 关闭时等待后台任务的上限 (ms)
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    /// 连接中途断开后是否重新打开
    #[serde(default)]
    pub reopen_after_close: bool,
}

impl CheckpointConfig {
    /// Port of the event source for `checkpoint`
    pub fn port(&self, checkpoint: CheckpointId) -> u16 {
        match checkpoint {
            CheckpointId::StartFinish => self.start_finish_port,
            CheckpointId::Mid => self.mid_port,
        }
    }

    /// WebSocket URL of the event source for `checkpoint`
    pub fn url(&self, checkpoint: CheckpointId) -> String {
        format!("ws://{}:{}", self.host, self.port(checkpoint))
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            start_finish_port: default_start_finish_port(),
            mid_port: default_mid_port(),
            settle_delay_ms: default_settle_delay_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            reopen_after_close: false,
        }
    }
}

/// 计时配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TimingConfig {
    /// 单次尝试超时 (秒)
    #[serde(default = "default_timeout_s")]
    #[validate(range(exclusive_min = 0.0, max = 86_400.0))]
    pub timeout_s: f64,

    /// 每次轮询后的休眠间隔 (ms)，0 表示不休眠
    #[serde(default)]
    #[validate(range(max = 1_000))]
    pub tick_interval_ms: u64,
}

impl TimingConfig {
    /// 超时时长；非有限值或超出上限时返回配置错误
    pub fn timeout(&self) -> Result<Duration, ContractError> {
        if !self.timeout_s.is_finite() || self.timeout_s <= 0.0 || self.timeout_s > MAX_TIMEOUT_S {
            return Err(ContractError::config_validation(
                "timing.timeout_s",
                format!("must be in (0, {MAX_TIMEOUT_S}], got {}", self.timeout_s),
            ));
        }
        Duration::try_from_secs_f64(self.timeout_s)
            .map_err(|e| ContractError::config_validation("timing.timeout_s", e.to_string()))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            timeout_s: default_timeout_s(),
            tick_interval_ms: 0,
        }
    }
}

/// 赛道起点配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackConfig {
    /// 正向起点位姿
    #[serde(default = "default_forward_pose")]
    pub forward: Pose,

    /// 反向起点位姿
    #[serde(default = "default_backward_pose")]
    pub backward: Pose,

    /// 是否随机选择首个方向
    #[serde(default = "default_true")]
    pub randomize_order: bool,
}

impl TrackConfig {
    /// Starting pose for `direction`
    pub fn pose(&self, direction: TrackDirection) -> Pose {
        match direction {
            TrackDirection::Forward => self.forward,
            TrackDirection::Backward => self.backward,
        }
    }
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            forward: default_forward_pose(),
            backward: default_backward_pose(),
            randomize_order: true,
        }
    }
}

/// 车辆参数
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct VehicleConfig {
    /// 最大线速度 (m/s)
    #[serde(default = "default_max_velocity")]
    #[validate(range(exclusive_min = 0.0))]
    pub max_velocity: f64,

    /// 最大转向角 (rad)
    #[serde(default = "default_max_steer_angle")]
    #[validate(range(exclusive_min = 0.0, max = 1.5707963267948966))]
    pub max_steer_angle: f64,

    /// 车轮半径 (m)
    #[serde(default = "default_wheel_radius")]
    #[validate(range(exclusive_min = 0.0))]
    pub wheel_radius: f64,

    /// 电机扭矩
    #[serde(default = "default_motor_torque")]
    pub motor_torque: f64,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            max_velocity: default_max_velocity(),
            max_steer_angle: default_max_steer_angle(),
            wheel_radius: default_wheel_radius(),
            motor_torque: default_motor_torque(),
        }
    }
}

/// Sink 输出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink 名称
    pub name: String,

    /// Sink 类型
    pub sink_type: SinkType,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// 日志输出
    Log,
    /// JSON lines 文件
    File,
    /// 排行榜 HTTP 提交
    Http,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_simulator_port() -> u16 {
    23000
}

fn default_settle_after_stop_ms() -> u64 {
    500
}

fn default_settle_after_start_ms() -> u64 {
    2000
}

fn default_start_finish_port() -> u16 {
    9000
}

fn default_mid_port() -> u16 {
    9001
}

fn default_settle_delay_ms() -> u64 {
    100
}

fn default_shutdown_grace_ms() -> u64 {
    500
}

fn default_timeout_s() -> f64 {
    900.0 // 15 minutes
}

fn default_forward_pose() -> Pose {
    Pose::with_yaw_degrees([2.25, 33.5, -13.5], -150.0)
}

fn default_backward_pose() -> Pose {
    Pose::with_yaw_degrees([3.5, 31.0, -13.5], 30.0)
}

fn default_true() -> bool {
    true
}

fn default_max_velocity() -> f64 {
    40.0
}

fn default_max_steer_angle() -> f64 {
    0.5236 // 30 degrees
}

fn default_wheel_radius() -> f64 {
    0.09
}

fn default_motor_torque() -> f64 {
    60.0
}
