//! Mock 仿真器
//!
//! 用于单元测试和演示运行的内存实现：记录所有下发命令，支持注入失败场景，
//! 并可以沿一条一维赛道积分车辆位移，在越过检查点时回调。

use std::fmt;
use std::time::{Duration, Instant};

use contracts::{CheckpointId, Pose};
use tracing::{debug, instrument, trace};

use crate::camera::CameraFrame;
use crate::client::{CarState, Simulator};
use crate::error::{Result, SimError};
use crate::vehicle::{CommandFilter, VehicleLimits};

/// 实际下发到仿真器的命令
#[derive(Debug, Clone, PartialEq)]
pub enum SimCommand {
    Start,
    Stop,
    /// 转向角 (rad)
    Steering(f64),
    /// 电机角速度 (rad/s)
    MotorVelocity(f64),
    ResetPose(Pose),
}

/// Mock 仿真器配置
#[derive(Debug, Default, Clone)]
pub struct MockConfig {
    /// start 失败
    pub fail_start: bool,
    /// stop 失败
    pub fail_stop: bool,
    /// 车辆控制命令失败
    pub fail_commands: bool,
    /// 取图失败
    pub fail_image: bool,
}

/// 检查点越线回调
pub type CrossingCallback = Box<dyn FnMut(CheckpointId) + Send>;

/// 一维闭环赛道
///
/// 起终点线位于 `lap_length` 的整数倍处，中点检查点位于每圈的 `mid_at` 处。
/// reset_car_pose 后车辆停在起终点线之前 `start_offset` 米。
pub struct MockCourse {
    /// 一圈长度 (m)
    pub lap_length: f64,
    /// 中点检查点距起终点线的距离 (m)
    pub mid_at: f64,
    /// 起步位置到起终点线的距离 (m)
    pub start_offset: f64,
    on_crossing: CrossingCallback,
}

impl MockCourse {
    pub fn new(lap_length: f64, on_crossing: impl FnMut(CheckpointId) + Send + 'static) -> Self {
        Self {
            lap_length,
            mid_at: lap_length / 2.0,
            start_offset: lap_length * 0.05,
            on_crossing: Box::new(on_crossing),
        }
    }

    /// 在 (from, to] 区间内依次触发越过的检查点
    fn cross(&mut self, from: f64, to: f64) {
        if to <= from || self.lap_length <= 0.0 {
            return;
        }
        let first_lap = (from / self.lap_length).floor() as i64;
        let last_lap = (to / self.lap_length).floor() as i64;
        for lap in first_lap..=last_lap {
            let base = lap as f64 * self.lap_length;
            for (checkpoint, at) in [
                (CheckpointId::StartFinish, base),
                (CheckpointId::Mid, base + self.mid_at),
            ] {
                if at > from && at <= to {
                    trace!(%checkpoint, at, "mock course crossing");
                    (self.on_crossing)(checkpoint);
                }
            }
        }
    }
}

impl fmt::Debug for MockCourse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockCourse")
            .field("lap_length", &self.lap_length)
            .field("mid_at", &self.mid_at)
            .field("start_offset", &self.start_offset)
            .finish()
    }
}

/// Mock 仿真器
#[derive(Debug)]
pub struct MockSimulator {
    /// 配置（可注入失败场景）
    config: MockConfig,
    filter: CommandFilter,
    running: bool,
    /// 当前位姿
    pose: Option<Pose>,
    /// 赛道里程 (m)
    odometer: f64,
    course: Option<MockCourse>,
    /// 按墙钟自动推进
    realtime_since: Option<Instant>,
    frame: CameraFrame,
    /// 已下发命令
    commands: Vec<SimCommand>,
}

impl MockSimulator {
    /// 创建默认 mock 仿真器
    pub fn new(limits: VehicleLimits) -> Self {
        Self::with_config(limits, MockConfig::default())
    }

    /// 使用配置创建 mock 仿真器
    pub fn with_config(limits: VehicleLimits, config: MockConfig) -> Self {
        Self {
            config,
            filter: CommandFilter::new(limits),
            running: false,
            pose: None,
            odometer: 0.0,
            course: None,
            realtime_since: None,
            frame: CameraFrame::default(),
            commands: Vec::new(),
        }
    }

    /// 挂载赛道
    pub fn with_course(mut self, course: MockCourse) -> Self {
        self.course = Some(course);
        self
    }

    /// 运行期间按墙钟时间自动推进车辆
    pub fn realtime(mut self) -> Self {
        self.realtime_since = Some(Instant::now());
        self
    }

    /// 替换 get_image 返回的帧
    pub fn set_frame(&mut self, frame: CameraFrame) {
        self.frame = frame;
    }

    /// 已下发命令
    pub fn commands(&self) -> &[SimCommand] {
        &self.commands
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn pose(&self) -> Option<&Pose> {
        self.pose.as_ref()
    }

    /// 赛道里程 (m)
    pub fn odometer(&self) -> f64 {
        self.odometer
    }

    /// 当前线速度 (m/s)
    pub fn linear_velocity(&self) -> f64 {
        self.filter.last_motor_velocity() * self.filter.limits().wheel_radius
    }

    /// 推进 `dt`：按当前速度积分里程并触发越过的检查点
    pub fn advance(&mut self, dt: Duration) {
        if !self.running {
            return;
        }
        let from = self.odometer;
        let to = from + self.linear_velocity() * dt.as_secs_f64();
        self.odometer = to;
        if let Some(course) = self.course.as_mut() {
            course.cross(from, to);
        }
    }

    fn catch_up(&mut self) {
        if let Some(since) = self.realtime_since {
            let now = Instant::now();
            self.realtime_since = Some(now);
            self.advance(now.duration_since(since));
        }
    }

    fn ensure_commands(&self, command: &'static str) -> Result<()> {
        if self.config.fail_commands {
            return Err(SimError::command(command, "mock failure"));
        }
        Ok(())
    }
}

impl Simulator for MockSimulator {
    #[instrument(name = "mock_sim_start", skip(self))]
    fn start(&mut self) -> Result<()> {
        if self.config.fail_start {
            return Err(SimError::ConnectionFailed {
                message: "mock failure".into(),
            });
        }
        self.running = true;
        self.filter.reset();
        if self.realtime_since.is_some() {
            self.realtime_since = Some(Instant::now());
        }
        self.commands.push(SimCommand::Start);
        debug!("mock simulation started");
        Ok(())
    }

    #[instrument(name = "mock_sim_stop", skip(self))]
    fn stop(&mut self) -> Result<()> {
        if self.config.fail_stop {
            return Err(SimError::command("stop", "mock failure"));
        }
        self.catch_up();
        self.running = false;
        self.commands.push(SimCommand::Stop);
        debug!("mock simulation stopped");
        Ok(())
    }

    fn set_car_steering(&mut self, steering: f64) -> Result<()> {
        self.ensure_commands("set_car_steering")?;
        self.catch_up();
        if let Some(sent) = self.filter.steering(steering) {
            self.commands.push(SimCommand::Steering(sent));
        }
        Ok(())
    }

    fn set_car_velocity(&mut self, velocity: f64) -> Result<()> {
        self.ensure_commands("set_car_velocity")?;
        self.catch_up();
        if let Some(sent) = self.filter.velocity(velocity) {
            self.commands.push(SimCommand::MotorVelocity(sent));
        }
        Ok(())
    }

    fn get_image(&mut self) -> Result<CameraFrame> {
        if self.config.fail_image {
            return Err(SimError::command("get_image", "mock failure"));
        }
        self.catch_up();
        Ok(self.frame.clone())
    }

    fn get_state(&mut self) -> Result<CarState> {
        self.catch_up();
        let motor = self.filter.last_motor_velocity();
        Ok(CarState::from_rear_wheels(
            self.filter.last_steering(),
            motor,
            motor,
            self.filter.limits().wheel_radius,
        ))
    }

    #[instrument(name = "mock_sim_reset_pose", skip(self), fields(position = ?pose.position))]
    fn reset_car_pose(&mut self, pose: &Pose) -> Result<()> {
        self.ensure_commands("reset_car_pose")?;
        self.catch_up();
        self.pose = Some(*pose);
        self.odometer = -self.course.as_ref().map_or(0.0, |c| c.start_offset);
        self.commands.push(SimCommand::ResetPose(*pose));
        Ok(())
    }
}
