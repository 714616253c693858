//! 只读观察者
//!
//! 对外暴露当前位姿、机器人状态、健康报告和各子系统指标，
//! 可在任意线程轮询，或订阅状态变化。

use crossbeam_channel::Receiver;
use satellite_link::{
    ArbiterMetricsSnapshot, HardwareLink, HealthBoard, HealthReport, HealthSignal, LinkArbiter,
};
use satellite_motion::{MotionMetricsSnapshot, MotionShared, PoseSample, StateChange};
use satellite_protocol::{Pose, RobotState};
use std::sync::Arc;

/// 只读观察者（可克隆，克隆开销为几次 `Arc` 引用计数）
pub struct Observer<L> {
    motion: Arc<MotionShared>,
    arbiter: Arc<LinkArbiter<L>>,
    health: Arc<HealthBoard>,
}

impl<L> Clone for Observer<L> {
    fn clone(&self) -> Self {
        Self {
            motion: self.motion.clone(),
            arbiter: self.arbiter.clone(),
            health: self.health.clone(),
        }
    }
}

impl<L: HardwareLink> Observer<L> {
    pub fn new(
        motion: Arc<MotionShared>,
        arbiter: Arc<LinkArbiter<L>>,
        health: Arc<HealthBoard>,
    ) -> Self {
        Self {
            motion,
            arbiter,
            health,
        }
    }

    /// 最后一次下发的位姿（尚未下发过时为 `None`）
    pub fn pose(&self) -> Option<Pose> {
        self.motion.last_pose().map(|sample| sample.pose)
    }

    /// 最后一次下发的位姿及其周期号和状态
    pub fn pose_sample(&self) -> Option<PoseSample> {
        self.motion.last_pose()
    }

    pub fn state(&self) -> RobotState {
        self.motion.state.get()
    }

    /// 订阅状态变化
    pub fn subscribe_state(&self) -> Receiver<StateChange> {
        self.motion.state.subscribe()
    }

    pub fn health(&self) -> HealthReport {
        self.health.snapshot()
    }

    /// 订阅健康信号
    pub fn subscribe_health(&self) -> Receiver<HealthSignal> {
        self.health.subscribe()
    }

    pub fn motion_metrics(&self) -> MotionMetricsSnapshot {
        self.motion.metrics.snapshot()
    }

    pub fn arbiter_metrics(&self) -> ArbiterMetricsSnapshot {
        self.arbiter.metrics()
    }

    /// 控制循环是否处于挂起
    pub fn is_motion_suspended(&self) -> bool {
        self.motion.is_suspended()
    }
}
