//! Satellite SDK - 桌面机器人运动 / 资源核心
//!
//! 机器人本体的电机、麦克风、扬声器、摄像头共用一条独占硬件链路；
//! 本 SDK 在这条链路上调度 100Hz 位姿控制、音频采集 / 播放和视觉，
//! 并随睡眠 / 唤醒、断连 / 重连挂起和恢复所有子系统。
//!
//! # 架构设计
//!
//! 本 SDK 采用分层架构，从底层到高层：
//!
//! - **协议层** (`protocol`): 位姿、安全限位、机器人状态、外部事件
//! - **配置层** (`tools`): TOML 配置加载与校验
//! - **链路层** (`link`): 硬件链路抽象、仲裁器、缓冲区、健康看板
//! - **运动层** (`motion`): 状态单元、动画层、位姿合成、控制循环
//! - **运行时** (`runtime`): 生命周期、事件分发、音视频循环、Builder
//!
//! # 快速开始
//!
//! ```rust
//! use satellite_sdk::prelude::*;
//! ```

pub use satellite_link as link;
pub use satellite_motion as motion;
pub use satellite_protocol as protocol;
pub use satellite_runtime as runtime;
pub use satellite_tools as tools;

mod logging;
pub mod prelude;

pub use logging::init_logger;

// --- 用户以此为界 ---
// 以下是通过 Facade Pattern 提供的公共 API

pub use link::{HardwareLink, HealthReport, HealthSignal, LinkError, VideoFrame};
#[cfg(feature = "mock")]
pub use link::{MockLink, MockLinkProbe};
pub use motion::{MotionError, MotionMetricsSnapshot, StateChange};
pub use protocol::{
    MovePriority, Pose, PoseLimits, PoseOffset, ProtocolError, RobotState, SatelliteEvent,
};
pub use runtime::{
    CaptureSink, DispatchOutcome, FrameSink, LifecycleError, Observer, PlaybackSource, Satellite,
    SatelliteBuilder, SatelliteError, SleepAwareService, TransitionReport,
};
pub use tools::{ConfigError, SatelliteConfig};
