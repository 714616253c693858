//! # Satellite Protocol
//!
//! 卫星设备运动核心的数据定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `pose`: 位姿与位姿增量（头部 6 自由度、身体偏航、双天线）
//! - `limits`: 安全限位及位姿校验
//! - `state`: 机器人状态（RobotState）及对话状态转换表
//! - `event`: 外部事件（唤醒词、STT、TTS、睡眠、连接）
//! - `priority`: Move 优先级
//!
//! ## 单位
//!
//! - 平移：毫米（mm）
//! - 角度：度（deg）

pub mod event;
pub mod limits;
pub mod pose;
pub mod priority;
pub mod state;

pub use event::{EventKind, SatelliteEvent};
pub use limits::PoseLimits;
pub use pose::{Axis, Pose, PoseOffset};
pub use priority::MovePriority;
pub use state::RobotState;

use thiserror::Error;

/// 协议层错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// 轴数值不是有限数（NaN / Inf）
    #[error("Non-finite value on axis {axis}")]
    NonFinite { axis: Axis },

    /// 轴数值超出安全限位
    #[error("Axis {axis} out of range: {value:.3} (allowed {min:.1}..={max:.1})")]
    OutOfRange {
        axis: Axis,
        value: f64,
        min: f64,
        max: f64,
    },

    /// 头部偏航与身体偏航差值过大（逆运动学碰撞风险）
    #[error("Head/body yaw delta {delta:.3} exceeds {limit:.1} degrees")]
    YawDeltaExceeded { delta: f64, limit: f64 },

    /// 无法识别的枚举名称（如配置文件或命令行中的状态、优先级）
    #[error("Unknown {kind}: '{value}'")]
    UnknownVariant { kind: &'static str, value: String },
}
