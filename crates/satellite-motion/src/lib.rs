//! 运动层模块
//!
//! 本模块提供机器人本体的运动能力，包括：
//! - 机器人状态单元（`ArcSwap` 无锁快照读取，写入串行化）
//! - 动画层：呼吸、语音摆动、Move 队列、Action 叠加
//! - 位姿合成器（纯函数，安全钳位）
//! - 固定频率（默认 100Hz）运动控制循环
//!
//! # 单周期数据流
//!
//! ```text
//! 事件分发器 ──写──> StateCell
//!                        │ 快照
//!                        ↓
//! 命令通道 ──> 动画层采样 ──> compose() ──> 校验 ──> LinkArbiter ──> 硬件
//! ```

mod command;
mod composer;
mod error;
mod handle;
pub mod layers;
pub mod metrics;
mod motion_loop;
pub mod state;
pub mod thread;

pub use command::MotionCommand;
pub use composer::{ComposeParams, LayerOffsets, compose};
pub use error::MotionError;
pub use handle::MotionHandle;
pub use layers::{
    ActionLibrary, ActionOutcome, ActionOverlay, AnimationLayer, Breathing, BreathingPhase, Clip,
    Keyframe, LayerKind, LoudnessFeed, MoveLibrary, MoveOutcome, MoveQueue, SpeechSway,
    TrackingFeed,
};
pub use metrics::{MotionMetrics, MotionMetricsSnapshot};
pub use motion_loop::{MotionLoopConfig, MotionShared, PoseSample, motion_loop};
pub use state::{StateCell, StateChange, StateSnapshot};
pub use thread::JoinTimeout;
