//! Satellite 运行时
//!
//! 把运动子系统和外部世界连接起来：
//! - `LifecycleManager`：睡眠 / 唤醒与断连 / 重连，按注册顺序挂起和恢复服务
//! - `EventDispatcher`：外部事件的唯一入口
//! - 音频采集、音频播放、视觉循环：遵守仲裁策略，挂起时完全停止访问链路
//! - `Observer`：位姿、状态、健康报告和指标的只读视图
//! - `SatelliteBuilder` / `Satellite`：组装并持有上述所有组件
//!
//! # 线程模型
//!
//! ```text
//!                      ┌──> 采集线程 ──┐
//! EventDispatcher ─────┼──> 播放线程 ──┼──> LinkArbiter ──> HardwareLink
//!   │ 生命周期         ├──> 视觉线程 ──┤
//!   ↓                  └──> 控制循环 ──┘
//! LifecycleManager ── suspend / resume ──> 以上所有线程
//! ```

pub mod audio;
mod builder;
mod dispatcher;
mod error;
mod lifecycle;
pub mod metrics;
mod observer;
mod service;
pub mod vision;
mod worker;

pub use audio::{
    AudioCaptureLoop, AudioPlaybackLoop, CaptureSink, ChannelSource, PlaybackSource, dbfs,
    playback_channel,
};
pub use builder::{Satellite, SatelliteBuilder};
pub use dispatcher::{DispatchOutcome, EventDispatcher, WAKE_ACTION};
pub use error::{LifecycleError, SatelliteError};
pub use lifecycle::{LifecycleManager, LifecycleTrigger, TransitionReport};
pub use metrics::{LoopMetrics, LoopMetricsSnapshot};
pub use observer::Observer;
pub use service::SleepAwareService;
pub use vision::{FrameSink, VisionLoop};
