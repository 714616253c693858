//! 硬件链路抽象层
//!
//! 机器人本体的电机、麦克风、扬声器、摄像头共用一条独占的硬件链路。
//! 本模块提供：
//! - `HardwareLink` trait：链路的统一接口（位姿下发、音频读写、视频帧读取）
//! - `LinkArbiter`：独占访问仲裁（有界等待 + 超时清空缓冲区降级）
//! - `FlushableBuffer` / `BoundedBuffer`：有界缓冲区，提供单一 `flush()` 操作
//! - `HealthBoard`：健康状态看板（竞争降级、服务故障、命令拒绝）
//! - `ArbiterMetrics`：按调用方统计的原子计数器
//!
//! # 在架构中的位置
//!
//! ```text
//! 音频采集 / 音频播放 / 视觉循环 / 运动控制循环
//!     ↓ acquire(caller, mode)
//! LinkArbiter（本模块）
//!     ↓ LinkGuard（RAII，作用域结束即释放）
//! HardwareLink 实现
//!     ↓
//! Hardware
//! ```

pub mod arbiter;
pub mod buffer;
pub mod health;
pub mod metrics;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use arbiter::{AcquireMode, LinkArbiter, LinkGuard};
pub use buffer::{BoundedBuffer, FlushableBuffer};
pub use health::{
    ContentionMonitor, ContentionTransition, HealthBoard, HealthReport, HealthSignal,
    ServiceFailure, TransitionPhase,
};
pub use metrics::{ArbiterMetrics, ArbiterMetricsSnapshot, CallerSnapshot};
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockLink, MockLinkProbe};

use satellite_protocol::Pose;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// 链路调用方
///
/// 每个竞争硬件链路的执行上下文都有一个固定身份，用于仲裁策略和统计。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Caller {
    /// 音频采集循环（对话期间阻塞获取，永不丢帧）
    AudioCapture = 0,
    /// 音频播放循环
    AudioPlayback = 1,
    /// 视觉循环
    Vision = 2,
    /// 运动控制循环
    Motion = 3,
}

impl Caller {
    /// 所有调用方（固定顺序，与统计数组下标一致）
    pub const ALL: [Caller; 4] = [
        Caller::AudioCapture,
        Caller::AudioPlayback,
        Caller::Vision,
        Caller::Motion,
    ];

    /// 统计数组下标
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Caller::AudioCapture => "audio_capture",
            Caller::AudioPlayback => "audio_playback",
            Caller::Vision => "vision",
            Caller::Motion => "motion",
        }
    }

    pub(crate) fn from_index(index: usize) -> Option<Caller> {
        Caller::ALL.get(index).copied()
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 摄像头视频帧
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    /// 原始像素数据（格式由链路实现决定）
    pub data: Vec<u8>,
    /// 采集时间戳（微秒）
    pub timestamp_us: u64,
}

/// 链路层错误类型
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    /// 在限定时间内未能获取链路（竞争超时，可恢复）
    #[error("Link acquire timeout for {caller} after {waited:?}")]
    Timeout { caller: Caller, waited: Duration },

    /// 硬件拒绝了命令（如位姿越界）
    #[error("Command rejected: {0}")]
    Rejected(String),

    /// 链路句柄丢失（进程级致命错误）
    #[error("Hardware link disconnected")]
    Disconnected,
}

impl LinkError {
    /// 是否为进程级致命错误
    pub fn is_fatal(&self) -> bool {
        matches!(self, LinkError::Disconnected)
    }
}

/// 硬件链路
///
/// 链路实现是物理通道的唯一所有者，只能由 `LinkArbiter` 持有；
/// 所有调用方都必须通过仲裁器获取 `LinkGuard` 后才能访问。
pub trait HardwareLink: Send {
    /// 下发一个完整位姿
    fn send_pose(&mut self, pose: &Pose) -> Result<(), LinkError>;

    /// 读取麦克风样本，追加到 `out`，最多 `max_samples` 个；返回实际读取数量
    fn read_audio(&mut self, out: &mut Vec<f32>, max_samples: usize) -> Result<usize, LinkError>;

    /// 向扬声器写入样本；返回实际写入数量
    fn write_audio(&mut self, samples: &[f32]) -> Result<usize, LinkError>;

    /// 读取一帧视频（无新帧时返回 `None`）
    fn read_frame(&mut self) -> Result<Option<VideoFrame>, LinkError>;

    /// 链路是否仍然可用
    fn is_connected(&self) -> bool {
        true
    }
}
