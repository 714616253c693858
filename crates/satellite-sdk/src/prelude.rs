//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use satellite_sdk::prelude::*;
//! ```

// 运行时（推荐入口）
pub use crate::runtime::{
    CaptureSink, DispatchOutcome, FrameSink, Observer, PlaybackSource, Satellite,
    SatelliteBuilder, SleepAwareService, playback_channel,
};

// 数据类型
pub use crate::protocol::{MovePriority, Pose, PoseOffset, RobotState, SatelliteEvent};

// 链路
pub use crate::link::{HardwareLink, VideoFrame};

// 配置
pub use crate::tools::SatelliteConfig;

// 错误类型
pub use crate::link::LinkError;
pub use crate::motion::MotionError;
pub use crate::runtime::{LifecycleError, SatelliteError};
