//! 运行时错误类型定义

use satellite_link::LinkError;
use satellite_motion::MotionError;
use satellite_tools::ConfigError;
use std::time::Duration;
use thiserror::Error;

/// 生命周期错误（单个服务的 suspend / resume 失败）
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// 运动子系统错误
    #[error("Motion error: {0}")]
    Motion(#[from] MotionError),

    /// 链路错误
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// 服务线程未在限定时间内确认
    #[error("Service '{service}' did not acknowledge within {waited:?}")]
    Timeout { service: String, waited: Duration },

    /// 服务线程已退出
    #[error("Service '{0}' thread has stopped")]
    Stopped(String),

    /// 外部协作方报告的失败
    #[error("Service failure: {0}")]
    Service(String),
}

/// 运行时错误类型
#[derive(Error, Debug)]
pub enum SatelliteError {
    /// 配置错误
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// 运动子系统错误
    #[error("Motion error: {0}")]
    Motion(#[from] MotionError),

    /// 链路错误
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// 生命周期错误
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// 工作线程创建失败
    #[error("Failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}
