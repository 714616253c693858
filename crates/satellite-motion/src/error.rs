//! 运动层错误类型定义

use satellite_link::LinkError;
use satellite_protocol::ProtocolError;
use std::time::Duration;
use thiserror::Error;

/// 运动层错误类型
#[derive(Error, Debug)]
pub enum MotionError {
    /// Move 库中不存在该名称
    #[error("Unknown move: {0}")]
    UnknownMove(String),

    /// Action 库中不存在该名称
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// 命令通道已关闭（控制循环退出）
    #[error("Command channel closed")]
    ChannelClosed,

    /// 命令通道已满
    #[error("Command channel full (capacity: {capacity})")]
    ChannelFull { capacity: usize },

    /// 控制循环已停止（链路丢失或已关闭）
    #[error("Motion loop stopped")]
    LoopStopped,

    /// 挂起确认超时
    #[error("Suspend not acknowledged within {0:?}")]
    SuspendTimeout(Duration),

    /// 恢复后未在限定时间内产出合法位姿
    #[error("No valid pose produced within {0:?} after resume")]
    ResumeTimeout(Duration),

    /// 控制循环线程创建失败
    #[error("Failed to spawn motion thread: {0}")]
    Spawn(std::io::Error),

    /// 链路错误
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// 位姿校验错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use satellite_protocol::Axis;

    #[test]
    fn test_motion_error_display() {
        assert_eq!(
            format!("{}", MotionError::UnknownMove("dance".to_string())),
            "Unknown move: dance"
        );
        assert_eq!(
            format!("{}", MotionError::ChannelFull { capacity: 64 }),
            "Command channel full (capacity: 64)"
        );
        let msg = format!("{}", MotionError::ResumeTimeout(Duration::from_secs(1)));
        assert!(msg.contains("1s"), "{}", msg);
    }

    #[test]
    fn test_from_protocol_error() {
        let err: MotionError = ProtocolError::NonFinite { axis: Axis::Pitch }.into();
        match err {
            MotionError::Protocol(ProtocolError::NonFinite { axis }) => assert_eq!(axis, Axis::Pitch),
            _ => panic!("Expected Protocol variant"),
        }
    }

    #[test]
    fn test_from_link_error() {
        let err: MotionError = LinkError::Disconnected.into();
        assert!(matches!(err, MotionError::Link(LinkError::Disconnected)));
    }
}
