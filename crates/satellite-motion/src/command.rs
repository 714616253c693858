//! 控制循环命令
//!
//! 请求（Move / Action / 目标位姿）和控制消息（挂起 / 恢复）都通过有界通道
//! 投递给控制循环线程，在每个周期开始时一次性取空。

use crate::layers::Clip;
use crossbeam_channel::Sender;
use satellite_protocol::{MovePriority, Pose};
use std::fmt;
use std::sync::Arc;

/// 控制循环命令
pub enum MotionCommand {
    /// 请求播放 Move（名称已在发送端解析）
    RequestMove {
        clip: Arc<Clip>,
        priority: MovePriority,
    },
    /// 触发 Action
    RequestAction { clip: Arc<Clip> },
    /// 设置目标位姿（各层偏移叠加在其上）
    SetTarget(Pose),
    /// 丢弃当前和所有排队的 Move
    ClearMoves,
    /// 挂起：冻结所有层，只做空转周期；处理后立即确认
    Suspend { ack: Sender<()> },
    /// 恢复：产出第一个合法位姿后确认
    Resume { ack: Sender<()> },
}

impl fmt::Debug for MotionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionCommand::RequestMove { clip, priority } => f
                .debug_struct("RequestMove")
                .field("clip", &clip.name())
                .field("priority", priority)
                .finish(),
            MotionCommand::RequestAction { clip } => f
                .debug_struct("RequestAction")
                .field("clip", &clip.name())
                .finish(),
            MotionCommand::SetTarget(pose) => f.debug_tuple("SetTarget").field(pose).finish(),
            MotionCommand::ClearMoves => f.write_str("ClearMoves"),
            MotionCommand::Suspend { .. } => f.write_str("Suspend"),
            MotionCommand::Resume { .. } => f.write_str("Resume"),
        }
    }
}
