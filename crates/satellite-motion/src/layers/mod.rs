//! 动画层
//!
//! 每一层独立演化，每个周期产出一个 `PoseOffset`，状态只由本层修改：
//!
//! | 层 | 激活条件 | 状态 |
//! |----|----------|------|
//! | [`Breathing`] | IDLE 且无 Move 播放 | 阶段 + 相位 |
//! | [`SpeechSway`] | 音频播放中 | VAD 门限 + 包络 + 相位 |
//! | [`MoveQueue`] | 有 Move 请求 | 当前 Move 游标 + 等待队列 |
//! | [`ActionOverlay`] | 有 Action 触发 | 当前 Action 游标 + 冷却计时 |
//!
//! 人脸追踪不是动画层，只是一个保持最后值的输入（[`TrackingFeed`]）。
//!
//! 所有层都以控制循环测得的 `dt`（秒）推进，挂起期间不推进即为冻结。

mod action;
mod breathing;
mod clip;
mod moves;
mod sway;
mod tracking;

pub use action::{ActionLibrary, ActionOutcome, ActionOverlay};
pub use breathing::{Breathing, BreathingPhase};
pub use clip::{Clip, Keyframe, smoothstep};
pub use moves::{MoveLibrary, MoveOutcome, MoveQueue};
pub use sway::{LoudnessFeed, SpeechSway};
pub use tracking::TrackingFeed;

use std::fmt;

/// 动画层种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Breathing,
    SpeechSway,
    Move,
    Action,
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayerKind::Breathing => "breathing",
            LayerKind::SpeechSway => "speech_sway",
            LayerKind::Move => "move",
            LayerKind::Action => "action",
        };
        f.write_str(name)
    }
}

/// 动画层公共接口
///
/// 采样签名因层而异（呼吸需要起始偏移，语音摆动需要响度），
/// 这里只统一生命周期钩子。
pub trait AnimationLayer {
    fn kind(&self) -> LayerKind;

    /// 本层当前是否产出非零偏移
    fn is_active(&self) -> bool;

    /// 挂起：冻结内部状态（默认无操作，不推进即冻结）
    fn on_suspend(&mut self) {}

    /// 恢复：默认从冻结处继续
    fn on_resume(&mut self) {}
}
