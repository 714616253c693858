//! 事件分发器
//!
//! 外部事件（唤醒词、STT、TTS、睡眠 / 唤醒、连接变化）的唯一入口，串行处理：
//! - 对话事件 → 对话状态机（`StateCell::transition`），不适用的事件忽略
//! - 唤醒词 → 额外触发 `nod` Action
//! - 带情绪的 TTS 开始 → 以中优先级请求同名 Move
//! - 睡眠 / 唤醒 / 连接事件 → `LifecycleManager`

use crate::lifecycle::{LifecycleManager, TransitionReport};
use parking_lot::Mutex;
use satellite_motion::{MotionError, MotionHandle, StateChange, StateCell};
use satellite_protocol::{MovePriority, SatelliteEvent};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// 唤醒词触发的 Action
pub const WAKE_ACTION: &str = "nod";

/// 事件处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// 对话状态发生转换
    State(StateChange),
    /// 执行了生命周期转换
    Lifecycle(TransitionReport),
    /// 当前状态下不适用，已忽略
    Ignored,
}

/// 事件分发器
pub struct EventDispatcher {
    state: Arc<StateCell>,
    lifecycle: Arc<LifecycleManager>,
    motion: Arc<MotionHandle>,
    serial: Mutex<()>,
}

impl EventDispatcher {
    pub fn new(
        state: Arc<StateCell>,
        lifecycle: Arc<LifecycleManager>,
        motion: Arc<MotionHandle>,
    ) -> Self {
        Self {
            state,
            lifecycle,
            motion,
            serial: Mutex::new(()),
        }
    }

    /// 处理一个事件
    ///
    /// 事件不会返回错误：Move / Action 请求失败只记录日志。
    pub fn dispatch(&self, event: SatelliteEvent) -> DispatchOutcome {
        let _serial = self.serial.lock();
        trace!("Dispatching {}", event.kind());

        if event.is_conversation() {
            return self.on_conversation(&event);
        }

        let report = match event {
            SatelliteEvent::SleepCommand => self.lifecycle.sleep(),
            SatelliteEvent::WakeCommand => self.lifecycle.wake(),
            SatelliteEvent::ConnectivityDown => self.lifecycle.connectivity_lost(),
            SatelliteEvent::ConnectivityUp => self.lifecycle.connectivity_restored(),
            _ => None,
        };
        report.map_or(DispatchOutcome::Ignored, DispatchOutcome::Lifecycle)
    }

    fn on_conversation(&self, event: &SatelliteEvent) -> DispatchOutcome {
        let Some(change) = self
            .state
            .transition(|snapshot| snapshot.state.on_conversation_event(event))
        else {
            debug!("{} ignored in state {}", event.kind(), self.state.get());
            return DispatchOutcome::Ignored;
        };

        match event {
            SatelliteEvent::WakeWordDetected { .. } => {
                if let Err(e) = self.motion.request_action(WAKE_ACTION) {
                    warn!("Failed to request wake action: {}", e);
                }
            },
            SatelliteEvent::TtsStart {
                emotion: Some(emotion),
            } => match self.motion.request_move(emotion, MovePriority::Medium) {
                Ok(()) => debug!("Emotion '{}' requested", emotion),
                Err(MotionError::UnknownMove(name)) => {
                    debug!("No move for emotion '{}', ignoring", name)
                },
                Err(e) => warn!("Failed to request emotion move: {}", e),
            },
            _ => {},
        }

        DispatchOutcome::State(change)
    }
}
