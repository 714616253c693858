//! 外部事件定义
//!
//! 唤醒词、STT、TTS、睡眠/唤醒命令、连接状态变化均以单个枚举（可带载荷）
//! 投递给事件分发器。

use std::fmt;

/// 外部离散事件
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum SatelliteEvent {
    /// 检测到唤醒词
    WakeWordDetected { wake_word: Option<String> },
    /// 语音识别结束
    SttEnd { transcript: Option<String> },
    /// 开始播放语音合成；`emotion` 为回复附带的情绪（对应一个 Move 名称）
    TtsStart { emotion: Option<String> },
    /// 语音合成播放结束
    TtsEnd,
    /// 睡眠命令
    SleepCommand,
    /// 唤醒命令
    WakeCommand,
    /// 与后端的连接断开
    ConnectivityDown,
    /// 与后端的连接恢复
    ConnectivityUp,
}

/// 事件种类（无载荷，用于日志和统计）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    WakeWord,
    SttEnd,
    TtsStart,
    TtsEnd,
    Sleep,
    Wake,
    ConnectivityDown,
    ConnectivityUp,
}

impl SatelliteEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SatelliteEvent::WakeWordDetected { .. } => EventKind::WakeWord,
            SatelliteEvent::SttEnd { .. } => EventKind::SttEnd,
            SatelliteEvent::TtsStart { .. } => EventKind::TtsStart,
            SatelliteEvent::TtsEnd => EventKind::TtsEnd,
            SatelliteEvent::SleepCommand => EventKind::Sleep,
            SatelliteEvent::WakeCommand => EventKind::Wake,
            SatelliteEvent::ConnectivityDown => EventKind::ConnectivityDown,
            SatelliteEvent::ConnectivityUp => EventKind::ConnectivityUp,
        }
    }

    /// 是否为对话事件（由对话状态机处理）
    pub fn is_conversation(&self) -> bool {
        matches!(
            self.kind(),
            EventKind::WakeWord | EventKind::SttEnd | EventKind::TtsStart | EventKind::TtsEnd
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::WakeWord => "wake_word",
            EventKind::SttEnd => "stt_end",
            EventKind::TtsStart => "tts_start",
            EventKind::TtsEnd => "tts_end",
            EventKind::Sleep => "sleep",
            EventKind::Wake => "wake",
            EventKind::ConnectivityDown => "connectivity_down",
            EventKind::ConnectivityUp => "connectivity_up",
        };
        f.write_str(name)
    }
}
