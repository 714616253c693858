//! 机器人状态
//!
//! 对话状态机（由事件分发器驱动）：
//!
//! ```text
//! IDLE --唤醒词--> LISTENING --STT 结束--> THINKING --TTS 开始--> SPEAKING --TTS 结束--> IDLE
//!                      \------------TTS 开始------------/
//!
//! 反向边：
//! LISTENING --TTS 结束--> IDLE        （对话放弃，无回复）
//! THINKING  --TTS 结束--> IDLE
//! THINKING  --唤醒词--> LISTENING     （用户重新开口）
//! SPEAKING  --唤醒词--> LISTENING     （打断）
//! ```
//!
//! SLEEPING / SUSPENDED 由生命周期管理器写入，ERROR 仅由运动控制循环在链路丢失时写入。

use crate::ProtocolError;
use crate::event::SatelliteEvent;
use std::fmt;
use std::str::FromStr;

/// 机器人状态（全局唯一权威值）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RobotState {
    #[default]
    Idle,
    Listening,
    Thinking,
    Speaking,
    Sleeping,
    Suspended,
    Error,
}

impl RobotState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RobotState::Idle => "idle",
            RobotState::Listening => "listening",
            RobotState::Thinking => "thinking",
            RobotState::Speaking => "speaking",
            RobotState::Sleeping => "sleeping",
            RobotState::Suspended => "suspended",
            RobotState::Error => "error",
        }
    }

    /// 是否处于进行中的对话（音频采集必须无损）
    pub fn is_conversation(&self) -> bool {
        matches!(self, RobotState::Listening | RobotState::Speaking)
    }

    /// 运动控制循环是否需要计算位姿
    ///
    /// SLEEPING / SUSPENDED 下控制循环只做空转周期，不竞争硬件链路。
    pub fn computes_pose(&self) -> bool {
        !matches!(self, RobotState::Sleeping | RobotState::Suspended)
    }

    /// 是否为可以进入睡眠的清醒状态
    pub fn is_awake(&self) -> bool {
        matches!(
            self,
            RobotState::Idle | RobotState::Listening | RobotState::Thinking | RobotState::Speaking
        )
    }

    /// 对话事件驱动的状态转换
    ///
    /// 只处理唤醒词 / STT / TTS 事件；睡眠与连接事件由生命周期管理器处理。
    /// 返回 `None` 表示该事件在当前状态下不适用（忽略）。
    pub fn on_conversation_event(self, event: &SatelliteEvent) -> Option<RobotState> {
        use RobotState::*;
        match (self, event) {
            (Idle | Thinking | Speaking, SatelliteEvent::WakeWordDetected { .. }) => {
                Some(Listening)
            },
            (Listening, SatelliteEvent::SttEnd { .. }) => Some(Thinking),
            (Listening | Thinking, SatelliteEvent::TtsStart { .. }) => Some(Speaking),
            (Listening | Thinking | Speaking, SatelliteEvent::TtsEnd) => Some(Idle),
            _ => None,
        }
    }
}

impl fmt::Display for RobotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RobotState {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "idle" => Ok(RobotState::Idle),
            "listening" => Ok(RobotState::Listening),
            "thinking" => Ok(RobotState::Thinking),
            "speaking" => Ok(RobotState::Speaking),
            "sleeping" => Ok(RobotState::Sleeping),
            "suspended" => Ok(RobotState::Suspended),
            "error" => Ok(RobotState::Error),
            _ => Err(ProtocolError::UnknownVariant {
                kind: "robot state",
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_cycle() {
        let wake = SatelliteEvent::WakeWordDetected { wake_word: None };
        let stt_end = SatelliteEvent::SttEnd { transcript: None };
        let tts_start = SatelliteEvent::TtsStart { emotion: None };

        let s = RobotState::Idle.on_conversation_event(&wake).unwrap();
        assert_eq!(s, RobotState::Listening);
        let s = s.on_conversation_event(&stt_end).unwrap();
        assert_eq!(s, RobotState::Thinking);
        let s = s.on_conversation_event(&tts_start).unwrap();
        assert_eq!(s, RobotState::Speaking);
        let s = s.on_conversation_event(&SatelliteEvent::TtsEnd).unwrap();
        assert_eq!(s, RobotState::Idle);
    }

    #[test]
    fn test_conversation_reverse_edges() {
        let wake = SatelliteEvent::WakeWordDetected { wake_word: None };

        // 没有回复时从 LISTENING 回到 IDLE，采集不再阻塞
        assert_eq!(
            RobotState::Listening.on_conversation_event(&SatelliteEvent::TtsEnd),
            Some(RobotState::Idle)
        );
        assert_eq!(
            RobotState::Thinking.on_conversation_event(&SatelliteEvent::TtsEnd),
            Some(RobotState::Idle)
        );
        // 打断：播放中再次唤醒
        assert_eq!(
            RobotState::Speaking.on_conversation_event(&wake),
            Some(RobotState::Listening)
        );
        assert_eq!(
            RobotState::Thinking.on_conversation_event(&wake),
            Some(RobotState::Listening)
        );
    }

    #[test]
    fn test_inapplicable_events_are_ignored() {
        let wake = SatelliteEvent::WakeWordDetected { wake_word: None };
        assert_eq!(RobotState::Listening.on_conversation_event(&wake), None);
        assert_eq!(RobotState::Sleeping.on_conversation_event(&wake), None);
        assert_eq!(RobotState::Suspended.on_conversation_event(&wake), None);
        assert_eq!(RobotState::Error.on_conversation_event(&wake), None);
        assert_eq!(
            RobotState::Speaking.on_conversation_event(&SatelliteEvent::SttEnd { transcript: None }),
            None
        );
        assert_eq!(
            RobotState::Idle.on_conversation_event(&SatelliteEvent::TtsEnd),
            None
        );
        // 睡眠事件不属于对话状态机
        assert_eq!(
            RobotState::Idle.on_conversation_event(&SatelliteEvent::SleepCommand),
            None
        );
    }

    #[test]
    fn test_state_predicates() {
        assert!(RobotState::Listening.is_conversation());
        assert!(RobotState::Speaking.is_conversation());
        assert!(!RobotState::Thinking.is_conversation());

        assert!(!RobotState::Sleeping.computes_pose());
        assert!(!RobotState::Suspended.computes_pose());
        assert!(RobotState::Error.computes_pose());

        assert!(RobotState::Thinking.is_awake());
        assert!(!RobotState::Error.is_awake());
    }

    #[test]
    fn test_from_str() {
        assert_eq!("SPEAKING".parse::<RobotState>(), Ok(RobotState::Speaking));
        assert!("dozing".parse::<RobotState>().is_err());
    }
}
