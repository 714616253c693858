//! Move 优先级

use crate::ProtocolError;
use std::fmt;
use std::str::FromStr;

/// Move 优先级
///
/// 高优先级的 Move 抢占（丢弃）正在播放的低优先级 Move；
/// 同级或更低优先级的 Move 排队等待。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MovePriority {
    Low,
    #[default]
    Medium,
    High,
}

impl fmt::Display for MovePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MovePriority::Low => "low",
            MovePriority::Medium => "medium",
            MovePriority::High => "high",
        };
        f.write_str(name)
    }
}

impl FromStr for MovePriority {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(MovePriority::Low),
            "medium" => Ok(MovePriority::Medium),
            "high" => Ok(MovePriority::High),
            _ => Err(ProtocolError::UnknownVariant {
                kind: "priority",
                value: s.to_string(),
            }),
        }
    }
}
