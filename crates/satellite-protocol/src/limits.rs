//! 安全限位
//!
//! 每个离开合成器的位姿都必须满足这里定义的范围。

use crate::ProtocolError;
use crate::pose::{Axis, Pose};

/// 浮点比较容差（度 / 毫米）
const LIMIT_EPSILON: f64 = 1e-9;

/// 位姿安全限位（对称范围，单位：mm / deg）
///
/// `max_yaw_delta_deg` 约束 `|yaw - body_yaw|`，避免逆运动学碰撞。
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoseLimits {
    /// 头部平移上限（x/y/z，mm）
    pub max_translation_mm: f64,
    /// 头部横滚上限（deg）
    pub max_roll_deg: f64,
    /// 头部俯仰上限（deg）
    pub max_pitch_deg: f64,
    /// 头部偏航上限（deg）
    pub max_head_yaw_deg: f64,
    /// 身体偏航上限（deg）
    pub max_body_yaw_deg: f64,
    /// 头部与身体偏航差上限（deg）
    pub max_yaw_delta_deg: f64,
    /// 天线角度上限（deg）
    pub max_antenna_deg: f64,
}

impl Default for PoseLimits {
    fn default() -> Self {
        Self {
            max_translation_mm: 30.0,
            max_roll_deg: 40.0,
            max_pitch_deg: 40.0,
            max_head_yaw_deg: 180.0,
            max_body_yaw_deg: 160.0,
            max_yaw_delta_deg: 65.0,
            max_antenna_deg: 120.0,
        }
    }
}

impl PoseLimits {
    /// 指定轴的允许范围 `(min, max)`
    pub fn range(&self, axis: Axis) -> (f64, f64) {
        let max = match axis {
            Axis::X | Axis::Y | Axis::Z => self.max_translation_mm,
            Axis::Roll => self.max_roll_deg,
            Axis::Pitch => self.max_pitch_deg,
            Axis::Yaw => self.max_head_yaw_deg,
            Axis::BodyYaw => self.max_body_yaw_deg,
            Axis::AntennaLeft | Axis::AntennaRight => self.max_antenna_deg,
        };
        (-max, max)
    }

    /// 校验位姿是否满足全部限位
    ///
    /// 合成器的输出理论上总是合法的；这里是下发前的最后一道检查，
    /// 失败意味着上游产生了 NaN 或限位配置本身不一致。
    pub fn check(&self, pose: &Pose) -> Result<(), ProtocolError> {
        if let Some(axis) = pose.first_non_finite() {
            return Err(ProtocolError::NonFinite { axis });
        }

        for axis in Axis::ALL {
            let (min, max) = self.range(axis);
            let value = pose.axis(axis);
            if value < min - LIMIT_EPSILON || value > max + LIMIT_EPSILON {
                return Err(ProtocolError::OutOfRange {
                    axis,
                    value,
                    min,
                    max,
                });
            }
        }

        let delta = pose.yaw_delta();
        if delta.abs() > self.max_yaw_delta_deg + LIMIT_EPSILON {
            return Err(ProtocolError::YawDeltaExceeded {
                delta,
                limit: self.max_yaw_delta_deg,
            });
        }

        Ok(())
    }
}
