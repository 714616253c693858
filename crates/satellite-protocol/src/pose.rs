//! 位姿定义
//!
//! `Pose` 是一个控制周期内下发给硬件的完整绝对位姿；
//! `PoseOffset` 是动画层产生的增量（delta），由合成器按轴累加。

use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

/// 位姿的单个轴
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Axis {
    X,
    Y,
    Z,
    Roll,
    Pitch,
    Yaw,
    BodyYaw,
    AntennaLeft,
    AntennaRight,
}

impl Axis {
    /// 所有轴（固定顺序）
    pub const ALL: [Axis; 9] = [
        Axis::X,
        Axis::Y,
        Axis::Z,
        Axis::Roll,
        Axis::Pitch,
        Axis::Yaw,
        Axis::BodyYaw,
        Axis::AntennaLeft,
        Axis::AntennaRight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
            Axis::Roll => "roll",
            Axis::Pitch => "pitch",
            Axis::Yaw => "yaw",
            Axis::BodyYaw => "body_yaw",
            Axis::AntennaLeft => "antenna_left",
            Axis::AntennaRight => "antenna_right",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 绝对位姿
///
/// - 头部平移 `x_mm`/`y_mm`/`z_mm`（毫米）
/// - 头部旋转 `roll_deg`/`pitch_deg`/`yaw_deg`（度）
/// - 身体偏航 `body_yaw_deg`（度，由合成器根据头部偏航推导）
/// - 左右天线角度（度）
///
/// **Copy trait**：控制循环每 10ms 产生一个，按值传递避免堆分配。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pose {
    pub x_mm: f64,
    pub y_mm: f64,
    pub z_mm: f64,
    pub roll_deg: f64,
    pub pitch_deg: f64,
    pub yaw_deg: f64,
    pub body_yaw_deg: f64,
    pub antenna_left_deg: f64,
    pub antenna_right_deg: f64,
}

impl Pose {
    /// 中立位姿（所有轴为 0）
    pub const NEUTRAL: Pose = Pose {
        x_mm: 0.0,
        y_mm: 0.0,
        z_mm: 0.0,
        roll_deg: 0.0,
        pitch_deg: 0.0,
        yaw_deg: 0.0,
        body_yaw_deg: 0.0,
        antenna_left_deg: 0.0,
        antenna_right_deg: 0.0,
    };

    /// 读取指定轴
    pub fn axis(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x_mm,
            Axis::Y => self.y_mm,
            Axis::Z => self.z_mm,
            Axis::Roll => self.roll_deg,
            Axis::Pitch => self.pitch_deg,
            Axis::Yaw => self.yaw_deg,
            Axis::BodyYaw => self.body_yaw_deg,
            Axis::AntennaLeft => self.antenna_left_deg,
            Axis::AntennaRight => self.antenna_right_deg,
        }
    }

    /// 检查所有轴是否为有限数
    pub fn first_non_finite(&self) -> Option<Axis> {
        Axis::ALL.into_iter().find(|axis| !self.axis(*axis).is_finite())
    }

    /// 头部偏航与身体偏航之差（度）
    pub fn yaw_delta(&self) -> f64 {
        self.yaw_deg - self.body_yaw_deg
    }
}

/// 位姿增量
///
/// 各动画层（Breathing / SpeechSway / Move / Action / 人脸追踪）每个周期产出一个增量，
/// 合成器按固定优先级顺序逐轴相加。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoseOffset {
    pub x_mm: f64,
    pub y_mm: f64,
    pub z_mm: f64,
    pub roll_deg: f64,
    pub pitch_deg: f64,
    pub yaw_deg: f64,
    pub body_yaw_deg: f64,
    pub antenna_left_deg: f64,
    pub antenna_right_deg: f64,
}

impl PoseOffset {
    /// 零增量
    pub const ZERO: PoseOffset = PoseOffset {
        x_mm: 0.0,
        y_mm: 0.0,
        z_mm: 0.0,
        roll_deg: 0.0,
        pitch_deg: 0.0,
        yaw_deg: 0.0,
        body_yaw_deg: 0.0,
        antenna_left_deg: 0.0,
        antenna_right_deg: 0.0,
    };

    /// 仅包含头部旋转的增量
    pub fn rotation(roll_deg: f64, pitch_deg: f64, yaw_deg: f64) -> Self {
        Self {
            roll_deg,
            pitch_deg,
            yaw_deg,
            ..Self::ZERO
        }
    }

    /// 仅包含天线角度的增量
    pub fn antennas(left_deg: f64, right_deg: f64) -> Self {
        Self {
            antenna_left_deg: left_deg,
            antenna_right_deg: right_deg,
            ..Self::ZERO
        }
    }

    /// 设置头部平移（链式）
    pub fn with_translation(mut self, x_mm: f64, y_mm: f64, z_mm: f64) -> Self {
        self.x_mm = x_mm;
        self.y_mm = y_mm;
        self.z_mm = z_mm;
        self
    }

    /// 设置天线角度（链式）
    pub fn with_antennas(mut self, left_deg: f64, right_deg: f64) -> Self {
        self.antenna_left_deg = left_deg;
        self.antenna_right_deg = right_deg;
        self
    }

    /// 读取指定轴
    pub fn axis(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x_mm,
            Axis::Y => self.y_mm,
            Axis::Z => self.z_mm,
            Axis::Roll => self.roll_deg,
            Axis::Pitch => self.pitch_deg,
            Axis::Yaw => self.yaw_deg,
            Axis::BodyYaw => self.body_yaw_deg,
            Axis::AntennaLeft => self.antenna_left_deg,
            Axis::AntennaRight => self.antenna_right_deg,
        }
    }

    /// 逐轴映射
    pub fn map(self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            x_mm: f(self.x_mm),
            y_mm: f(self.y_mm),
            z_mm: f(self.z_mm),
            roll_deg: f(self.roll_deg),
            pitch_deg: f(self.pitch_deg),
            yaw_deg: f(self.yaw_deg),
            body_yaw_deg: f(self.body_yaw_deg),
            antenna_left_deg: f(self.antenna_left_deg),
            antenna_right_deg: f(self.antenna_right_deg),
        }
    }

    /// 线性插值：`t = 0` 返回 `from`，`t = 1` 返回 `to`
    pub fn lerp(from: PoseOffset, to: PoseOffset, t: f64) -> PoseOffset {
        from + (to - from) * t
    }

    /// 所有轴绝对值的最大值
    pub fn max_abs(&self) -> f64 {
        Axis::ALL
            .into_iter()
            .map(|axis| self.axis(axis).abs())
            .fold(0.0, f64::max)
    }

    /// 是否（在容差内）为零增量
    pub fn is_neutral(&self, tolerance: f64) -> bool {
        self.max_abs() <= tolerance
    }
}

impl Add for PoseOffset {
    type Output = PoseOffset;

    fn add(self, rhs: PoseOffset) -> PoseOffset {
        PoseOffset {
            x_mm: self.x_mm + rhs.x_mm,
            y_mm: self.y_mm + rhs.y_mm,
            z_mm: self.z_mm + rhs.z_mm,
            roll_deg: self.roll_deg + rhs.roll_deg,
            pitch_deg: self.pitch_deg + rhs.pitch_deg,
            yaw_deg: self.yaw_deg + rhs.yaw_deg,
            body_yaw_deg: self.body_yaw_deg + rhs.body_yaw_deg,
            antenna_left_deg: self.antenna_left_deg + rhs.antenna_left_deg,
            antenna_right_deg: self.antenna_right_deg + rhs.antenna_right_deg,
        }
    }
}

impl AddAssign for PoseOffset {
    fn add_assign(&mut self, rhs: PoseOffset) {
        *self = *self + rhs;
    }
}

impl Sub for PoseOffset {
    type Output = PoseOffset;

    fn sub(self, rhs: PoseOffset) -> PoseOffset {
        self + (-rhs)
    }
}

impl Neg for PoseOffset {
    type Output = PoseOffset;

    fn neg(self) -> PoseOffset {
        self.map(|v| -v)
    }
}

impl Mul<f64> for PoseOffset {
    type Output = PoseOffset;

    fn mul(self, rhs: f64) -> PoseOffset {
        self.map(|v| v * rhs)
    }
}

impl Add<PoseOffset> for Pose {
    type Output = Pose;

    fn add(self, rhs: PoseOffset) -> Pose {
        Pose {
            x_mm: self.x_mm + rhs.x_mm,
            y_mm: self.y_mm + rhs.y_mm,
            z_mm: self.z_mm + rhs.z_mm,
            roll_deg: self.roll_deg + rhs.roll_deg,
            pitch_deg: self.pitch_deg + rhs.pitch_deg,
            yaw_deg: self.yaw_deg + rhs.yaw_deg,
            body_yaw_deg: self.body_yaw_deg + rhs.body_yaw_deg,
            antenna_left_deg: self.antenna_left_deg + rhs.antenna_left_deg,
            antenna_right_deg: self.antenna_right_deg + rhs.antenna_right_deg,
        }
    }
}
