//! 位姿合成器（纯函数，无内部状态）
//!
//! 合成步骤：
//! 1. 目标位姿按优先级顺序逐轴叠加 Move → Action → 人脸追踪 → 语音摆动
//! 2. 头部各轴钳位到安全范围
//! 3. 身体偏航 = 跟随比例 × 头部偏航，再钳位
//! 4. 头部与身体偏航差超限时，把头部偏航向身体方向修正（单次）
//!
//! 第 4 步只缩小头部偏航与身体偏航的距离，修正后的头部偏航落在原头部偏航与
//! 身体偏航之间，两端都已在范围内，所以单次修正后所有约束同时成立。

use satellite_protocol::{Pose, PoseLimits, PoseOffset};

/// 一个周期内各动画层的偏移
///
/// `move_slot` 在没有 Move 播放时由呼吸动画填充。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayerOffsets {
    pub move_slot: PoseOffset,
    pub action: PoseOffset,
    pub tracking: PoseOffset,
    pub sway: PoseOffset,
}

impl LayerOffsets {
    /// 按优先级顺序求和
    pub fn total(&self) -> PoseOffset {
        self.move_slot + self.action + self.tracking + self.sway
    }
}

/// 合成参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComposeParams {
    pub limits: PoseLimits,
    /// 身体偏航跟随头部偏航的比例
    pub body_follow_ratio: f64,
}

impl Default for ComposeParams {
    fn default() -> Self {
        Self {
            limits: PoseLimits::default(),
            body_follow_ratio: 1.0,
        }
    }
}

/// 合成一个输出位姿
///
/// 输入全部为有限数时，输出一定通过 `PoseLimits::check`；
/// 非有限输入会原样传播到输出，由下发前的校验拦截。
pub fn compose(target: &Pose, layers: &LayerOffsets, params: &ComposeParams) -> Pose {
    let limits = &params.limits;
    let sum = *target + layers.total();

    let clamp = |value: f64, max: f64| value.clamp(-max, max);

    let yaw = clamp(sum.yaw_deg, limits.max_head_yaw_deg);
    let body_yaw = clamp(params.body_follow_ratio * yaw, limits.max_body_yaw_deg);

    let delta = yaw - body_yaw;
    let yaw = if delta.abs() > limits.max_yaw_delta_deg {
        body_yaw + limits.max_yaw_delta_deg.copysign(delta)
    } else {
        yaw
    };

    Pose {
        x_mm: clamp(sum.x_mm, limits.max_translation_mm),
        y_mm: clamp(sum.y_mm, limits.max_translation_mm),
        z_mm: clamp(sum.z_mm, limits.max_translation_mm),
        roll_deg: clamp(sum.roll_deg, limits.max_roll_deg),
        pitch_deg: clamp(sum.pitch_deg, limits.max_pitch_deg),
        yaw_deg: yaw,
        body_yaw_deg: body_yaw,
        antenna_left_deg: clamp(sum.antenna_left_deg, limits.max_antenna_deg),
        antenna_right_deg: clamp(sum.antenna_right_deg, limits.max_antenna_deg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn offset_strategy() -> impl Strategy<Value = PoseOffset> {
        (
            (-200.0..200.0f64, -200.0..200.0f64, -200.0..200.0f64),
            (-300.0..300.0f64, -300.0..300.0f64, -400.0..400.0f64),
            (-400.0..400.0f64, -400.0..400.0f64),
        )
            .prop_map(|((x, y, z), (roll, pitch, yaw), (left, right))| {
                PoseOffset::rotation(roll, pitch, yaw)
                    .with_translation(x, y, z)
                    .with_antennas(left, right)
            })
    }

    proptest! {
        /// 任意有限输入的合成结果都满足全部限位
        #[test]
        fn composed_pose_within_limits(
            target_yaw in -400.0..400.0f64,
            move_slot in offset_strategy(),
            action in offset_strategy(),
            tracking in offset_strategy(),
            sway in offset_strategy(),
            ratio in 0.0..=1.0f64,
        ) {
            let target = Pose { yaw_deg: target_yaw, ..Pose::NEUTRAL };
            let layers = LayerOffsets { move_slot, action, tracking, sway };
            let params = ComposeParams { body_follow_ratio: ratio, ..Default::default() };

            let pose = compose(&target, &layers, &params);
            prop_assert!(params.limits.check(&pose).is_ok(), "{:?}", pose);
        }

        /// 范围内的输入不被修改（跟随比例为 1 时）
        #[test]
        fn in_range_pose_passes_through(
            pitch in -40.0..40.0f64,
            roll in -40.0..40.0f64,
            yaw in -160.0..160.0f64,
        ) {
            let layers = LayerOffsets {
                move_slot: PoseOffset::rotation(roll, pitch, yaw),
                ..Default::default()
            };
            let pose = compose(&Pose::NEUTRAL, &layers, &ComposeParams::default());
            prop_assert_eq!(pose.pitch_deg, pitch);
            prop_assert_eq!(pose.roll_deg, roll);
            prop_assert_eq!(pose.yaw_deg, yaw);
            prop_assert_eq!(pose.body_yaw_deg, yaw);
        }
    }

    #[test]
    fn test_layers_sum_in_order() {
        let layers = LayerOffsets {
            move_slot: PoseOffset::rotation(0.0, 10.0, 0.0),
            action: PoseOffset::rotation(0.0, 5.0, 0.0),
            tracking: PoseOffset::rotation(0.0, 0.0, 20.0),
            sway: PoseOffset::rotation(1.0, 2.0, 3.0),
        };
        let pose = compose(&Pose::NEUTRAL, &layers, &ComposeParams::default());
        assert_eq!(pose.pitch_deg, 17.0);
        assert_eq!(pose.roll_deg, 1.0);
        assert_eq!(pose.yaw_deg, 23.0);
        assert_eq!(pose.body_yaw_deg, 23.0);
    }

    #[test]
    fn test_yaw_delta_corrected_toward_body() {
        // 头部 180°，身体只能到 160°，差 20° 不超限
        let layers = LayerOffsets {
            move_slot: PoseOffset::rotation(0.0, 0.0, 250.0),
            ..Default::default()
        };
        let pose = compose(&Pose::NEUTRAL, &layers, &ComposeParams::default());
        assert_eq!(pose.yaw_deg, 180.0);
        assert_eq!(pose.body_yaw_deg, 160.0);

        // 身体不跟随时头部被拉回到 ±65°
        let params = ComposeParams {
            body_follow_ratio: 0.0,
            ..Default::default()
        };
        let pose = compose(&Pose::NEUTRAL, &layers, &params);
        assert_eq!(pose.body_yaw_deg, 0.0);
        assert_eq!(pose.yaw_deg, 65.0);

        let layers = LayerOffsets {
            move_slot: PoseOffset::rotation(0.0, 0.0, -90.0),
            ..Default::default()
        };
        let pose = compose(&Pose::NEUTRAL, &layers, &params);
        assert_eq!(pose.yaw_deg, -65.0);
    }

    #[test]
    fn test_half_follow_ratio() {
        let layers = LayerOffsets {
            move_slot: PoseOffset::rotation(0.0, 0.0, 100.0),
            ..Default::default()
        };
        let params = ComposeParams {
            body_follow_ratio: 0.5,
            ..Default::default()
        };
        let pose = compose(&Pose::NEUTRAL, &layers, &params);
        assert_eq!(pose.body_yaw_deg, 50.0);
        assert_eq!(pose.yaw_deg, 100.0);
    }

    #[test]
    fn test_target_body_yaw_ignored() {
        let target = Pose {
            body_yaw_deg: 90.0,
            ..Pose::NEUTRAL
        };
        let pose = compose(&target, &LayerOffsets::default(), &ComposeParams::default());
        assert_eq!(pose.body_yaw_deg, 0.0);
    }

    #[test]
    fn test_non_finite_propagates_to_check() {
        let layers = LayerOffsets {
            sway: PoseOffset::rotation(0.0, f64::NAN, 0.0),
            ..Default::default()
        };
        let params = ComposeParams::default();
        let pose = compose(&Pose::NEUTRAL, &layers, &params);
        assert!(params.limits.check(&pose).is_err());
    }
}
