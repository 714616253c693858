//! 呼吸动画（IDLE 待机）
//!
//! 两个阶段：
//! 1. **归中**：在固定时长内从 Move 槽位的当前偏移缓动到中立位
//! 2. **振荡**：天线 0.5 Hz 反相摆动，头部 Z 轴 0.1 Hz 小幅起伏
//!
//! 从非中立位重新开始时总是先经过阶段 1；从挂起恢复时也总是重新开始。

use super::clip::smoothstep;
use super::{AnimationLayer, LayerKind};
use satellite_protocol::PoseOffset;
use satellite_tools::BreathingConfig;
use std::f64::consts::TAU;

/// 呼吸阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreathingPhase {
    /// 未激活
    Inactive,
    /// 阶段 1：缓动归中
    Settling,
    /// 阶段 2：持续振荡
    Oscillating,
}

/// 呼吸动画生成器
#[derive(Debug)]
pub struct Breathing {
    config: BreathingConfig,
    phase: BreathingPhase,
    /// 当前阶段内经过的时间（秒）
    elapsed: f64,
    /// 阶段 1 的起点
    start: PoseOffset,
}

impl Breathing {
    pub fn new(config: BreathingConfig) -> Self {
        Self {
            config,
            phase: BreathingPhase::Inactive,
            elapsed: 0.0,
            start: PoseOffset::ZERO,
        }
    }

    pub fn phase(&self) -> BreathingPhase {
        self.phase
    }

    /// 从给定偏移重新开始（进入阶段 1）
    pub fn restart(&mut self, from: PoseOffset) {
        self.phase = BreathingPhase::Settling;
        self.elapsed = 0.0;
        self.start = from;
    }

    /// 停止（下次激活时从阶段 1 开始）
    pub fn stop(&mut self) {
        self.phase = BreathingPhase::Inactive;
        self.elapsed = 0.0;
    }

    /// 推进 `dt` 秒并采样
    ///
    /// 未激活时以 `from` 为起点自动重新开始。
    pub fn advance(&mut self, dt: f64, from: PoseOffset) -> PoseOffset {
        if self.phase == BreathingPhase::Inactive {
            self.restart(from);
        }
        self.elapsed += dt.max(0.0);

        if self.phase == BreathingPhase::Settling {
            let duration = self.config.neutral_duration().as_secs_f64();
            if duration > 0.0 && self.elapsed < duration {
                let t = smoothstep(self.elapsed / duration);
                return PoseOffset::lerp(self.start, PoseOffset::ZERO, t);
            }
            // 剩余时间进入振荡阶段
            self.elapsed = (self.elapsed - duration).max(0.0);
            self.phase = BreathingPhase::Oscillating;
        }

        self.oscillation(self.elapsed)
    }

    /// 阶段 2 在时刻 `t` 的偏移
    fn oscillation(&self, t: f64) -> PoseOffset {
        let antenna = self.config.antenna_amplitude_deg
            * (TAU * self.config.antenna_frequency_hz * t).sin();
        let z = self.config.z_amplitude_mm * (TAU * self.config.z_frequency_hz * t).sin();
        PoseOffset::antennas(antenna, -antenna).with_translation(0.0, 0.0, z)
    }
}

impl AnimationLayer for Breathing {
    fn kind(&self) -> LayerKind {
        LayerKind::Breathing
    }

    fn is_active(&self) -> bool {
        self.phase != BreathingPhase::Inactive
    }

    fn on_resume(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 0.01;

    #[test]
    fn test_settles_from_offset() {
        let mut breathing = Breathing::new(BreathingConfig::default());
        let from = PoseOffset::rotation(0.0, 20.0, 0.0).with_antennas(60.0, -60.0);

        let first = breathing.advance(DT, from);
        assert_eq!(breathing.phase(), BreathingPhase::Settling);
        assert!(first.pitch_deg > 19.0 && first.pitch_deg <= 20.0);

        // 归中时长 1s
        let mut last = first;
        for _ in 0..98 {
            let next = breathing.advance(DT, from);
            assert!(next.pitch_deg <= last.pitch_deg + 1e-12);
            last = next;
        }
        assert!(last.pitch_deg < 0.1);

        breathing.advance(DT * 2.0, from);
        assert_eq!(breathing.phase(), BreathingPhase::Oscillating);
    }

    #[test]
    fn test_antenna_period() {
        let mut breathing = Breathing::new(BreathingConfig::default());
        breathing.restart(PoseOffset::ZERO);

        // 跳过归中阶段
        for _ in 0..100 {
            breathing.advance(DT, PoseOffset::ZERO);
        }

        // 10s 内计数左天线的峰值
        let mut samples = Vec::new();
        for _ in 0..1_000 {
            samples.push(breathing.advance(DT, PoseOffset::ZERO).antenna_left_deg);
        }
        let peaks = samples
            .windows(3)
            .filter(|w| w[1] > w[0] && w[1] >= w[2] && w[1] > 0.0)
            .count();
        assert_eq!(peaks, 5);
    }

    #[test]
    fn test_antennas_are_mirrored() {
        let mut breathing = Breathing::new(BreathingConfig::default());
        breathing.restart(PoseOffset::ZERO);
        for _ in 0..150 {
            let offset = breathing.advance(DT, PoseOffset::ZERO);
            assert!((offset.antenna_left_deg + offset.antenna_right_deg).abs() < 1e-9);
            assert!(offset.antenna_left_deg.abs() <= 15.0 + 1e-9);
            assert!(offset.z_mm.abs() <= 5.0 + 1e-9);
        }
    }

    #[test]
    fn test_resume_reenters_settling() {
        let mut breathing = Breathing::new(BreathingConfig::default());
        for _ in 0..200 {
            breathing.advance(DT, PoseOffset::ZERO);
        }
        assert_eq!(breathing.phase(), BreathingPhase::Oscillating);

        breathing.on_resume();
        let offset = PoseOffset::rotation(0.0, -10.0, 0.0);
        breathing.advance(DT, offset);
        assert_eq!(breathing.phase(), BreathingPhase::Settling);
    }
}
