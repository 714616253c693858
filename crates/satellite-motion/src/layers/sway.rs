//! 语音摆动（播放语音时）
//!
//! - 响度（dBFS）由音频播放循环写入 [`LoudnessFeed`]，控制循环无锁读取
//! - 迟滞 VAD：响度 ≥ 开门限时打开，< 关门限时关闭，两者之间保持
//! - 包络对门限状态做指数平滑：`env += (target - env) · (1 - e^(-dt/τ))`，
//!   上升用 attack 时间常数，下降用 release 时间常数
//! - 偏移：pitch / yaw / roll / z 上互相独立的正弦（Lissajous 风格），乘以包络

use super::{AnimationLayer, LayerKind};
use satellite_protocol::PoseOffset;
use satellite_tools::SwayConfig;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// 包络低于该值视为静止
const ENVELOPE_EPSILON: f64 = 1e-4;

/// 响度输入（无锁）
///
/// 写入方：音频播放循环；读取方：控制循环。
#[derive(Debug)]
pub struct LoudnessFeed {
    /// dBFS（f64 位模式）
    dbfs: AtomicU64,
    playing: AtomicBool,
}

impl LoudnessFeed {
    pub fn new() -> Self {
        Self {
            dbfs: AtomicU64::new(f64::NEG_INFINITY.to_bits()),
            playing: AtomicBool::new(false),
        }
    }

    /// 更新当前播放块的响度
    #[inline]
    pub fn set_dbfs(&self, dbfs: f64) {
        self.dbfs.store(dbfs.to_bits(), Ordering::Relaxed);
    }

    /// 更新播放状态；停止播放时响度复位为静音
    pub fn set_playing(&self, playing: bool) {
        if !playing {
            self.set_dbfs(f64::NEG_INFINITY);
        }
        self.playing.store(playing, Ordering::Release);
    }

    /// 当前响度；未播放时返回 `None`
    #[inline]
    pub fn load(&self) -> Option<f64> {
        if self.playing.load(Ordering::Acquire) {
            Some(f64::from_bits(self.dbfs.load(Ordering::Relaxed)))
        } else {
            None
        }
    }
}

impl Default for LoudnessFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// 语音摆动生成器
#[derive(Debug)]
pub struct SpeechSway {
    config: SwayConfig,
    gate_open: bool,
    envelope: f64,
    /// 振荡时间（秒）
    time: f64,
}

impl SpeechSway {
    pub fn new(config: SwayConfig) -> Self {
        Self {
            config,
            gate_open: false,
            envelope: 0.0,
            time: 0.0,
        }
    }

    pub fn is_gate_open(&self) -> bool {
        self.gate_open
    }

    /// 当前包络 `[0, 1]`
    pub fn envelope(&self) -> f64 {
        self.envelope
    }

    /// 推进 `dt` 秒并采样
    ///
    /// `loudness` 为 `None` 表示没有播放，门限立即关闭，包络按 release 衰减。
    pub fn advance(&mut self, dt: f64, loudness: Option<f64>) -> PoseOffset {
        let dt = dt.max(0.0);
        self.update_gate(loudness);

        let target = if self.gate_open { 1.0 } else { 0.0 };
        let tau = if target > self.envelope {
            self.config.attack().as_secs_f64()
        } else {
            self.config.release().as_secs_f64()
        };
        self.envelope = if tau > 0.0 {
            self.envelope + (target - self.envelope) * (1.0 - (-dt / tau).exp())
        } else {
            target
        };

        if !self.gate_open && self.envelope < ENVELOPE_EPSILON {
            // 完全静止后复位相位，下一段语音从零开始
            self.envelope = 0.0;
            self.time = 0.0;
            return PoseOffset::ZERO;
        }

        self.time += dt;
        let t = self.time;
        let env = self.envelope;
        PoseOffset::rotation(
            env * self.config.roll.sample(t),
            env * self.config.pitch.sample(t),
            env * self.config.yaw.sample(t),
        )
        .with_translation(0.0, 0.0, env * self.config.z.sample(t))
    }

    fn update_gate(&mut self, loudness: Option<f64>) {
        self.gate_open = match loudness {
            None => false,
            Some(dbfs) if self.gate_open => dbfs >= self.config.off_threshold_dbfs,
            Some(dbfs) => dbfs >= self.config.on_threshold_dbfs,
        };
    }
}

impl AnimationLayer for SpeechSway {
    fn kind(&self) -> LayerKind {
        LayerKind::SpeechSway
    }

    fn is_active(&self) -> bool {
        self.gate_open || self.envelope > 0.0
    }
}
