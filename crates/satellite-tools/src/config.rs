//! # 运行时配置
//!
//! 所有字段都有默认值，配置文件只需写出需要覆盖的部分：
//!
//! ```toml
//! [arbiter]
//! acquire_timeout_ms = 30
//!
//! [sway]
//! on_threshold_dbfs = -32.0
//! ```
//!
//! 本核心不持久化配置：只提供加载，不提供保存。

use satellite_protocol::PoseLimits;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML 解析失败
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// 配置值非法
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// 完整配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SatelliteConfig {
    pub arbiter: ArbiterConfig,
    pub motion: MotionConfig,
    pub breathing: BreathingConfig,
    pub sway: SwayConfig,
    pub action: ActionConfig,
    pub lifecycle: LifecycleConfig,
    pub io: IoConfig,
    pub limits: PoseLimits,
}

impl SatelliteConfig {
    /// 从 TOML 字符串解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: SatelliteConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 校验配置一致性
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("motion.frequency_hz", self.motion.frequency_hz)?;
        positive("motion.dt_clamp_multiplier", self.motion.dt_clamp_multiplier)?;
        let period_s = 1.0 / self.motion.frequency_hz;
        if Duration::try_from_secs_f64(period_s).is_err()
            || Duration::try_from_secs_f64(period_s * self.motion.dt_clamp_multiplier).is_err()
        {
            return Err(ConfigError::Invalid(format!(
                "motion.dt_clamp_multiplier / motion.frequency_hz out of range ({} / {})",
                self.motion.dt_clamp_multiplier, self.motion.frequency_hz
            )));
        }
        if !(0.0..=1.0).contains(&self.motion.body_follow_ratio) {
            return Err(ConfigError::Invalid(format!(
                "motion.body_follow_ratio must be within 0..=1, got {}",
                self.motion.body_follow_ratio
            )));
        }
        if self.motion.command_capacity == 0 {
            return Err(ConfigError::Invalid(
                "motion.command_capacity must be > 0".to_string(),
            ));
        }
        if self.arbiter.contention_window_ms == 0 || self.arbiter.contention_threshold == 0 {
            return Err(ConfigError::Invalid(
                "arbiter contention window and threshold must be > 0".to_string(),
            ));
        }
        finite("sway.on_threshold_dbfs", self.sway.on_threshold_dbfs)?;
        finite("sway.off_threshold_dbfs", self.sway.off_threshold_dbfs)?;
        if self.sway.off_threshold_dbfs >= self.sway.on_threshold_dbfs {
            return Err(ConfigError::Invalid(format!(
                "sway.off_threshold_dbfs ({}) must be below on_threshold_dbfs ({})",
                self.sway.off_threshold_dbfs, self.sway.on_threshold_dbfs
            )));
        }
        for (axis, osc) in [
            ("pitch", &self.sway.pitch),
            ("yaw", &self.sway.yaw),
            ("roll", &self.sway.roll),
            ("z", &self.sway.z),
        ] {
            for (field, value) in [
                ("frequency_hz", osc.frequency_hz),
                ("amplitude", osc.amplitude),
                ("phase_rad", osc.phase_rad),
            ] {
                finite(&format!("sway.{}.{}", axis, field), value)?;
            }
        }
        positive("breathing.antenna_frequency_hz", self.breathing.antenna_frequency_hz)?;
        positive("breathing.z_frequency_hz", self.breathing.z_frequency_hz)?;
        finite("breathing.antenna_amplitude_deg", self.breathing.antenna_amplitude_deg)?;
        finite("breathing.z_amplitude_mm", self.breathing.z_amplitude_mm)?;
        if self.io.capture_chunk == 0 || self.io.playback_chunk == 0 {
            return Err(ConfigError::Invalid("io chunk sizes must be > 0".to_string()));
        }
        if self.io.capture_buffer_capacity < self.io.capture_chunk
            || self.io.playback_buffer_capacity < self.io.playback_chunk
        {
            return Err(ConfigError::Invalid(
                "io buffer capacity must hold at least one chunk".to_string(),
            ));
        }
        if self.io.frame_buffer_capacity == 0 {
            return Err(ConfigError::Invalid(
                "io.frame_buffer_capacity must be > 0".to_string(),
            ));
        }
        let limits = &self.limits;
        for (name, value) in [
            ("max_translation_mm", limits.max_translation_mm),
            ("max_roll_deg", limits.max_roll_deg),
            ("max_pitch_deg", limits.max_pitch_deg),
            ("max_head_yaw_deg", limits.max_head_yaw_deg),
            ("max_body_yaw_deg", limits.max_body_yaw_deg),
            ("max_yaw_delta_deg", limits.max_yaw_delta_deg),
            ("max_antenna_deg", limits.max_antenna_deg),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "limits.{} must be a finite non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

fn finite(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{} must be a finite number, got {}",
            name, value
        )))
    }
}

/// 有限且大于 0（NaN 不通过）
fn positive(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{} must be > 0, got {}", name, value)))
    }
}

/// 硬件链路仲裁器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbiterConfig {
    /// 非优先调用方的获取超时（毫秒）
    pub acquire_timeout_ms: u64,
    /// 竞争统计滑动窗口（毫秒）
    pub contention_window_ms: u64,
    /// 窗口内超时次数阈值，超过后上报健康降级
    pub contention_threshold: usize,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            acquire_timeout_ms: 20,
            contention_window_ms: 5_000,
            contention_threshold: 50,
        }
    }
}

impl ArbiterConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn contention_window(&self) -> Duration {
        Duration::from_millis(self.contention_window_ms)
    }
}

/// 运动控制循环配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// 控制频率（Hz）
    pub frequency_hz: f64,
    /// dt 钳位倍数（dt 最大为 multiplier × 标称周期）
    pub dt_clamp_multiplier: f64,
    /// 位姿提交时获取链路的超时（毫秒），超时则丢弃本周期位姿
    pub submit_timeout_ms: u64,
    /// 命令通道容量
    pub command_capacity: usize,
    /// 身体偏航跟随头部偏航的比例（1.0 = 完全同步）
    pub body_follow_ratio: f64,
    /// 人脸追踪增量多久未更新视为过期（仅上报，不清零）
    pub tracking_stale_ms: u64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 100.0,
            dt_clamp_multiplier: 2.0,
            submit_timeout_ms: 5,
            command_capacity: 64,
            body_follow_ratio: 1.0,
            tracking_stale_ms: 500,
        }
    }
}

impl MotionConfig {
    /// 标称周期
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frequency_hz)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }

    pub fn tracking_stale(&self) -> Duration {
        Duration::from_millis(self.tracking_stale_ms)
    }
}

/// 呼吸动画配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreathingConfig {
    /// 阶段 1：回到中立位姿的插值时长（毫秒）
    pub neutral_duration_ms: u64,
    /// 天线摆动频率（Hz）
    pub antenna_frequency_hz: f64,
    /// 天线摆动幅度（度）
    pub antenna_amplitude_deg: f64,
    /// Z 轴起伏频率（Hz）
    pub z_frequency_hz: f64,
    /// Z 轴起伏幅度（毫米）
    pub z_amplitude_mm: f64,
}

impl Default for BreathingConfig {
    fn default() -> Self {
        Self {
            neutral_duration_ms: 1_000,
            antenna_frequency_hz: 0.5,
            antenna_amplitude_deg: 15.0,
            z_frequency_hz: 0.1,
            z_amplitude_mm: 5.0,
        }
    }
}

impl BreathingConfig {
    pub fn neutral_duration(&self) -> Duration {
        Duration::from_millis(self.neutral_duration_ms)
    }
}

/// 单个正弦分量
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OscillatorConfig {
    /// 频率（Hz）
    pub frequency_hz: f64,
    /// 幅度（度或毫米）
    pub amplitude: f64,
    /// 初相位（弧度）
    #[serde(default)]
    pub phase_rad: f64,
}

impl OscillatorConfig {
    pub const fn new(frequency_hz: f64, amplitude: f64, phase_rad: f64) -> Self {
        Self {
            frequency_hz,
            amplitude,
            phase_rad,
        }
    }

    /// 在时间 `t`（秒）处的取值
    pub fn sample(&self, t: f64) -> f64 {
        self.amplitude * (std::f64::consts::TAU * self.frequency_hz * t + self.phase_rad).sin()
    }
}

/// 说话摆动配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwayConfig {
    /// 门限打开阈值（dBFS）
    pub on_threshold_dbfs: f64,
    /// 门限关闭阈值（dBFS），必须低于打开阈值
    pub off_threshold_dbfs: f64,
    /// 包络上升时间常数（毫秒）
    pub attack_ms: u64,
    /// 包络下降时间常数（毫秒）
    pub release_ms: u64,
    pub pitch: OscillatorConfig,
    pub yaw: OscillatorConfig,
    pub roll: OscillatorConfig,
    pub z: OscillatorConfig,
}

impl Default for SwayConfig {
    fn default() -> Self {
        Self {
            on_threshold_dbfs: -35.0,
            off_threshold_dbfs: -45.0,
            attack_ms: 250,
            release_ms: 400,
            pitch: OscillatorConfig::new(2.2, 4.0, 0.0),
            yaw: OscillatorConfig::new(0.6, 6.0, std::f64::consts::FRAC_PI_2),
            roll: OscillatorConfig::new(1.3, 3.0, std::f64::consts::FRAC_PI_4),
            z: OscillatorConfig::new(3.0, 1.5, 0.0),
        }
    }
}

impl SwayConfig {
    pub fn attack(&self) -> Duration {
        Duration::from_millis(self.attack_ms)
    }

    pub fn release(&self) -> Duration {
        Duration::from_millis(self.release_ms)
    }
}

/// 动作叠加层配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionConfig {
    /// 最小重触发间隔（毫秒）；实际不应期取该值与动作时长的较大者
    pub cooldown_ms: u64,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self { cooldown_ms: 2_000 }
    }
}

impl ActionConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// 生命周期管理配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// 运动子系统恢复时等待首个有效位姿的超时（毫秒）
    pub resume_timeout_ms: u64,
    /// 等待控制循环确认挂起的超时（毫秒）
    pub suspend_ack_timeout_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            resume_timeout_ms: 1_000,
            suspend_ack_timeout_ms: 500,
        }
    }
}

impl LifecycleConfig {
    pub fn resume_timeout(&self) -> Duration {
        Duration::from_millis(self.resume_timeout_ms)
    }

    pub fn suspend_ack_timeout(&self) -> Duration {
        Duration::from_millis(self.suspend_ack_timeout_ms)
    }
}

/// 音频 / 视频循环配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    /// 采样率（Hz）
    pub sample_rate_hz: u32,
    /// 每次采集的样本数
    pub capture_chunk: usize,
    /// 采集缓冲区容量（样本数），超出后丢弃最旧样本
    pub capture_buffer_capacity: usize,
    /// 每次播放写入的样本数
    pub playback_chunk: usize,
    /// 播放缓冲区容量（样本数）
    pub playback_buffer_capacity: usize,
    /// 视频帧缓冲区容量（帧数）
    pub frame_buffer_capacity: usize,
    /// 视觉循环周期（毫秒）
    pub vision_period_ms: u64,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 16_000,
            capture_chunk: 512,
            capture_buffer_capacity: 16_000,
            playback_chunk: 512,
            playback_buffer_capacity: 48_000,
            frame_buffer_capacity: 4,
            vision_period_ms: 66,
        }
    }
}

impl IoConfig {
    /// 一个音频块对应的时长
    pub fn chunk_period(&self, chunk: usize) -> Duration {
        Duration::from_secs_f64(chunk as f64 / self.sample_rate_hz.max(1) as f64)
    }

    pub fn vision_period(&self) -> Duration {
        Duration::from_millis(self.vision_period_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = SatelliteConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.motion.frequency_hz, 100.0);
        assert_eq!(config.arbiter.acquire_timeout(), Duration::from_millis(20));
        assert_eq!(config.sway.on_threshold_dbfs, -35.0);
        assert_eq!(config.sway.off_threshold_dbfs, -45.0);
        assert_eq!(config.breathing.antenna_frequency_hz, 0.5);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SatelliteConfig::from_toml_str(
            r#"
            [arbiter]
            acquire_timeout_ms = 35

            [sway]
            on_threshold_dbfs = -30.0

            [limits]
            max_pitch_deg = 30.0
            "#,
        )
        .unwrap();

        assert_eq!(config.arbiter.acquire_timeout_ms, 35);
        assert_eq!(config.arbiter.contention_threshold, 50);
        assert_eq!(config.sway.on_threshold_dbfs, -30.0);
        assert_eq!(config.sway.off_threshold_dbfs, -45.0);
        assert_eq!(config.limits.max_pitch_deg, 30.0);
        assert_eq!(config.limits.max_roll_deg, 40.0);
        assert_eq!(config.motion, MotionConfig::default());
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let result = SatelliteConfig::from_toml_str(
            r#"
            [sway]
            on_threshold_dbfs = -50.0
            off_threshold_dbfs = -40.0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_zero_frequency() {
        let mut config = SatelliteConfig::default();
        config.motion.frequency_hz = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_non_finite_floats() {
        for (toml, field) in [
            ("[motion]\ndt_clamp_multiplier = nan", "dt_clamp_multiplier"),
            ("[motion]\nfrequency_hz = inf", "frequency_hz"),
            ("[breathing]\nantenna_frequency_hz = nan", "antenna_frequency_hz"),
            ("[breathing]\nz_amplitude_mm = nan", "z_amplitude_mm"),
            ("[sway]\non_threshold_dbfs = nan", "on_threshold_dbfs"),
            ("[sway]\noff_threshold_dbfs = -inf", "off_threshold_dbfs"),
            (
                "[sway.yaw]\nfrequency_hz = nan\namplitude = 6.0",
                "sway.yaw.frequency_hz",
            ),
        ] {
            match SatelliteConfig::from_toml_str(toml) {
                Err(ConfigError::Invalid(msg)) => assert!(msg.contains(field), "{}", msg),
                other => panic!("{:?} accepted: {:?}", toml, other),
            }
        }
    }

    #[test]
    fn test_validate_rejects_unrepresentable_dt_clamp() {
        let mut config = SatelliteConfig::default();
        config.motion.dt_clamp_multiplier = 1e300;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.motion.dt_clamp_multiplier = 2.0;
        config.motion.frequency_hz = 1e-300;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_negative_limit() {
        let mut config = SatelliteConfig::default();
        config.limits.max_pitch_deg = -1.0;
        match config.validate() {
            Err(ConfigError::Invalid(msg)) => assert!(msg.contains("max_pitch_deg"), "{}", msg),
            other => panic!("Expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error() {
        let result = SatelliteConfig::from_toml_str("[motion\nfrequency_hz = ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[motion]\nfrequency_hz = 50.0").unwrap();

        let config = SatelliteConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.motion.frequency_hz, 50.0);
        assert_eq!(config.motion.period(), Duration::from_millis(20));
    }

    #[test]
    fn test_load_missing_file() {
        let result = SatelliteConfig::load_from_file("/nonexistent/satellite.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_oscillator_sample() {
        let osc = OscillatorConfig::new(1.0, 2.0, 0.0);
        assert!(osc.sample(0.0).abs() < 1e-12);
        assert!((osc.sample(0.25) - 2.0).abs() < 1e-12);
    }
}
