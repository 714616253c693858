//! Mock 硬件链路（用于测试和仿真）
//!
//! `MockLink` 记录所有下发的位姿，产生合成的麦克风音频（正弦音）和递增编号的视频帧。
//! 通过共享的 `MockLinkProbe` 可以在链路被仲裁器接管后继续观察和注入故障。

use crate::{HardwareLink, LinkError, VideoFrame};
use parking_lot::Mutex;
use rand::Rng;
use satellite_protocol::Pose;
use std::f32::consts::TAU;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 合成音频采样率
const MOCK_SAMPLE_RATE: f32 = 16_000.0;
/// 合成音频频率
const MOCK_TONE_HZ: f32 = 440.0;

#[derive(Debug)]
struct MockShared {
    created: Instant,
    /// 下发的位姿及其相对创建时刻的时间
    poses: Mutex<Vec<(Duration, Pose)>>,
    audio_read: AtomicU64,
    audio_written: AtomicU64,
    frames: AtomicU64,
    reject_poses: AtomicBool,
    disconnected: AtomicBool,
    /// 合成音频幅值（f64 位模式）
    tone_amplitude: AtomicU64,
}

/// Mock 链路
#[derive(Debug)]
pub struct MockLink {
    shared: Arc<MockShared>,
    /// 每次操作的固定耗时
    op_delay: Duration,
    /// 额外的随机抖动上限
    jitter: Duration,
    tone_phase: f32,
}

impl MockLink {
    pub fn new() -> Self {
        let shared = MockShared {
            created: Instant::now(),
            poses: Mutex::new(Vec::new()),
            audio_read: AtomicU64::new(0),
            audio_written: AtomicU64::new(0),
            frames: AtomicU64::new(0),
            reject_poses: AtomicBool::new(false),
            disconnected: AtomicBool::new(false),
            tone_amplitude: AtomicU64::new(f64::to_bits(0.1)),
        };
        Self {
            shared: Arc::new(shared),
            op_delay: Duration::ZERO,
            jitter: Duration::ZERO,
            tone_phase: 0.0,
        }
    }

    /// 每次操作占用链路的时长（模拟慢速硬件）
    pub fn with_op_delay(mut self, delay: Duration) -> Self {
        self.op_delay = delay;
        self
    }

    /// 每次操作附加 `[0, jitter]` 的随机耗时
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// 获取观察/注入句柄
    pub fn probe(&self) -> MockLinkProbe {
        MockLinkProbe {
            shared: self.shared.clone(),
        }
    }

    fn simulate_latency(&self) {
        let mut delay = self.op_delay;
        if !self.jitter.is_zero() {
            let max_us = self.jitter.as_micros() as u64;
            delay += Duration::from_micros(rand::thread_rng().gen_range(0..=max_us));
        }
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }

    fn check_connected(&self) -> Result<(), LinkError> {
        if self.shared.disconnected.load(Ordering::Acquire) {
            Err(LinkError::Disconnected)
        } else {
            Ok(())
        }
    }
}

impl Default for MockLink {
    fn default() -> Self {
        Self::new()
    }
}

impl HardwareLink for MockLink {
    fn send_pose(&mut self, pose: &Pose) -> Result<(), LinkError> {
        self.check_connected()?;
        self.simulate_latency();
        if self.shared.reject_poses.load(Ordering::Acquire) {
            return Err(LinkError::Rejected("mock link rejects poses".to_string()));
        }
        let at = self.shared.created.elapsed();
        self.shared.poses.lock().push((at, *pose));
        Ok(())
    }

    fn read_audio(&mut self, out: &mut Vec<f32>, max_samples: usize) -> Result<usize, LinkError> {
        self.check_connected()?;
        self.simulate_latency();
        let amplitude = f64::from_bits(self.shared.tone_amplitude.load(Ordering::Relaxed)) as f32;
        let step = TAU * MOCK_TONE_HZ / MOCK_SAMPLE_RATE;
        out.reserve(max_samples);
        for _ in 0..max_samples {
            out.push(amplitude * self.tone_phase.sin());
            self.tone_phase = (self.tone_phase + step) % TAU;
        }
        self.shared
            .audio_read
            .fetch_add(max_samples as u64, Ordering::Relaxed);
        Ok(max_samples)
    }

    fn write_audio(&mut self, samples: &[f32]) -> Result<usize, LinkError> {
        self.check_connected()?;
        self.simulate_latency();
        self.shared
            .audio_written
            .fetch_add(samples.len() as u64, Ordering::Relaxed);
        Ok(samples.len())
    }

    fn read_frame(&mut self) -> Result<Option<VideoFrame>, LinkError> {
        self.check_connected()?;
        self.simulate_latency();
        let index = self.shared.frames.fetch_add(1, Ordering::Relaxed);
        Ok(Some(VideoFrame {
            width: 4,
            height: 4,
            data: vec![(index % 256) as u8; 16],
            timestamp_us: index * 66_000,
        }))
    }

    fn is_connected(&self) -> bool {
        !self.shared.disconnected.load(Ordering::Acquire)
    }
}

/// Mock 链路的观察/注入句柄
#[derive(Debug, Clone)]
pub struct MockLinkProbe {
    shared: Arc<MockShared>,
}

impl MockLinkProbe {
    /// 已下发的位姿数量
    pub fn pose_count(&self) -> usize {
        self.shared.poses.lock().len()
    }

    /// 最后一个下发的位姿
    pub fn last_pose(&self) -> Option<Pose> {
        self.shared.poses.lock().last().map(|(_, pose)| *pose)
    }

    /// 所有已下发的位姿
    pub fn poses(&self) -> Vec<Pose> {
        self.shared.poses.lock().iter().map(|(_, pose)| *pose).collect()
    }

    /// 所有已下发的位姿及其下发时刻（相对链路创建）
    pub fn timed_poses(&self) -> Vec<(Duration, Pose)> {
        self.shared.poses.lock().clone()
    }

    pub fn clear_poses(&self) {
        self.shared.poses.lock().clear();
    }

    pub fn audio_samples_read(&self) -> u64 {
        self.shared.audio_read.load(Ordering::Relaxed)
    }

    pub fn audio_samples_written(&self) -> u64 {
        self.shared.audio_written.load(Ordering::Relaxed)
    }

    pub fn frames_read(&self) -> u64 {
        self.shared.frames.load(Ordering::Relaxed)
    }

    /// 让链路拒绝后续所有位姿
    pub fn set_reject_poses(&self, reject: bool) {
        self.shared.reject_poses.store(reject, Ordering::Release);
    }

    /// 模拟链路丢失
    pub fn disconnect(&self) {
        self.shared.disconnected.store(true, Ordering::Release);
    }

    /// 设置合成麦克风音频的幅值
    pub fn set_tone_amplitude(&self, amplitude: f32) {
        self.shared
            .tone_amplitude
            .store(f64::to_bits(amplitude as f64), Ordering::Relaxed);
    }
}
