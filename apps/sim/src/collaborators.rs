//! 合成协作方
//!
//! 模拟器里代替真实语音前端、人脸检测和其他链路用户的组件。

use anyhow::{Context, Result};
use rand::Rng;
use satellite_sdk::link::{AcquireMode, Caller, LinkArbiter, MockLink};
use satellite_sdk::motion::TrackingFeed;
use satellite_sdk::prelude::*;
use satellite_sdk::runtime::dbfs;
use std::f64::consts::TAU;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info};

/// 协作方统计
#[derive(Debug)]
pub struct SimStats {
    pub mic_samples: AtomicU64,
    /// 最近一个采集块的响度（f64 位模式）
    mic_dbfs: AtomicU64,
    pub frames: AtomicU64,
    pub contention_holds: AtomicU64,
}

impl SimStats {
    pub fn new() -> Self {
        Self {
            mic_samples: AtomicU64::new(0),
            mic_dbfs: AtomicU64::new(f64::NEG_INFINITY.to_bits()),
            frames: AtomicU64::new(0),
            contention_holds: AtomicU64::new(0),
        }
    }

    pub fn mic_dbfs(&self) -> f64 {
        f64::from_bits(self.mic_dbfs.load(Ordering::Relaxed))
    }
}

/// 麦克风接收方：统计样本数和响度
pub fn microphone(stats: Arc<SimStats>) -> impl FnMut(&[f32]) + Send + 'static {
    move |samples: &[f32]| {
        stats
            .mic_samples
            .fetch_add(samples.len() as u64, Ordering::Relaxed);
        stats
            .mic_dbfs
            .store(dbfs(samples).to_bits(), Ordering::Relaxed);
    }
}

/// 人脸跟踪：假设一张缓慢左右移动的人脸，按帧时间戳输出头部偏移
pub fn face_tracker(
    stats: Arc<SimStats>,
) -> impl FnMut(&VideoFrame, &TrackingFeed) + Send + 'static {
    move |frame: &VideoFrame, tracking: &TrackingFeed| {
        stats.frames.fetch_add(1, Ordering::Relaxed);
        let t = frame.timestamp_us as f64 / 1e6;
        let yaw = 12.0 * (TAU * 0.1 * t).sin();
        let pitch = 4.0 * (TAU * 0.07 * t).sin();
        tracking.push(PoseOffset::rotation(0.0, pitch, yaw));
    }
}

/// 合成语音：220Hz 基音乘以 4Hz 音节包络，叠加少量噪声
pub fn synthetic_speech(duration: Duration, sample_rate: u32) -> Vec<f32> {
    let rate = sample_rate.max(1) as f64;
    let len = (duration.as_secs_f64() * rate) as usize;
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|n| {
            let t = n as f64 / rate;
            let syllable = 0.5 - 0.5 * (TAU * 4.0 * t).cos();
            let voice = 0.3 * syllable * (TAU * 220.0 * t).sin();
            (voice + rng.gen_range(-0.005..0.005)) as f32
        })
        .collect()
}

/// 注入竞争：后台线程反复占用链路 `hold`，直到 `running` 置为 false
pub fn spawn_contention(
    arbiter: Arc<LinkArbiter<MockLink>>,
    hold: Duration,
    stats: Arc<SimStats>,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    info!("Injecting link contention ({:?} per hold)", hold);
    thread::Builder::new()
        .name("sim-contention".into())
        .spawn(move || {
            let mut rng = rand::thread_rng();
            while running.load(Ordering::SeqCst) {
                // 以视觉身份占用：有界等待，不影响对话期间的采集
                match arbiter.acquire(Caller::Vision, AcquireMode::Bounded(hold * 4)) {
                    Ok(_guard) => {
                        stats.contention_holds.fetch_add(1, Ordering::Relaxed);
                        thread::sleep(hold);
                    },
                    Err(e) => debug!("Contention thread: {}", e),
                }
                thread::sleep(Duration::from_micros(rng.gen_range(0..2_000)));
            }
        })
        .context("Failed to spawn contention thread")
}
