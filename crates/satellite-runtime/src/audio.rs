//! 音频采集 / 播放循环
//!
//! 两个循环都以音频块时长为周期，通过 `LinkArbiter::acquire_or_flush` 访问链路：
//! - 采集：LISTENING / SPEAKING 期间阻塞获取，永不丢样本；其他状态有界等待，
//!   超时清空采集缓冲区并跳过本轮
//! - 播放：有界等待，超时清空待播放样本；每个写出的块计算 dBFS 响度，
//!   写入 `LoudnessFeed` 供语音摆动层使用

use crate::error::SatelliteError;
use crate::metrics::LoopMetrics;
use crate::worker::{IoWorker, impl_io_service};
use crossbeam_channel::{Receiver, Sender, bounded};
use satellite_link::{BoundedBuffer, Caller, FlushableBuffer, HardwareLink, LinkArbiter};
use satellite_motion::{LoudnessFeed, StateCell};
use satellite_tools::IoConfig;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

/// 静音时报告的响度下限（dBFS）
pub const DBFS_FLOOR: f64 = -100.0;

/// 计算一段样本的 RMS 响度（dBFS，满幅正弦约为 -3 dBFS）
pub fn dbfs(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return DBFS_FLOOR;
    }
    let mean_square =
        samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum::<f64>() / samples.len() as f64;
    if mean_square <= 0.0 {
        return DBFS_FLOOR;
    }
    (10.0 * mean_square.log10()).max(DBFS_FLOOR)
}

/// 采集样本的接收方（唤醒词检测、语音识别等）
pub trait CaptureSink: Send + 'static {
    fn on_samples(&mut self, samples: &[f32]);
}

impl<F: FnMut(&[f32]) + Send + 'static> CaptureSink for F {
    fn on_samples(&mut self, samples: &[f32]) {
        self(samples)
    }
}

/// 待播放样本的来源（语音合成）
pub trait PlaybackSource: Send + 'static {
    /// 向 `out` 追加最多 `max` 个样本；返回追加数量（0 表示当前无内容）
    fn fill(&mut self, out: &mut Vec<f32>, max: usize) -> usize;
}

impl<P: PlaybackSource + ?Sized> PlaybackSource for Box<P> {
    fn fill(&mut self, out: &mut Vec<f32>, max: usize) -> usize {
        (**self).fill(out, max)
    }
}

/// 通道驱动的播放源
///
/// 语音合成按任意大小的片段推送样本，播放循环按块取出；片段中未取完的样本保留到下一轮。
#[derive(Debug)]
pub struct ChannelSource {
    rx: Receiver<Vec<f32>>,
    pending: VecDeque<f32>,
}

/// 创建播放通道（容量以片段计）
pub fn playback_channel(capacity: usize) -> (Sender<Vec<f32>>, ChannelSource) {
    let (tx, rx) = bounded(capacity.max(1));
    (
        tx,
        ChannelSource {
            rx,
            pending: VecDeque::new(),
        },
    )
}

impl PlaybackSource for ChannelSource {
    fn fill(&mut self, out: &mut Vec<f32>, max: usize) -> usize {
        while self.pending.len() < max {
            match self.rx.try_recv() {
                Ok(segment) => self.pending.extend(segment),
                Err(_) => break,
            }
        }
        let n = max.min(self.pending.len());
        out.extend(self.pending.drain(..n));
        n
    }
}

/// 音频采集循环
pub struct AudioCaptureLoop {
    worker: IoWorker,
}

impl AudioCaptureLoop {
    /// 启动采集线程
    ///
    /// # 参数
    /// - `arbiter`: 共享的链路仲裁器
    /// - `state`: 机器人状态（决定获取策略；SLEEPING / SUSPENDED 下启动即挂起）
    /// - `sink`: 采集样本接收方
    /// - `config`: 块大小与缓冲区容量
    /// - `ack_timeout`: 挂起握手超时
    pub fn spawn<L, S>(
        arbiter: Arc<LinkArbiter<L>>,
        state: Arc<StateCell>,
        mut sink: S,
        config: &IoConfig,
        ack_timeout: Duration,
    ) -> Result<Self, SatelliteError>
    where
        L: HardwareLink + 'static,
        S: CaptureSink,
    {
        let chunk = config.capture_chunk.max(1);
        let period = config.chunk_period(chunk);
        let capacity = config.capture_buffer_capacity.max(chunk);

        let asleep = !state.get().computes_pose();
        let worker = IoWorker::spawn("audio-capture", ack_timeout, asleep, move |control, metrics| {
            let mut buffer = BoundedBuffer::<f32>::new(capacity);
            let mut scratch = Vec::with_capacity(chunk);
            let mut next = Instant::now();

            while control.checkpoint(|| {
                buffer.flush();
            }) {
                let robot_state = state.get();
                match arbiter.acquire_or_flush(Caller::AudioCapture, robot_state, &mut buffer) {
                    Some(mut link) => {
                        scratch.clear();
                        match link.read_audio(&mut scratch, chunk) {
                            Ok(n) => {
                                buffer.extend_from_slice(&scratch[..n.min(scratch.len())]);
                                LoopMetrics::add(&metrics.items, n);
                            },
                            Err(e) if e.is_fatal() => {
                                error!("Capture loop: {}, exiting", e);
                                return;
                            },
                            Err(e) => warn!("Capture read failed: {}", e),
                        }
                    },
                    None => {
                        metrics.skipped.fetch_add(1, Ordering::Relaxed);
                    },
                }

                // 链路已释放，交付给下游
                if !buffer.is_empty() {
                    let samples = buffer.take_front(chunk);
                    sink.on_samples(&samples);
                    LoopMetrics::add(&metrics.delivered, samples.len());
                }

                metrics.cycles.fetch_add(1, Ordering::Relaxed);
                next = pace(next, period);
            }
            debug!("Capture loop exiting");
        })?;

        Ok(Self { worker })
    }
}

impl_io_service!(AudioCaptureLoop);

/// 音频播放循环
pub struct AudioPlaybackLoop {
    worker: IoWorker,
}

impl AudioPlaybackLoop {
    /// 启动播放线程
    ///
    /// 无待播放内容时 `LoudnessFeed` 标记为未播放，语音摆动层随之衰减。
    pub fn spawn<L, P>(
        arbiter: Arc<LinkArbiter<L>>,
        state: Arc<StateCell>,
        loudness: Arc<LoudnessFeed>,
        mut source: P,
        config: &IoConfig,
        ack_timeout: Duration,
    ) -> Result<Self, SatelliteError>
    where
        L: HardwareLink + 'static,
        P: PlaybackSource,
    {
        let chunk = config.playback_chunk.max(1);
        let period = config.chunk_period(chunk);
        let capacity = config.playback_buffer_capacity.max(chunk);

        let asleep = !state.get().computes_pose();
        let worker = IoWorker::spawn("audio-playback", ack_timeout, asleep, move |control, metrics| {
            let mut buffer = BoundedBuffer::<f32>::new(capacity);
            let mut scratch = Vec::with_capacity(chunk);
            let mut next = Instant::now();

            while control.checkpoint(|| {
                buffer.flush();
                loudness.set_playing(false);
            }) {
                if buffer.capacity() - buffer.len() >= chunk {
                    scratch.clear();
                    let n = source.fill(&mut scratch, chunk);
                    buffer.extend_from_slice(&scratch[..n.min(scratch.len())]);
                }

                if buffer.is_empty() {
                    loudness.set_playing(false);
                } else {
                    let robot_state = state.get();
                    match arbiter.acquire_or_flush(Caller::AudioPlayback, robot_state, &mut buffer)
                    {
                        Some(mut link) => {
                            let samples = buffer.take_front(chunk);
                            match link.write_audio(&samples) {
                                Ok(written) => {
                                    drop(link);
                                    // 未写出的部分放回队首，下轮继续
                                    for &sample in samples[written.min(samples.len())..].iter().rev()
                                    {
                                        buffer.push_front(sample);
                                    }
                                    let level = dbfs(&samples[..written.min(samples.len())]);
                                    loudness.set_dbfs(level);
                                    loudness.set_playing(true);
                                    LoopMetrics::add(&metrics.items, written);
                                    LoopMetrics::add(&metrics.delivered, written);
                                    trace!("Played {} samples at {:.1} dBFS", written, level);
                                },
                                Err(e) if e.is_fatal() => {
                                    error!("Playback loop: {}, exiting", e);
                                    loudness.set_playing(false);
                                    return;
                                },
                                Err(e) => {
                                    drop(link);
                                    warn!("Playback write failed: {}", e);
                                    for &sample in samples.iter().rev() {
                                        buffer.push_front(sample);
                                    }
                                    loudness.set_playing(false);
                                },
                            }
                        },
                        None => {
                            loudness.set_playing(false);
                            metrics.skipped.fetch_add(1, Ordering::Relaxed);
                        },
                    }
                }

                metrics.cycles.fetch_add(1, Ordering::Relaxed);
                next = pace(next, period);
            }
            loudness.set_playing(false);
            debug!("Playback loop exiting");
        })?;

        Ok(Self { worker })
    }
}

impl_io_service!(AudioPlaybackLoop);

/// 按固定周期推进截止时间并睡眠；落后超过一个周期时从当前时刻重新对齐
pub(crate) fn pace(next: Instant, period: Duration) -> Instant {
    let now = Instant::now();
    let mut deadline = next + period;
    if deadline + period < now {
        deadline = now + period;
    }
    if let Some(remaining) = deadline.checked_duration_since(now) {
        spin_sleep::sleep(remaining);
    }
    deadline
}
