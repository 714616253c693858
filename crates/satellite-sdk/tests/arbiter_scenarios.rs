//! 链路仲裁场景测试
//!
//! 在完整运行时（控制循环 + 音视频循环）下验证：
//! - 任意时刻最多一个调用方持有链路
//! - 对话期间音频采集永不超时、永不清空
//! - 非优先调用方超时后缓冲区在下一轮之前已清空

use satellite_sdk::link::{
    AcquireMode, BoundedBuffer, Caller, FlushableBuffer, LinkArbiter, MockLink,
};
use satellite_sdk::prelude::*;
use serial_test::serial;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// 检测并发访问的链路包装
struct ExclusiveLink {
    inner: MockLink,
    inside: Arc<AtomicUsize>,
    violations: Arc<AtomicUsize>,
}

impl ExclusiveLink {
    fn enter(&self) {
        if self.inside.fetch_add(1, Ordering::SeqCst) > 0 {
            self.violations.fetch_add(1, Ordering::SeqCst);
        }
        thread::sleep(Duration::from_micros(200));
    }

    fn leave(&self) {
        self.inside.fetch_sub(1, Ordering::SeqCst);
    }
}

impl HardwareLink for ExclusiveLink {
    fn send_pose(&mut self, pose: &Pose) -> Result<(), LinkError> {
        self.enter();
        let result = self.inner.send_pose(pose);
        self.leave();
        result
    }

    fn read_audio(&mut self, out: &mut Vec<f32>, max_samples: usize) -> Result<usize, LinkError> {
        self.enter();
        let result = self.inner.read_audio(out, max_samples);
        self.leave();
        result
    }

    fn write_audio(&mut self, samples: &[f32]) -> Result<usize, LinkError> {
        self.enter();
        let result = self.inner.write_audio(samples);
        self.leave();
        result
    }

    fn read_frame(&mut self) -> Result<Option<VideoFrame>, LinkError> {
        self.enter();
        let result = self.inner.read_frame();
        self.leave();
        result
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }
}

/// 持续抢占链路的干扰线程：每次持有 `hold`，直到 `stop` 置位
fn spawn_hog<L: HardwareLink + 'static>(
    arbiter: Arc<LinkArbiter<L>>,
    hold: Duration,
    stop: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while !stop.load(Ordering::Acquire) {
            let mode = AcquireMode::Bounded(Duration::from_millis(100));
            if let Ok(_guard) = arbiter.acquire(Caller::Vision, mode) {
                thread::sleep(hold);
            }
            thread::yield_now();
        }
    })
}

fn contended_config() -> SatelliteConfig {
    let mut config = SatelliteConfig::default();
    config.arbiter.acquire_timeout_ms = 2;
    config.motion.submit_timeout_ms = 2;
    config
}

#[test]
#[serial]
fn test_exclusive_access_under_full_load() {
    let inside = Arc::new(AtomicUsize::new(0));
    let violations = Arc::new(AtomicUsize::new(0));
    let link = ExclusiveLink {
        inner: MockLink::new().with_jitter(Duration::from_micros(300)),
        inside: inside.clone(),
        violations: violations.clone(),
    };
    let (tts, source) = playback_channel(64);

    let satellite = SatelliteBuilder::new()
        .initial_state(RobotState::Speaking)
        .capture_sink(|_: &[f32]| {})
        .playback_source(source)
        .frame_sink(|_: &VideoFrame, _: &satellite_sdk::motion::TrackingFeed| {})
        .build(link)
        .expect("build satellite");

    for _ in 0..16 {
        tts.send(vec![0.2; 1600]).expect("queue tts audio");
    }
    thread::sleep(Duration::from_millis(500));

    let observer = satellite.observer();
    let arbiter = observer.arbiter_metrics();
    for caller in [Caller::AudioCapture, Caller::AudioPlayback, Caller::Vision, Caller::Motion] {
        assert!(
            arbiter.get(caller).acquisitions > 0,
            "{} never acquired the link",
            caller
        );
    }
    assert_eq!(violations.load(Ordering::SeqCst), 0);

    satellite.shutdown();
    assert_eq!(inside.load(Ordering::SeqCst), 0);
}

#[test]
#[serial]
fn test_conversation_capture_never_times_out() {
    let satellite = SatelliteBuilder::new()
        .config(contended_config())
        .initial_state(RobotState::Listening)
        .capture_sink(|_: &[f32]| {})
        .build(MockLink::new().with_op_delay(Duration::from_micros(500)))
        .expect("build satellite");

    let stop = Arc::new(AtomicBool::new(false));
    let hog = spawn_hog(satellite.arbiter().clone(), Duration::from_millis(8), stop.clone());

    // 对话中途切换到 SPEAKING，策略保持阻塞
    thread::sleep(Duration::from_millis(200));
    satellite.dispatch(SatelliteEvent::TtsStart { emotion: None });
    assert_eq!(satellite.state(), RobotState::Speaking);
    thread::sleep(Duration::from_millis(200));

    stop.store(true, Ordering::Release);
    hog.join().expect("hog thread");

    let metrics = satellite.observer().arbiter_metrics();
    let capture = metrics.get(Caller::AudioCapture);
    assert_eq!(capture.timeouts, 0);
    assert_eq!(capture.flushes, 0);
    assert!(capture.blocking_acquisitions > 0);
    assert_eq!(capture.blocking_acquisitions, capture.acquisitions);
    assert_eq!(satellite.capture_metrics().expect("capture loop").skipped, 0);

    // 其他调用方确实经历了竞争
    assert!(metrics.get(Caller::Motion).timeouts > 0);
}

#[test]
#[serial]
fn test_idle_capture_flushes_on_timeout() {
    let satellite = SatelliteBuilder::new()
        .config(contended_config())
        .capture_sink(|_: &[f32]| {})
        .build(MockLink::new())
        .expect("build satellite");

    let stop = Arc::new(AtomicBool::new(false));
    let hog = spawn_hog(satellite.arbiter().clone(), Duration::from_millis(10), stop.clone());
    thread::sleep(Duration::from_millis(300));
    stop.store(true, Ordering::Release);
    hog.join().expect("hog thread");

    let capture = satellite.observer().arbiter_metrics().get(Caller::AudioCapture);
    assert!(capture.timeouts > 0);
    assert_eq!(capture.flushes, capture.timeouts);
    assert!(satellite.capture_metrics().expect("capture loop").skipped > 0);
}

#[test]
#[serial]
fn test_flushed_buffer_is_empty_before_next_cycle() {
    let satellite = SatelliteBuilder::new()
        .initial_state(RobotState::Sleeping)
        .build(MockLink::new())
        .expect("build satellite");
    let arbiter = satellite.arbiter().clone();

    let guard = arbiter
        .acquire(Caller::Motion, AcquireMode::Blocking)
        .expect("hold link");
    let (buffered, flushed) = thread::scope(|scope| {
        scope
            .spawn(|| {
                let mut frames = BoundedBuffer::new(8);
                frames.extend([1u32, 2, 3, 4, 5]);
                let start = Instant::now();
                let acquired = arbiter
                    .acquire_or_flush(Caller::Vision, RobotState::Idle, &mut frames)
                    .is_some();
                assert!(start.elapsed() >= arbiter.acquire_timeout());
                (acquired, frames.len())
            })
            .join()
            .expect("contender thread")
    });
    drop(guard);

    assert!(!buffered);
    assert_eq!(flushed, 0);
    let vision = arbiter.metrics().get(Caller::Vision);
    assert_eq!(vision.flushes, 1);
    assert_eq!(vision.flushed_items, 5);
}
