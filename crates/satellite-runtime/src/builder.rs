//! Builder 模式实现
//!
//! 提供链式构造 `Satellite` 实例的便捷方式：配置、动作库、协作方（采集 / 播放 / 视觉）、
//! 额外的可挂起服务，最后传入硬件链路启动所有线程。

use crate::audio::{AudioCaptureLoop, AudioPlaybackLoop, CaptureSink, PlaybackSource};
use crate::dispatcher::{DispatchOutcome, EventDispatcher};
use crate::error::SatelliteError;
use crate::lifecycle::LifecycleManager;
use crate::metrics::LoopMetricsSnapshot;
use crate::observer::Observer;
use crate::service::SleepAwareService;
use crate::vision::{FrameSink, VisionLoop};
use satellite_link::{
    HardwareLink, HealthBoard, HealthSignal, LinkArbiter, ServiceFailure, TransitionPhase,
    VideoFrame,
};
use satellite_motion::{
    ActionLibrary, LoudnessFeed, MotionError, MotionHandle, MotionLoopConfig, MotionShared,
    MoveLibrary, StateCell, TrackingFeed,
};
use satellite_protocol::{MovePriority, Pose, RobotState, SatelliteEvent};
use satellite_tools::SatelliteConfig;
use std::sync::Arc;
use tracing::{info, warn};

/// Satellite Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// # #[cfg(feature = "mock")]
/// # {
/// use satellite_link::MockLink;
/// use satellite_runtime::SatelliteBuilder;
/// use satellite_tools::SatelliteConfig;
///
/// let satellite = SatelliteBuilder::new()
///     .config(SatelliteConfig::default())
///     .capture_sink(|samples: &[f32]| {
///         let _ = samples.len();
///     })
///     .build(MockLink::new())
///     .unwrap();
/// # }
/// ```
pub struct SatelliteBuilder {
    config: SatelliteConfig,
    initial_state: RobotState,
    moves: Option<MoveLibrary>,
    actions: Option<ActionLibrary>,
    capture: Option<Box<dyn CaptureSink>>,
    playback: Option<Box<dyn PlaybackSource>>,
    vision: Option<Box<dyn FrameSink>>,
    services: Vec<Arc<dyn SleepAwareService>>,
}

impl SatelliteBuilder {
    pub fn new() -> Self {
        Self {
            config: SatelliteConfig::default(),
            initial_state: RobotState::Idle,
            moves: None,
            actions: None,
            capture: None,
            playback: None,
            vision: None,
            services: Vec::new(),
        }
    }

    /// 设置运行时配置（默认 `SatelliteConfig::default()`）
    pub fn config(mut self, config: SatelliteConfig) -> Self {
        self.config = config;
        self
    }

    /// 启动时的状态（默认 IDLE）
    pub fn initial_state(mut self, state: RobotState) -> Self {
        self.initial_state = state;
        self
    }

    /// 替换 Move 库（默认内置库）
    pub fn move_library(mut self, moves: MoveLibrary) -> Self {
        self.moves = Some(moves);
        self
    }

    /// 替换 Action 库（默认内置库）
    pub fn action_library(mut self, actions: ActionLibrary) -> Self {
        self.actions = Some(actions);
        self
    }

    /// 设置采集样本接收方；未设置时不启动采集循环
    pub fn capture_sink(mut self, sink: impl CaptureSink) -> Self {
        self.capture = Some(Box::new(sink));
        self
    }

    /// 设置播放源；未设置时不启动播放循环
    pub fn playback_source(mut self, source: impl PlaybackSource) -> Self {
        self.playback = Some(Box::new(source));
        self
    }

    /// 设置视频帧接收方；未设置时不启动视觉循环
    pub fn frame_sink(mut self, sink: impl FrameSink) -> Self {
        self.vision = Some(Box::new(sink));
        self
    }

    /// 注册额外的可挂起服务（排在内置服务之后）
    pub fn service(mut self, service: Arc<dyn SleepAwareService>) -> Self {
        self.services.push(service);
        self
    }

    /// 构建并启动
    ///
    /// 服务注册顺序：运动、采集、播放、视觉、额外服务。
    /// 初始状态为 SLEEPING / SUSPENDED 时 I/O 循环以挂起状态启动，
    /// 额外服务在注册后立即 `suspend()`，直到唤醒 / 重连时统一恢复。
    pub fn build<L: HardwareLink + 'static>(self, link: L) -> Result<Satellite<L>, SatelliteError> {
        self.config.validate()?;
        let config = self.config;

        let health = Arc::new(HealthBoard::new());
        let state = Arc::new(StateCell::new(self.initial_state));
        let arbiter = Arc::new(LinkArbiter::new(link, &config.arbiter, health.clone()));
        let shared = Arc::new(MotionShared::new(state.clone(), health.clone()));

        let mut motion = MotionHandle::spawn(
            arbiter.clone(),
            shared.clone(),
            MotionLoopConfig::from(&config),
            &config.lifecycle,
        )?;
        if self.moves.is_some() || self.actions.is_some() {
            motion = motion.with_libraries(
                self.moves.unwrap_or_else(MoveLibrary::builtin),
                self.actions.unwrap_or_else(ActionLibrary::builtin),
            );
        }
        let motion = Arc::new(motion);

        let lifecycle = Arc::new(LifecycleManager::new(state.clone(), health.clone()));
        lifecycle.register(motion.clone());

        let ack_timeout = config.lifecycle.suspend_ack_timeout();

        let capture = match self.capture {
            Some(mut sink) => {
                let capture = Arc::new(AudioCaptureLoop::spawn(
                    arbiter.clone(),
                    state.clone(),
                    move |samples: &[f32]| sink.on_samples(samples),
                    &config.io,
                    ack_timeout,
                )?);
                lifecycle.register(capture.clone());
                Some(capture)
            },
            None => None,
        };

        let playback = match self.playback {
            Some(source) => {
                let playback = Arc::new(AudioPlaybackLoop::spawn(
                    arbiter.clone(),
                    state.clone(),
                    shared.loudness.clone(),
                    source,
                    &config.io,
                    ack_timeout,
                )?);
                lifecycle.register(playback.clone());
                Some(playback)
            },
            None => None,
        };

        let vision = match self.vision {
            Some(mut sink) => {
                let vision = Arc::new(VisionLoop::spawn(
                    arbiter.clone(),
                    state.clone(),
                    shared.tracking.clone(),
                    move |frame: &VideoFrame, tracking: &TrackingFeed| sink.on_frame(frame, tracking),
                    &config.io,
                    ack_timeout,
                )?);
                lifecycle.register(vision.clone());
                Some(vision)
            },
            None => None,
        };

        let asleep = !self.initial_state.computes_pose();
        for service in self.services {
            if asleep && let Err(e) = service.suspend() {
                warn!("Service '{}' failed to suspend at startup: {}", service.name(), e);
                health.report(HealthSignal::ServiceFailure(ServiceFailure {
                    service: service.name().to_string(),
                    phase: TransitionPhase::Suspend,
                    reason: e.to_string(),
                }));
            }
            lifecycle.register(service);
        }

        let dispatcher = EventDispatcher::new(state.clone(), lifecycle.clone(), motion.clone());
        let observer = Observer::new(shared.clone(), arbiter.clone(), health.clone());

        info!(
            "Satellite started ({} services: {})",
            lifecycle.service_names().len(),
            lifecycle.service_names().join(", ")
        );

        Ok(Satellite {
            config,
            arbiter,
            dispatcher,
            lifecycle,
            capture,
            playback,
            vision,
            motion,
            shared,
            observer,
        })
    }
}

impl Default for SatelliteBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 运行中的 Satellite 核心
///
/// 持有所有线程；drop 时按 注销服务 → 停止 I/O 循环 → 停止控制循环 的顺序关闭。
pub struct Satellite<L: HardwareLink + 'static> {
    config: SatelliteConfig,
    arbiter: Arc<LinkArbiter<L>>,
    dispatcher: EventDispatcher,
    lifecycle: Arc<LifecycleManager>,
    capture: Option<Arc<AudioCaptureLoop>>,
    playback: Option<Arc<AudioPlaybackLoop>>,
    vision: Option<Arc<VisionLoop>>,
    motion: Arc<MotionHandle>,
    shared: Arc<MotionShared>,
    observer: Observer<L>,
}

impl<L: HardwareLink + 'static> Satellite<L> {
    /// 投递一个外部事件
    pub fn dispatch(&self, event: SatelliteEvent) -> DispatchOutcome {
        self.dispatcher.dispatch(event)
    }

    pub fn request_move(&self, name: &str, priority: MovePriority) -> Result<(), MotionError> {
        self.motion.request_move(name, priority)
    }

    pub fn request_action(&self, name: &str) -> Result<(), MotionError> {
        self.motion.request_action(name)
    }

    pub fn set_target(&self, pose: Pose) -> Result<(), MotionError> {
        self.motion.set_target(pose)
    }

    pub fn clear_moves(&self) -> Result<(), MotionError> {
        self.motion.clear_moves()
    }

    /// 头部跟踪偏移输入
    pub fn tracking(&self) -> &Arc<TrackingFeed> {
        &self.shared.tracking
    }

    /// 播放响度输入（未启用播放循环时可由外部写入）
    pub fn loudness(&self) -> &Arc<LoudnessFeed> {
        &self.shared.loudness
    }

    pub fn observer(&self) -> Observer<L> {
        self.observer.clone()
    }

    pub fn lifecycle(&self) -> &Arc<LifecycleManager> {
        &self.lifecycle
    }

    /// 共享的链路仲裁器（外部调用方也必须经由它访问链路）
    pub fn arbiter(&self) -> &Arc<LinkArbiter<L>> {
        &self.arbiter
    }

    pub fn motion(&self) -> &Arc<MotionHandle> {
        &self.motion
    }

    pub fn config(&self) -> &SatelliteConfig {
        &self.config
    }

    pub fn state(&self) -> RobotState {
        self.shared.state.get()
    }

    pub fn capture_metrics(&self) -> Option<LoopMetricsSnapshot> {
        self.capture.as_ref().map(|c| c.metrics())
    }

    pub fn playback_metrics(&self) -> Option<LoopMetricsSnapshot> {
        self.playback.as_ref().map(|p| p.metrics())
    }

    pub fn vision_metrics(&self) -> Option<LoopMetricsSnapshot> {
        self.vision.as_ref().map(|v| v.metrics())
    }

    /// 停止所有线程
    pub fn shutdown(self) {
        drop(self);
    }
}

impl<L: HardwareLink + 'static> Drop for Satellite<L> {
    fn drop(&mut self) {
        info!("Shutting down satellite");
        // 注销后 I/O 循环和控制循环的最后一个引用随字段一起释放
        self.lifecycle.clear();
        self.capture.take();
        self.playback.take();
        self.vision.take();
    }
}
