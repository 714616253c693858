//! 固定频率运动控制循环
//!
//! 每个周期：
//! 1. 测量 dt（超过 `dt_clamp_multiplier × 周期` 视为时间跳变并钳位）
//! 2. 取空命令通道
//! 3. 读取一次 `RobotState` 快照
//! 4. SLEEPING / SUSPENDED / 挂起中：空转周期，不合成、不竞争链路
//! 5. 否则采样各层 → 合成 → 校验 → 以有界超时获取链路并下发；超时丢弃本周期位姿
//!
//! 链路丢失（`LinkError::Disconnected`）是唯一让循环退出的错误：状态置为 ERROR。

use crate::command::MotionCommand;
use crate::composer::{ComposeParams, LayerOffsets, compose};
use crate::layers::{
    ActionOutcome, ActionOverlay, AnimationLayer, Breathing, MoveOutcome, MoveQueue, SpeechSway,
};
use crate::layers::{LoudnessFeed, TrackingFeed};
use crate::metrics::MotionMetrics;
use crate::state::StateCell;
use arc_swap::ArcSwapOption;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use satellite_link::{AcquireMode, Caller, HardwareLink, HealthBoard, HealthSignal, LinkArbiter, LinkError};
use satellite_protocol::{Pose, PoseOffset, RobotState};
use satellite_tools::{ActionConfig, BreathingConfig, MotionConfig, SatelliteConfig, SwayConfig};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// 非 IDLE 且无 Move 时 Move 槽位回到中立位的时间常数（秒）
const SLOT_RELEASE_TAU: f64 = 0.3;

/// 控制循环配置
#[derive(Debug, Clone, Default)]
pub struct MotionLoopConfig {
    pub motion: MotionConfig,
    pub breathing: BreathingConfig,
    pub sway: SwayConfig,
    pub action: ActionConfig,
    pub compose: ComposeParams,
}

impl From<&SatelliteConfig> for MotionLoopConfig {
    fn from(config: &SatelliteConfig) -> Self {
        Self {
            motion: config.motion.clone(),
            breathing: config.breathing.clone(),
            sway: config.sway.clone(),
            action: config.action.clone(),
            compose: ComposeParams {
                limits: config.limits,
                body_follow_ratio: config.motion.body_follow_ratio,
            },
        }
    }
}

/// 最后一次下发的位姿
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSample {
    pub pose: Pose,
    /// 产出该位姿的周期序号
    pub tick: u64,
    /// 合成时使用的状态
    pub state: RobotState,
}

/// 控制循环与外部共享的状态
#[derive(Debug)]
pub struct MotionShared {
    pub state: Arc<StateCell>,
    pub loudness: Arc<LoudnessFeed>,
    pub tracking: Arc<TrackingFeed>,
    pub health: Arc<HealthBoard>,
    pub metrics: MotionMetrics,
    last_pose: ArcSwapOption<PoseSample>,
    suspended: AtomicBool,
}

impl MotionShared {
    pub fn new(state: Arc<StateCell>, health: Arc<HealthBoard>) -> Self {
        Self {
            state,
            loudness: Arc::new(LoudnessFeed::new()),
            tracking: Arc::new(TrackingFeed::new()),
            health,
            metrics: MotionMetrics::new(),
            last_pose: ArcSwapOption::empty(),
            suspended: AtomicBool::new(false),
        }
    }

    /// 最后一次成功下发的位姿
    pub fn last_pose(&self) -> Option<PoseSample> {
        self.last_pose.load().as_deref().copied()
    }

    /// 控制循环是否处于挂起
    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::Acquire)
    }
}

/// 控制循环私有的生成器状态
struct Generators {
    breathing: Breathing,
    sway: SpeechSway,
    moves: MoveQueue,
    actions: ActionOverlay,
    target: Pose,
    /// 上一周期 Move 槽位的偏移（呼吸阶段 1 的起点）
    move_slot: PoseOffset,
}

impl Generators {
    fn new(config: &MotionLoopConfig) -> Self {
        Self {
            breathing: Breathing::new(config.breathing.clone()),
            sway: SpeechSway::new(config.sway.clone()),
            moves: MoveQueue::new(),
            actions: ActionOverlay::new(config.action.cooldown()),
            target: Pose::NEUTRAL,
            move_slot: PoseOffset::ZERO,
        }
    }

    fn layers_mut(&mut self) -> [&mut dyn AnimationLayer; 4] {
        [
            &mut self.breathing,
            &mut self.sway,
            &mut self.moves,
            &mut self.actions,
        ]
    }

    /// 采样所有层
    fn sample(&mut self, dt: f64, state: RobotState, shared: &MotionShared) -> (LayerOffsets, usize) {
        let (move_offset, handovers) = self.moves.advance(dt);
        let move_slot = match move_offset {
            Some(offset) => {
                self.breathing.stop();
                offset
            },
            None if state == RobotState::Idle => self.breathing.advance(dt, self.move_slot),
            None => {
                self.breathing.stop();
                self.move_slot * (-dt / SLOT_RELEASE_TAU).exp()
            },
        };
        self.move_slot = move_slot;

        let offsets = LayerOffsets {
            move_slot,
            action: self.actions.advance(dt),
            tracking: shared.tracking.latest(),
            sway: self.sway.advance(dt, shared.loudness.load()),
        };
        (offsets, handovers)
    }
}

/// 周期内的退出原因
enum Flow {
    Continue,
    Exit,
}

/// 运动控制循环
///
/// # 参数
/// - `arbiter`: 链路仲裁器（与音频 / 视觉循环共享）
/// - `shared`: 状态、输入与遥测
/// - `commands`: 命令通道接收端；发送端全部关闭后循环退出
/// - `config`: 循环配置
/// - `is_running`: 运行标志
pub fn motion_loop<L: HardwareLink>(
    arbiter: Arc<LinkArbiter<L>>,
    shared: Arc<MotionShared>,
    commands: Receiver<MotionCommand>,
    config: MotionLoopConfig,
    is_running: Arc<AtomicBool>,
) {
    #[cfg(feature = "realtime")]
    {
        use thread_priority::*;

        match set_current_thread_priority(ThreadPriority::Max) {
            Ok(_) => {
                info!("Motion thread priority set to MAX (realtime)");
            },
            Err(e) => {
                warn!(
                    "Failed to set motion thread priority: {}. \
                    On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                    e
                );
            },
        }
    }

    let period = config.motion.period();
    let max_dt = period.mul_f64(config.motion.dt_clamp_multiplier);
    let submit_timeout = config.motion.submit_timeout();
    let tracking_stale_after = config.motion.tracking_stale();

    let mut generators = Generators::new(&config);
    let mut suspended = false;
    let mut pending_resume: Option<Sender<()>> = None;
    let mut tracking_stale = false;
    let mut tick: u64 = 0;

    let mut last_time = Instant::now();
    let mut next_deadline = last_time + period;

    info!("Motion loop started at {:.1} Hz", config.motion.frequency_hz);

    loop {
        if !is_running.load(Ordering::Acquire) {
            trace!("Motion loop: is_running flag is false, exiting");
            break;
        }

        // 1. dt 测量与钳位
        let now = Instant::now();
        let real_dt = now - last_time;
        last_time = now;
        let dt = if real_dt > max_dt {
            shared.metrics.time_jumps.fetch_add(1, Ordering::Relaxed);
            debug!("Time jump detected: {:?} (clamped to {:?})", real_dt, max_dt);
            max_dt
        } else {
            real_dt
        };
        let dt_s = dt.as_secs_f64();

        // 2. 取空命令通道
        if let Flow::Exit = drain_commands(
            &commands,
            &mut generators,
            &mut suspended,
            &mut pending_resume,
            &shared,
        ) {
            info!("Motion command channel closed, exiting");
            break;
        }

        tick += 1;
        shared.metrics.ticks.fetch_add(1, Ordering::Relaxed);

        // 3. 状态快照
        let snapshot = shared.state.snapshot();
        if snapshot.state == RobotState::Error {
            warn!("Robot state is ERROR, motion loop exiting");
            break;
        }

        let forced = pending_resume.is_some();
        let effective = if forced {
            snapshot.effective()
        } else {
            snapshot.state
        };

        // 4. 空转周期
        if forced && !effective.computes_pose() {
            // 即将还原的状态本身不产出位姿，恢复立即完成
            acknowledge(&mut pending_resume);
        }
        if (suspended && !forced) || !effective.computes_pose() {
            shared.metrics.idle_ticks.fetch_add(1, Ordering::Relaxed);
            sleep_until(&mut next_deadline, period);
            continue;
        }

        // 5. 采样 → 合成 → 校验
        let stale = shared.tracking.is_stale(tracking_stale_after);
        if stale != tracking_stale {
            tracking_stale = stale;
            debug!("Tracking feed stale: {}", stale);
        }

        let (offsets, handovers) = generators.sample(dt_s, effective, &shared);
        if handovers > 0 {
            shared
                .metrics
                .moves_started
                .fetch_add(handovers as u64, Ordering::Relaxed);
        }
        let pose = compose(&generators.target, &offsets, &config.compose);

        if let Err(e) = config.compose.limits.check(&pose) {
            warn!("Composed pose rejected: {}", e);
            shared.metrics.rejected.fetch_add(1, Ordering::Relaxed);
            shared.health.report(HealthSignal::CommandRejected {
                reason: e.to_string(),
            });
            sleep_until(&mut next_deadline, period);
            continue;
        }

        // 6. 提交（恢复请求在位姿真正下发后才确认，超时则下一周期重试）
        match submit(&arbiter, &pose, submit_timeout) {
            Ok(()) => {
                acknowledge(&mut pending_resume);
                shared.metrics.poses_sent.fetch_add(1, Ordering::Relaxed);
                shared.last_pose.store(Some(Arc::new(PoseSample {
                    pose,
                    tick,
                    state: effective,
                })));
            },
            Err(LinkError::Timeout { .. }) => {
                shared
                    .metrics
                    .dropped_timeouts
                    .fetch_add(1, Ordering::Relaxed);
                trace!("Motion tick {} dropped: link busy", tick);
            },
            Err(LinkError::Rejected(reason)) => {
                warn!("Hardware rejected pose: {}", reason);
                shared.metrics.rejected.fetch_add(1, Ordering::Relaxed);
                shared
                    .health
                    .report(HealthSignal::CommandRejected { reason });
            },
            Err(e) if e.is_fatal() => {
                error!("Hardware link lost: {}. Motion loop exiting", e);
                shared.health.report(HealthSignal::LinkLost);
                shared.state.set(RobotState::Error);
                break;
            },
            Err(e) => {
                warn!("Pose submission failed: {}", e);
            },
        }

        sleep_until(&mut next_deadline, period);
    }

    shared.suspended.store(false, Ordering::Release);
    info!("Motion loop stopped after {} ticks", tick);
}

/// 取空命令通道；发送端全部关闭时返回 `Flow::Exit`
fn drain_commands(
    commands: &Receiver<MotionCommand>,
    generators: &mut Generators,
    suspended: &mut bool,
    pending_resume: &mut Option<Sender<()>>,
    shared: &MotionShared,
) -> Flow {
    loop {
        let command = match commands.try_recv() {
            Ok(command) => command,
            Err(TryRecvError::Empty) => return Flow::Continue,
            Err(TryRecvError::Disconnected) => return Flow::Exit,
        };
        trace!("Motion command: {:?}", command);

        match command {
            MotionCommand::RequestMove { clip, priority } => {
                match generators.moves.request(clip, priority) {
                    MoveOutcome::Started => {
                        shared.metrics.moves_started.fetch_add(1, Ordering::Relaxed);
                    },
                    MoveOutcome::Preempted { discarded } => {
                        info!("Move '{}' preempted", discarded);
                        shared.metrics.moves_started.fetch_add(1, Ordering::Relaxed);
                        shared
                            .metrics
                            .moves_preempted
                            .fetch_add(1, Ordering::Relaxed);
                    },
                    MoveOutcome::Queued { position } => {
                        debug!("Move queued at position {}", position);
                    },
                }
            },
            MotionCommand::RequestAction { clip } => match generators.actions.trigger(clip) {
                ActionOutcome::Started => {
                    shared
                        .metrics
                        .actions_executed
                        .fetch_add(1, Ordering::Relaxed);
                },
                ActionOutcome::Suppressed { .. } => {
                    shared
                        .metrics
                        .actions_suppressed
                        .fetch_add(1, Ordering::Relaxed);
                },
            },
            MotionCommand::SetTarget(pose) => {
                generators.target = pose;
            },
            MotionCommand::ClearMoves => {
                generators.moves.clear();
            },
            MotionCommand::Suspend { ack } => {
                if !*suspended {
                    for layer in generators.layers_mut() {
                        layer.on_suspend();
                    }
                    *suspended = true;
                    shared.suspended.store(true, Ordering::Release);
                    info!("Motion loop suspended");
                }
                // 恢复尚未完成就再次挂起：恢复请求作废
                pending_resume.take();
                let _ = ack.send(());
            },
            MotionCommand::Resume { ack } => {
                if *suspended {
                    for layer in generators.layers_mut() {
                        layer.on_resume();
                    }
                    *suspended = false;
                    shared.suspended.store(false, Ordering::Release);
                    info!("Motion loop resumed");
                }
                *pending_resume = Some(ack);
            },
        }
    }
}

fn acknowledge(pending_resume: &mut Option<Sender<()>>) {
    if let Some(ack) = pending_resume.take() {
        let _ = ack.send(());
    }
}

fn submit<L: HardwareLink>(
    arbiter: &LinkArbiter<L>,
    pose: &Pose,
    timeout: Duration,
) -> Result<(), LinkError> {
    let mut link = arbiter.acquire(Caller::Motion, AcquireMode::Bounded(timeout))?;
    link.send_pose(pose)
}

/// 休眠到下一个周期；超时严重时重置节拍，不追赶
fn sleep_until(next_deadline: &mut Instant, period: Duration) {
    let now = Instant::now();
    if now < *next_deadline {
        spin_sleep::sleep(*next_deadline - now);
        *next_deadline += period;
    } else {
        *next_deadline = now + period;
    }
}
