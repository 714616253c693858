//! 运动子系统句柄（对外 API）
//!
//! 持有控制循环线程和命令通道发送端。Move / Action 名称在发送前解析，
//! 未知名称直接返回错误，不进入通道。

use crate::command::MotionCommand;
use crate::layers::{ActionLibrary, MoveLibrary};
use crate::metrics::MotionMetricsSnapshot;
use crate::motion_loop::{MotionLoopConfig, MotionShared, PoseSample, motion_loop};
use crate::thread::JoinTimeout;
use crate::MotionError;
use crossbeam_channel::{RecvTimeoutError, SendTimeoutError, Sender, TrySendError, bounded};
use satellite_link::{HardwareLink, LinkArbiter};
use satellite_protocol::{MovePriority, Pose, RobotState};
use satellite_tools::LifecycleConfig;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{Builder, JoinHandle};
use std::time::Duration;
use tracing::{error, info};

/// 关闭时等待控制循环线程退出的时长
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// 运动子系统句柄
pub struct MotionHandle {
    shared: Arc<MotionShared>,
    cmd_tx: Option<Sender<MotionCommand>>,
    capacity: usize,
    is_running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    moves: Arc<MoveLibrary>,
    actions: Arc<ActionLibrary>,
    suspend_ack_timeout: Duration,
    resume_timeout: Duration,
}

impl MotionHandle {
    /// 启动控制循环线程
    ///
    /// # 参数
    /// - `arbiter`: 共享的链路仲裁器
    /// - `shared`: 状态、输入与遥测
    /// - `config`: 循环配置
    /// - `lifecycle`: 挂起 / 恢复超时
    pub fn spawn<L: HardwareLink + 'static>(
        arbiter: Arc<LinkArbiter<L>>,
        shared: Arc<MotionShared>,
        config: MotionLoopConfig,
        lifecycle: &LifecycleConfig,
    ) -> Result<Self, MotionError> {
        let capacity = config.motion.command_capacity.max(1);
        let (cmd_tx, cmd_rx) = bounded(capacity);
        let is_running = Arc::new(AtomicBool::new(true));

        let thread = {
            let shared = shared.clone();
            let is_running = is_running.clone();
            Builder::new()
                .name("satellite-motion".to_string())
                .spawn(move || motion_loop(arbiter, shared, cmd_rx, config, is_running))
                .map_err(MotionError::Spawn)?
        };

        Ok(Self {
            shared,
            cmd_tx: Some(cmd_tx),
            capacity,
            is_running,
            thread: Some(thread),
            moves: Arc::new(MoveLibrary::builtin()),
            actions: Arc::new(ActionLibrary::builtin()),
            suspend_ack_timeout: lifecycle.suspend_ack_timeout(),
            resume_timeout: lifecycle.resume_timeout(),
        })
    }

    /// 替换 Move / Action 库（默认使用内置库）
    pub fn with_libraries(mut self, moves: MoveLibrary, actions: ActionLibrary) -> Self {
        self.moves = Arc::new(moves);
        self.actions = Arc::new(actions);
        self
    }

    /// 请求播放 Move
    pub fn request_move(&self, name: &str, priority: MovePriority) -> Result<(), MotionError> {
        let clip = self.moves.get(name)?;
        self.send(MotionCommand::RequestMove { clip, priority })
    }

    /// 触发 Action（冷却期内的触发在循环内被忽略）
    pub fn request_action(&self, name: &str) -> Result<(), MotionError> {
        let clip = self.actions.get(name)?;
        self.send(MotionCommand::RequestAction { clip })
    }

    /// 设置目标位姿
    pub fn set_target(&self, pose: Pose) -> Result<(), MotionError> {
        self.send(MotionCommand::SetTarget(pose))
    }

    /// 丢弃当前和所有排队的 Move
    pub fn clear_moves(&self) -> Result<(), MotionError> {
        self.send(MotionCommand::ClearMoves)
    }

    /// 挂起控制循环，等待循环确认
    pub fn suspend(&self) -> Result<(), MotionError> {
        let (ack_tx, ack_rx) = bounded(1);
        self.send_blocking(MotionCommand::Suspend { ack: ack_tx }, self.suspend_ack_timeout)?;
        match ack_rx.recv_timeout(self.suspend_ack_timeout) {
            Ok(()) => Ok(()),
            Err(RecvTimeoutError::Timeout) => {
                Err(MotionError::SuspendTimeout(self.suspend_ack_timeout))
            },
            Err(RecvTimeoutError::Disconnected) => Err(MotionError::LoopStopped),
        }
    }

    /// 恢复控制循环，阻塞直到循环向链路下发至少一个合法位姿
    ///
    /// 位姿按 `StateCell` 中标记的即将还原的状态渲染。
    pub fn resume(&self) -> Result<(), MotionError> {
        let (ack_tx, ack_rx) = bounded(1);
        self.send_blocking(MotionCommand::Resume { ack: ack_tx }, self.resume_timeout)?;
        match ack_rx.recv_timeout(self.resume_timeout) {
            Ok(()) => Ok(()),
            Err(RecvTimeoutError::Timeout) => Err(MotionError::ResumeTimeout(self.resume_timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(MotionError::LoopStopped),
        }
    }

    /// 最后一次下发的位姿
    pub fn last_pose(&self) -> Option<PoseSample> {
        self.shared.last_pose()
    }

    pub fn metrics(&self) -> MotionMetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    pub fn state(&self) -> RobotState {
        self.shared.state.get()
    }

    pub fn shared(&self) -> &Arc<MotionShared> {
        &self.shared
    }

    pub fn move_library(&self) -> &MoveLibrary {
        &self.moves
    }

    pub fn action_library(&self) -> &ActionLibrary {
        &self.actions
    }

    /// 控制循环线程是否仍在运行
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn sender(&self) -> Result<&Sender<MotionCommand>, MotionError> {
        self.cmd_tx.as_ref().ok_or(MotionError::ChannelClosed)
    }

    fn send(&self, command: MotionCommand) -> Result<(), MotionError> {
        match self.sender()?.try_send(command) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(MotionError::ChannelFull {
                capacity: self.capacity,
            }),
            Err(TrySendError::Disconnected(_)) => Err(MotionError::ChannelClosed),
        }
    }

    fn send_blocking(&self, command: MotionCommand, timeout: Duration) -> Result<(), MotionError> {
        match self.sender()?.send_timeout(command, timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(MotionError::ChannelFull {
                capacity: self.capacity,
            }),
            Err(SendTimeoutError::Disconnected(_)) => Err(MotionError::LoopStopped),
        }
    }
}

impl Drop for MotionHandle {
    fn drop(&mut self) {
        self.is_running.store(false, Ordering::Release);
        // 先关闭通道，循环在下一个周期看到 Disconnected
        self.cmd_tx.take();

        if let Some(handle) = self.thread.take()
            && let Err(_e) = handle.join_timeout(JOIN_TIMEOUT)
        {
            error!(
                "Motion thread panicked or failed to shut down within {:?}",
                JOIN_TIMEOUT
            );
        }
        info!("Motion subsystem shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateCell;
    use satellite_link::{HealthBoard, MockLink};
    use satellite_tools::ArbiterConfig;
    use serial_test::serial;

    fn spawn_handle(initial: RobotState) -> (MotionHandle, satellite_link::MockLinkProbe) {
        let link = MockLink::new();
        let probe = link.probe();
        let health = Arc::new(HealthBoard::new());
        let arbiter = Arc::new(LinkArbiter::new(link, &ArbiterConfig::default(), health.clone()));
        let shared = Arc::new(MotionShared::new(Arc::new(StateCell::new(initial)), health));
        let handle = MotionHandle::spawn(
            arbiter,
            shared,
            MotionLoopConfig::default(),
            &LifecycleConfig::default(),
        )
        .unwrap();
        (handle, probe)
    }

    #[test]
    #[serial]
    fn test_unknown_names_rejected_before_channel() {
        let (handle, _probe) = spawn_handle(RobotState::Idle);
        assert!(matches!(
            handle.request_move("moonwalk", MovePriority::High),
            Err(MotionError::UnknownMove(_))
        ));
        assert!(matches!(
            handle.request_action("wave"),
            Err(MotionError::UnknownAction(_))
        ));
        assert!(handle.request_move("happy", MovePriority::High).is_ok());
        assert!(handle.request_action("nod").is_ok());
    }

    #[test]
    #[serial]
    fn test_suspend_resume_roundtrip() {
        let (handle, probe) = spawn_handle(RobotState::Idle);
        handle.suspend().unwrap();
        probe.clear_poses();
        handle.resume().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(probe.pose_count() >= 1);
        assert!(handle.last_pose().is_some());
    }

    #[test]
    #[serial]
    fn test_calls_after_link_loss() {
        let (handle, probe) = spawn_handle(RobotState::Idle);
        probe.disconnect();
        std::thread::sleep(Duration::from_millis(50));

        assert!(!handle.is_running());
        assert_eq!(handle.state(), RobotState::Error);
        assert!(matches!(handle.suspend(), Err(MotionError::LoopStopped)));
        assert!(matches!(
            handle.request_action("nod"),
            Err(MotionError::ChannelClosed)
        ));
    }

    #[test]
    #[serial]
    fn test_drop_joins_thread() {
        let (handle, _probe) = spawn_handle(RobotState::Idle);
        let shared = handle.shared().clone();
        drop(handle);
        let ticks = shared.metrics.snapshot().ticks;
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(shared.metrics.snapshot().ticks, ticks);
    }
}
