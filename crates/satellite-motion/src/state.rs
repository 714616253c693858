//! 机器人状态单元
//!
//! `RobotState` 是全局唯一的权威值：
//! - 读取：`ArcSwap` 无锁快照，控制循环每个周期读取一次
//! - 写入：由互斥锁串行化（事件分发器、生命周期管理器、控制循环）
//! - 订阅：每次状态变化广播一个 `StateChange`
//!
//! ERROR 是终止状态，进入后任何写入都会被拒绝。

use arc_swap::ArcSwap;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use parking_lot::Mutex;
use satellite_protocol::RobotState;
use std::sync::Arc;
use tracing::{debug, info};

/// 订阅通道容量
const SUBSCRIBER_CAPACITY: usize = 64;

/// 状态快照（不可变）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateSnapshot {
    /// 当前状态
    pub state: RobotState,
    /// 正在恢复时即将还原的状态（恢复渲染使用）
    pub resume_to: Option<RobotState>,
    /// 单调递增的写入序号
    pub sequence: u64,
}

impl StateSnapshot {
    /// 用于计算位姿的有效状态（恢复中优先使用即将还原的状态）
    pub fn effective(&self) -> RobotState {
        self.resume_to.unwrap_or(self.state)
    }
}

/// 状态变化通知
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub from: RobotState,
    pub to: RobotState,
}

/// 状态单元
#[derive(Debug)]
pub struct StateCell {
    current: ArcSwap<StateSnapshot>,
    write_lock: Mutex<()>,
    subscribers: Mutex<Vec<Sender<StateChange>>>,
}

impl StateCell {
    pub fn new(initial: RobotState) -> Self {
        Self {
            current: ArcSwap::from_pointee(StateSnapshot {
                state: initial,
                resume_to: None,
                sequence: 0,
            }),
            write_lock: Mutex::new(()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// 当前状态
    #[inline]
    pub fn get(&self) -> RobotState {
        self.current.load().state
    }

    /// 完整快照
    #[inline]
    pub fn snapshot(&self) -> StateSnapshot {
        **self.current.load()
    }

    /// 设置状态；返回变化（相同状态或 ERROR 下返回 `None`）
    pub fn set(&self, to: RobotState) -> Option<StateChange> {
        self.transition(|_| Some(to))
    }

    /// 原子地读取-判断-写入
    ///
    /// `decide` 在写锁内执行，拿到的是最新快照；返回 `None` 表示不转换。
    /// 写入会清除 `resume_to`。
    pub fn transition(
        &self,
        decide: impl FnOnce(&StateSnapshot) -> Option<RobotState>,
    ) -> Option<StateChange> {
        let _guard = self.write_lock.lock();
        let current = self.snapshot();
        if current.state == RobotState::Error {
            debug!("State is ERROR, ignoring transition request");
            return None;
        }

        let to = decide(&current)?;
        if to == current.state && current.resume_to.is_none() {
            return None;
        }

        self.current.store(Arc::new(StateSnapshot {
            state: to,
            resume_to: None,
            sequence: current.sequence + 1,
        }));

        if to == current.state {
            return None;
        }

        let change = StateChange {
            from: current.state,
            to,
        };
        info!("Robot state: {} -> {}", change.from, change.to);
        self.broadcast(change);
        Some(change)
    }

    /// 标记即将还原的状态（不改变当前状态，不广播）
    pub fn set_resume_to(&self, resume_to: Option<RobotState>) {
        let _guard = self.write_lock.lock();
        let current = self.snapshot();
        if current.state == RobotState::Error {
            return;
        }
        self.current.store(Arc::new(StateSnapshot {
            resume_to,
            sequence: current.sequence + 1,
            ..current
        }));
    }

    /// 订阅状态变化
    pub fn subscribe(&self) -> Receiver<StateChange> {
        let (tx, rx) = bounded(SUBSCRIBER_CAPACITY);
        self.subscribers.lock().push(tx);
        rx
    }

    fn broadcast(&self, change: StateChange) {
        self.subscribers
            .lock()
            .retain(|tx| !matches!(tx.try_send(change), Err(TrySendError::Disconnected(_))));
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new(RobotState::Idle)
    }
}
