//! 运动控制循环性能指标
//!
//! 与仲裁器指标相同：原子计数器，任意线程无锁读取。

use std::sync::atomic::{AtomicU64, Ordering};

/// 运动控制循环实时指标
#[derive(Debug, Default)]
pub struct MotionMetrics {
    /// 总周期数
    pub ticks: AtomicU64,
    /// 空转周期数（SLEEPING / SUSPENDED / 挂起）
    pub idle_ticks: AtomicU64,
    /// 成功下发的位姿数
    pub poses_sent: AtomicU64,
    /// 因获取链路超时被丢弃的位姿数
    pub dropped_timeouts: AtomicU64,
    /// 被拒绝的位姿数（校验失败或硬件拒绝）
    pub rejected: AtomicU64,
    /// 检测到的时间跳变次数
    pub time_jumps: AtomicU64,
    /// 执行的 Action 数
    pub actions_executed: AtomicU64,
    /// 因冷却期被忽略的 Action 数
    pub actions_suppressed: AtomicU64,
    /// 开始播放的 Move 数
    pub moves_started: AtomicU64,
    /// 被抢占丢弃的 Move 数
    pub moves_preempted: AtomicU64,
}

impl MotionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MotionMetricsSnapshot {
        MotionMetricsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            idle_ticks: self.idle_ticks.load(Ordering::Relaxed),
            poses_sent: self.poses_sent.load(Ordering::Relaxed),
            dropped_timeouts: self.dropped_timeouts.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            time_jumps: self.time_jumps.load(Ordering::Relaxed),
            actions_executed: self.actions_executed.load(Ordering::Relaxed),
            actions_suppressed: self.actions_suppressed.load(Ordering::Relaxed),
            moves_started: self.moves_started.load(Ordering::Relaxed),
            moves_preempted: self.moves_preempted.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器（用于测试）
    pub fn reset(&self) {
        for counter in [
            &self.ticks,
            &self.idle_ticks,
            &self.poses_sent,
            &self.dropped_timeouts,
            &self.rejected,
            &self.time_jumps,
            &self.actions_executed,
            &self.actions_suppressed,
            &self.moves_started,
            &self.moves_preempted,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// 运动控制循环指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotionMetricsSnapshot {
    pub ticks: u64,
    pub idle_ticks: u64,
    pub poses_sent: u64,
    pub dropped_timeouts: u64,
    pub rejected: u64,
    pub time_jumps: u64,
    pub actions_executed: u64,
    pub actions_suppressed: u64,
    pub moves_started: u64,
    pub moves_preempted: u64,
}

impl MotionMetricsSnapshot {
    /// 产出位姿的周期数（非空转）
    pub fn active_ticks(&self) -> u64 {
        self.ticks.saturating_sub(self.idle_ticks)
    }

    /// 位姿丢弃率（百分比）
    pub fn drop_rate(&self) -> f64 {
        let attempted = self.poses_sent + self.dropped_timeouts;
        if attempted == 0 {
            return 0.0;
        }
        (self.dropped_timeouts as f64 / attempted as f64) * 100.0
    }
}
