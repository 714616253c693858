//! I/O 循环指标

use std::sync::atomic::{AtomicU64, Ordering};

/// I/O 循环实时指标（采集 / 播放 / 视觉共用）
#[derive(Debug, Default)]
pub struct LoopMetrics {
    /// 完成的周期数
    pub cycles: AtomicU64,
    /// 经过链路的条目数（音频为样本，视觉为帧）
    pub items: AtomicU64,
    /// 因链路超时跳过的周期数
    pub skipped: AtomicU64,
    /// 交付给协作方的条目数
    pub delivered: AtomicU64,
    /// 挂起次数
    pub suspends: AtomicU64,
}

impl LoopMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        LoopMetricsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            items: self.items.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            suspends: self.suspends.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }
}

/// I/O 循环指标快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopMetricsSnapshot {
    pub cycles: u64,
    pub items: u64,
    pub skipped: u64,
    pub delivered: u64,
    pub suspends: u64,
}
