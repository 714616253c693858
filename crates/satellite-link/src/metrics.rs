//! 仲裁器性能指标模块
//!
//! 提供零开销的原子计数器，用于监控硬件链路的竞争情况。
//! 所有计数器都使用原子操作，可以在任何线程安全地读取，不会引入锁竞争。

use crate::Caller;
use std::sync::atomic::{AtomicU64, Ordering};

/// 单个调用方的计数器
#[derive(Debug, Default)]
pub(crate) struct CallerCounters {
    /// 成功获取次数
    acquisitions: AtomicU64,
    /// 其中以阻塞方式获取的次数（对话期间的音频采集）
    blocking_acquisitions: AtomicU64,
    /// 获取超时次数
    timeouts: AtomicU64,
    /// 因超时执行的缓冲区清空次数
    flushes: AtomicU64,
    /// 清空时丢弃的元素总数
    flushed_items: AtomicU64,
}

impl CallerCounters {
    fn snapshot(&self) -> CallerSnapshot {
        CallerSnapshot {
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            blocking_acquisitions: self.blocking_acquisitions.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            flushed_items: self.flushed_items.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.acquisitions.store(0, Ordering::Relaxed);
        self.blocking_acquisitions.store(0, Ordering::Relaxed);
        self.timeouts.store(0, Ordering::Relaxed);
        self.flushes.store(0, Ordering::Relaxed);
        self.flushed_items.store(0, Ordering::Relaxed);
    }
}

/// 仲裁器实时指标（按调用方分组）
///
/// # 使用示例
///
/// ```rust
/// use satellite_link::{ArbiterMetrics, Caller};
///
/// let metrics = ArbiterMetrics::new();
/// metrics.record_timeout(Caller::Vision);
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.get(Caller::Vision).timeouts, 1);
/// ```
#[derive(Debug, Default)]
pub struct ArbiterMetrics {
    callers: [CallerCounters; 4],
}

impl ArbiterMetrics {
    /// 创建新的指标实例（所有计数器初始化为 0）
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_acquisition(&self, caller: Caller, blocking: bool) {
        let counters = &self.callers[caller.index()];
        counters.acquisitions.fetch_add(1, Ordering::Relaxed);
        if blocking {
            counters.blocking_acquisitions.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_timeout(&self, caller: Caller) {
        self.callers[caller.index()]
            .timeouts
            .fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_flush(&self, caller: Caller, items: usize) {
        let counters = &self.callers[caller.index()];
        counters.flushes.fetch_add(1, Ordering::Relaxed);
        counters
            .flushed_items
            .fetch_add(items as u64, Ordering::Relaxed);
    }

    /// 获取指标快照
    ///
    /// 使用 `Ordering::Relaxed`，不同计数器之间可能有微小的时间差，适合监控场景。
    pub fn snapshot(&self) -> ArbiterMetricsSnapshot {
        ArbiterMetricsSnapshot {
            callers: [
                self.callers[0].snapshot(),
                self.callers[1].snapshot(),
                self.callers[2].snapshot(),
                self.callers[3].snapshot(),
            ],
        }
    }

    /// 重置所有计数器（用于测试）
    pub fn reset(&self) {
        for counters in &self.callers {
            counters.reset();
        }
    }
}

/// 单个调用方的指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallerSnapshot {
    pub acquisitions: u64,
    pub blocking_acquisitions: u64,
    pub timeouts: u64,
    pub flushes: u64,
    pub flushed_items: u64,
}

impl CallerSnapshot {
    /// 超时率（百分比）
    ///
    /// 返回 0.0 到 100.0 之间的值；没有任何尝试时返回 0.0。
    pub fn timeout_rate(&self) -> f64 {
        let attempts = self.acquisitions + self.timeouts;
        if attempts == 0 {
            return 0.0;
        }
        (self.timeouts as f64 / attempts as f64) * 100.0
    }
}

/// 仲裁器指标快照（不可变）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArbiterMetricsSnapshot {
    callers: [CallerSnapshot; 4],
}

impl ArbiterMetricsSnapshot {
    pub fn get(&self, caller: Caller) -> CallerSnapshot {
        self.callers[caller.index()]
    }

    /// 所有调用方的超时总数
    pub fn total_timeouts(&self) -> u64 {
        self.callers.iter().map(|c| c.timeouts).sum()
    }
}
