//! 硬件链路仲裁器
//!
//! 保证任意时刻最多只有一个调用方持有硬件链路。
//!
//! 获取策略由调用方身份和当前机器人状态共同决定：
//! - 对话期间（LISTENING / SPEAKING）的音频采集：阻塞获取，永不丢帧
//! - 其它所有情况：有界等待，超时后调用方清空自己的缓冲区并跳过本轮
//!
//! 锁使用 `parking_lot::Mutex`，有界等待通过 `try_lock_for` 实现；
//! 释放由 `LinkGuard` 的 RAII 语义保证，任何退出路径（包括 panic 展开）都会释放。

use crate::buffer::FlushableBuffer;
use crate::health::{ContentionMonitor, ContentionTransition, HealthBoard, HealthSignal};
use crate::metrics::{ArbiterMetrics, ArbiterMetricsSnapshot};
use crate::{Caller, HardwareLink, LinkError};
use parking_lot::{Mutex, MutexGuard};
use satellite_protocol::RobotState;
use satellite_tools::ArbiterConfig;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// 无持有者
const NO_HOLDER: u8 = 0;

/// 获取方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireMode {
    /// 无限等待
    Blocking,
    /// 最多等待给定时长
    Bounded(Duration),
}

/// 硬件链路仲裁器
pub struct LinkArbiter<L> {
    link: Mutex<L>,
    /// 当前持有者（`NO_HOLDER` 或 `caller.index() + 1`）
    holder: AtomicU8,
    acquire_timeout: Duration,
    metrics: ArbiterMetrics,
    contention: ContentionMonitor,
    health: Arc<HealthBoard>,
}

impl<L: HardwareLink> LinkArbiter<L> {
    /// 创建仲裁器，接管链路的所有权
    ///
    /// # 参数
    /// - `link`: 链路实现（此后只能通过仲裁器访问）
    /// - `config`: 超时与竞争窗口配置
    /// - `health`: 共享健康看板，持续竞争时上报
    pub fn new(link: L, config: &ArbiterConfig, health: Arc<HealthBoard>) -> Self {
        Self {
            link: Mutex::new(link),
            holder: AtomicU8::new(NO_HOLDER),
            acquire_timeout: config.acquire_timeout(),
            metrics: ArbiterMetrics::new(),
            contention: ContentionMonitor::new(
                config.contention_window(),
                config.contention_threshold,
            ),
            health,
        }
    }

    /// 根据调用方和机器人状态决定获取方式
    pub fn policy(&self, caller: Caller, state: RobotState) -> AcquireMode {
        if caller == Caller::AudioCapture && state.is_conversation() {
            AcquireMode::Blocking
        } else {
            AcquireMode::Bounded(self.acquire_timeout)
        }
    }

    /// 以指定方式获取链路
    ///
    /// 有界等待超时返回 `LinkError::Timeout`，并记录到竞争监视器。
    pub fn acquire(&self, caller: Caller, mode: AcquireMode) -> Result<LinkGuard<'_, L>, LinkError> {
        let guard = match mode {
            AcquireMode::Blocking => self.link.lock(),
            AcquireMode::Bounded(timeout) => match self.link.try_lock_for(timeout) {
                Some(guard) => guard,
                None => {
                    self.on_timeout(caller);
                    return Err(LinkError::Timeout {
                        caller,
                        waited: timeout,
                    });
                },
            },
        };

        self.holder.store(caller.index() as u8 + 1, Ordering::Release);
        self.metrics
            .record_acquisition(caller, matches!(mode, AcquireMode::Blocking));
        self.refresh_contention();
        trace!("Link acquired by {} ({:?})", caller, mode);

        Ok(LinkGuard {
            guard,
            holder: &self.holder,
        })
    }

    /// 按 `policy()` 决定的方式获取链路
    pub fn acquire_for(
        &self,
        caller: Caller,
        state: RobotState,
    ) -> Result<LinkGuard<'_, L>, LinkError> {
        self.acquire(caller, self.policy(caller, state))
    }

    /// 获取链路；超时则清空调用方的缓冲区并返回 `None`
    ///
    /// 返回 `None` 时，`buffer.is_empty()` 一定成立，调用方应跳过本轮。
    pub fn acquire_or_flush<B: FlushableBuffer + ?Sized>(
        &self,
        caller: Caller,
        state: RobotState,
        buffer: &mut B,
    ) -> Option<LinkGuard<'_, L>> {
        match self.acquire_for(caller, state) {
            Ok(guard) => Some(guard),
            Err(_) => {
                let dropped = buffer.flush();
                self.metrics.record_flush(caller, dropped);
                debug!(
                    "{} timed out acquiring link, flushed {} buffered items",
                    caller, dropped
                );
                None
            },
        }
    }

    /// 当前持有者
    pub fn holder(&self) -> Option<Caller> {
        match self.holder.load(Ordering::Acquire) {
            NO_HOLDER => None,
            n => Caller::from_index(n as usize - 1),
        }
    }

    /// 默认的有界等待时长
    pub fn acquire_timeout(&self) -> Duration {
        self.acquire_timeout
    }

    pub fn metrics(&self) -> ArbiterMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 是否处于持续竞争状态
    pub fn is_contended(&self) -> bool {
        self.contention.is_degraded()
    }

    /// 取回链路所有权（用于关闭）
    pub fn into_inner(self) -> L {
        self.link.into_inner()
    }

    fn on_timeout(&self, caller: Caller) {
        self.metrics.record_timeout(caller);
        if let ContentionTransition::Degraded { timeouts } =
            self.contention.record_timeout(Instant::now())
        {
            self.health.report(HealthSignal::SustainedContention {
                timeouts,
                window: self.contention.window(),
            });
        }
    }

    fn refresh_contention(&self) {
        if self.contention.refresh(Instant::now()) == ContentionTransition::Recovered {
            info!("Link contention recovered");
            self.health.report(HealthSignal::ContentionRecovered);
        }
    }
}

/// 链路访问凭证（RAII）
///
/// 存活期间独占硬件链路；drop 时先清除持有者标记，再释放锁。
pub struct LinkGuard<'a, L> {
    guard: MutexGuard<'a, L>,
    holder: &'a AtomicU8,
}

impl<L> Deref for LinkGuard<'_, L> {
    type Target = L;

    fn deref(&self) -> &L {
        &self.guard
    }
}

impl<L> DerefMut for LinkGuard<'_, L> {
    fn deref_mut(&mut self) -> &mut L {
        &mut self.guard
    }
}

impl<L> Drop for LinkGuard<'_, L> {
    fn drop(&mut self) {
        // 字段 `guard` 在本函数返回后才析构，因此标记先于解锁清除
        self.holder.store(NO_HOLDER, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BoundedBuffer;
    use crate::mock::MockLink;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn arbiter(timeout_ms: u64, threshold: usize) -> LinkArbiter<MockLink> {
        let config = ArbiterConfig {
            acquire_timeout_ms: timeout_ms,
            contention_window_ms: 5_000,
            contention_threshold: threshold,
        };
        LinkArbiter::new(MockLink::new(), &config, Arc::new(HealthBoard::new()))
    }

    #[test]
    fn test_policy() {
        let arbiter = arbiter(20, 50);
        let bounded = AcquireMode::Bounded(Duration::from_millis(20));

        assert_eq!(
            arbiter.policy(Caller::AudioCapture, RobotState::Listening),
            AcquireMode::Blocking
        );
        assert_eq!(
            arbiter.policy(Caller::AudioCapture, RobotState::Speaking),
            AcquireMode::Blocking
        );
        assert_eq!(
            arbiter.policy(Caller::AudioCapture, RobotState::Idle),
            bounded
        );
        assert_eq!(
            arbiter.policy(Caller::AudioCapture, RobotState::Thinking),
            bounded
        );
        for caller in [Caller::AudioPlayback, Caller::Vision, Caller::Motion] {
            assert_eq!(arbiter.policy(caller, RobotState::Listening), bounded);
        }
    }

    #[test]
    fn test_holder_cleared_on_drop() {
        let arbiter = arbiter(20, 50);
        assert_eq!(arbiter.holder(), None);
        {
            let _guard = arbiter
                .acquire(Caller::Vision, AcquireMode::Blocking)
                .unwrap();
            assert_eq!(arbiter.holder(), Some(Caller::Vision));
        }
        assert_eq!(arbiter.holder(), None);
    }

    #[test]
    fn test_bounded_acquire_times_out() {
        let arbiter = arbiter(5, 50);
        let _held = arbiter
            .acquire(Caller::AudioCapture, AcquireMode::Blocking)
            .unwrap();

        let start = Instant::now();
        let result = thread::scope(|s| {
            s.spawn(|| arbiter.acquire(Caller::Vision, AcquireMode::Bounded(Duration::from_millis(5))).map(|_| ()))
                .join()
                .unwrap()
        });
        assert!(matches!(
            result,
            Err(LinkError::Timeout {
                caller: Caller::Vision,
                ..
            })
        ));
        assert!(start.elapsed() >= Duration::from_millis(5));
        assert_eq!(arbiter.metrics().get(Caller::Vision).timeouts, 1);
    }

    #[test]
    fn test_acquire_or_flush_empties_buffer() {
        let arbiter = arbiter(2, 50);
        let _held = arbiter
            .acquire(Caller::Motion, AcquireMode::Blocking)
            .unwrap();

        let mut buffer = BoundedBuffer::new(64);
        buffer.extend_from_slice(&[0.5f32; 32]);

        let flushed = thread::scope(|s| {
            s.spawn(|| {
                let guard = arbiter.acquire_or_flush(Caller::AudioPlayback, RobotState::Speaking, &mut buffer);
                guard.is_none()
            })
            .join()
            .unwrap()
        });
        assert!(flushed);
        assert!(buffer.is_empty());

        let snapshot = arbiter.metrics().get(Caller::AudioPlayback);
        assert_eq!(snapshot.flushes, 1);
        assert_eq!(snapshot.flushed_items, 32);
    }

    #[test]
    fn test_mutual_exclusion_under_contention() {
        let arbiter = arbiter(50, 1_000);
        let inside = AtomicUsize::new(0);
        let max_inside = AtomicUsize::new(0);

        thread::scope(|s| {
            for caller in Caller::ALL {
                let arbiter = &arbiter;
                let inside = &inside;
                let max_inside = &max_inside;
                s.spawn(move || {
                    for _ in 0..200 {
                        if let Ok(mut guard) = arbiter.acquire(caller, AcquireMode::Blocking) {
                            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                            max_inside.fetch_max(now, Ordering::SeqCst);
                            assert_eq!(arbiter.holder(), Some(caller));
                            let _ = guard.write_audio(&[0.0; 4]);
                            inside.fetch_sub(1, Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        let snapshot = arbiter.metrics();
        for caller in Caller::ALL {
            assert_eq!(snapshot.get(caller).acquisitions, 200);
        }
    }

    #[test]
    fn test_sustained_contention_reported() {
        let config = ArbiterConfig {
            acquire_timeout_ms: 1,
            contention_window_ms: 60_000,
            contention_threshold: 3,
        };
        let health = Arc::new(HealthBoard::new());
        let arbiter = LinkArbiter::new(MockLink::new(), &config, health.clone());
        let _held = arbiter
            .acquire(Caller::Motion, AcquireMode::Blocking)
            .unwrap();

        thread::scope(|s| {
            s.spawn(|| {
                for _ in 0..4 {
                    let _ = arbiter.acquire(Caller::Vision, AcquireMode::Bounded(Duration::from_millis(1)));
                }
            });
        });

        assert!(arbiter.is_contended());
        assert!(health.snapshot().contention_degraded);
    }

    #[test]
    fn test_guard_released_on_panic() {
        let arbiter = arbiter(20, 50);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = arbiter
                .acquire(Caller::Motion, AcquireMode::Blocking)
                .unwrap();
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(arbiter.holder(), None);
        assert!(arbiter
            .acquire(Caller::Vision, AcquireMode::Bounded(Duration::from_millis(5)))
            .is_ok());
    }
}
