//! 健康状态看板
//!
//! 所有非致命错误都在发生处被吸收，只以健康信号的形式上报：
//! - 持续竞争（滑动窗口内超时次数超过阈值）
//! - 生命周期转换中某个服务 suspend/resume 失败
//! - 硬件拒绝命令
//! - 链路丢失（唯一的致命情况，仍然只上报，由运动控制循环自行退出）

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::warn;

/// 订阅通道容量
const SUBSCRIBER_CAPACITY: usize = 64;

/// 生命周期转换阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionPhase {
    Suspend,
    Resume,
}

impl fmt::Display for TransitionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionPhase::Suspend => f.write_str("suspend"),
            TransitionPhase::Resume => f.write_str("resume"),
        }
    }
}

/// 服务故障记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceFailure {
    pub service: String,
    pub phase: TransitionPhase,
    pub reason: String,
}

/// 健康信号
#[derive(Debug, Clone, PartialEq)]
pub enum HealthSignal {
    /// 持续竞争：窗口内超时次数超过阈值
    SustainedContention { timeouts: usize, window: Duration },
    /// 竞争恢复正常
    ContentionRecovered,
    /// 服务 suspend/resume 失败
    ServiceFailure(ServiceFailure),
    /// 服务恢复正常（后续转换成功）
    ServiceRecovered { service: String },
    /// 硬件拒绝命令（本周期位姿被丢弃）
    CommandRejected { reason: String },
    /// 链路丢失
    LinkLost,
}

/// 健康报告快照
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthReport {
    pub contention_degraded: bool,
    pub link_lost: bool,
    pub rejected_commands: u64,
    pub failed_services: Vec<ServiceFailure>,
}

impl HealthReport {
    /// 是否处于降级状态
    pub fn is_degraded(&self) -> bool {
        self.contention_degraded || self.link_lost || !self.failed_services.is_empty()
    }
}

/// 健康状态看板
///
/// 多个子系统共享（`Arc<HealthBoard>`），写入信号并广播给订阅者。
/// 广播使用 `try_send`，订阅者处理不及时只会丢信号，不会阻塞上报方。
#[derive(Debug, Default)]
pub struct HealthBoard {
    contention_degraded: AtomicBool,
    link_lost: AtomicBool,
    rejected_commands: AtomicU64,
    failed_services: Mutex<Vec<ServiceFailure>>,
    subscribers: Mutex<Vec<Sender<HealthSignal>>>,
}

impl HealthBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// 上报一个健康信号
    pub fn report(&self, signal: HealthSignal) {
        match &signal {
            HealthSignal::SustainedContention { .. } => {
                self.contention_degraded.store(true, Ordering::Release);
            },
            HealthSignal::ContentionRecovered => {
                self.contention_degraded.store(false, Ordering::Release);
            },
            HealthSignal::ServiceFailure(failure) => {
                let mut failed = self.failed_services.lock();
                failed.retain(|f| f.service != failure.service);
                failed.push(failure.clone());
            },
            HealthSignal::ServiceRecovered { service } => {
                let mut failed = self.failed_services.lock();
                let before = failed.len();
                failed.retain(|f| &f.service != service);
                if failed.len() == before {
                    // 该服务之前没有故障记录，无需广播
                    return;
                }
            },
            HealthSignal::CommandRejected { .. } => {
                self.rejected_commands.fetch_add(1, Ordering::Relaxed);
            },
            HealthSignal::LinkLost => {
                self.link_lost.store(true, Ordering::Release);
            },
        }

        self.broadcast(signal);
    }

    /// 订阅健康信号
    pub fn subscribe(&self) -> Receiver<HealthSignal> {
        let (tx, rx) = bounded(SUBSCRIBER_CAPACITY);
        self.subscribers.lock().push(tx);
        rx
    }

    /// 获取健康报告快照
    pub fn snapshot(&self) -> HealthReport {
        HealthReport {
            contention_degraded: self.contention_degraded.load(Ordering::Acquire),
            link_lost: self.link_lost.load(Ordering::Acquire),
            rejected_commands: self.rejected_commands.load(Ordering::Relaxed),
            failed_services: self.failed_services.lock().clone(),
        }
    }

    fn broadcast(&self, signal: HealthSignal) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| match tx.try_send(signal.clone()) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}

/// 竞争状态变化
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentionTransition {
    /// 无变化
    Unchanged,
    /// 进入降级状态
    Degraded { timeouts: usize },
    /// 从降级状态恢复
    Recovered,
}

/// 竞争监视器（滑动窗口计数）
///
/// 超时次数超过 `threshold` 时进入降级；窗口内次数回落到阈值一半以下时恢复，
/// 用迟滞避免在阈值附近反复切换。
#[derive(Debug)]
pub struct ContentionMonitor {
    window: Duration,
    threshold: usize,
    timeouts: Mutex<VecDeque<Instant>>,
    degraded: AtomicBool,
}

impl ContentionMonitor {
    pub fn new(window: Duration, threshold: usize) -> Self {
        Self {
            window,
            threshold: threshold.max(1),
            timeouts: Mutex::new(VecDeque::new()),
            degraded: AtomicBool::new(false),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// 是否处于降级状态
    #[inline]
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    /// 记录一次超时
    pub fn record_timeout(&self, now: Instant) -> ContentionTransition {
        let mut timeouts = self.timeouts.lock();
        timeouts.push_back(now);
        self.prune(&mut timeouts, now);

        let count = timeouts.len();
        if count > self.threshold && !self.degraded.swap(true, Ordering::AcqRel) {
            warn!(
                "Sustained link contention: {} timeouts within {:?}",
                count, self.window
            );
            return ContentionTransition::Degraded { timeouts: count };
        }
        ContentionTransition::Unchanged
    }

    /// 刷新窗口（未降级时为一次原子读取，开销可忽略）
    pub fn refresh(&self, now: Instant) -> ContentionTransition {
        if !self.is_degraded() {
            return ContentionTransition::Unchanged;
        }

        let mut timeouts = self.timeouts.lock();
        self.prune(&mut timeouts, now);
        if timeouts.len() <= self.threshold / 2 && self.degraded.swap(false, Ordering::AcqRel) {
            return ContentionTransition::Recovered;
        }
        ContentionTransition::Unchanged
    }

    /// 窗口内的超时次数
    pub fn timeouts_in_window(&self, now: Instant) -> usize {
        let mut timeouts = self.timeouts.lock();
        self.prune(&mut timeouts, now);
        timeouts.len()
    }

    fn prune(&self, timeouts: &mut VecDeque<Instant>, now: Instant) {
        while let Some(front) = timeouts.front() {
            if now.saturating_duration_since(*front) > self.window {
                timeouts.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contention_degrades_above_threshold() {
        let monitor = ContentionMonitor::new(Duration::from_secs(1), 3);
        let t0 = Instant::now();

        for i in 0..3 {
            assert_eq!(
                monitor.record_timeout(t0 + Duration::from_millis(i * 10)),
                ContentionTransition::Unchanged
            );
        }
        assert_eq!(
            monitor.record_timeout(t0 + Duration::from_millis(40)),
            ContentionTransition::Degraded { timeouts: 4 }
        );
        assert!(monitor.is_degraded());

        // 已降级时不重复上报
        assert_eq!(
            monitor.record_timeout(t0 + Duration::from_millis(50)),
            ContentionTransition::Unchanged
        );
    }

    #[test]
    fn test_contention_window_expires() {
        let monitor = ContentionMonitor::new(Duration::from_millis(100), 2);
        let t0 = Instant::now();

        // 分散在窗口之外的超时不会累积
        for i in 0..10 {
            monitor.record_timeout(t0 + Duration::from_millis(i * 200));
        }
        assert!(!monitor.is_degraded());
        assert_eq!(
            monitor.timeouts_in_window(t0 + Duration::from_millis(1_800)),
            1
        );
    }

    #[test]
    fn test_contention_recovers() {
        let monitor = ContentionMonitor::new(Duration::from_millis(100), 2);
        let t0 = Instant::now();
        for i in 0..3 {
            monitor.record_timeout(t0 + Duration::from_millis(i));
        }
        assert!(monitor.is_degraded());

        assert_eq!(
            monitor.refresh(t0 + Duration::from_millis(50)),
            ContentionTransition::Unchanged
        );
        assert_eq!(
            monitor.refresh(t0 + Duration::from_millis(500)),
            ContentionTransition::Recovered
        );
        assert!(!monitor.is_degraded());
    }

    #[test]
    fn test_health_board_service_failures() {
        let board = HealthBoard::new();
        let rx = board.subscribe();

        board.report(HealthSignal::ServiceFailure(ServiceFailure {
            service: "camera".to_string(),
            phase: TransitionPhase::Suspend,
            reason: "device busy".to_string(),
        }));

        let report = board.snapshot();
        assert!(report.is_degraded());
        assert_eq!(report.failed_services.len(), 1);
        assert_eq!(report.failed_services[0].service, "camera");
        assert!(matches!(rx.try_recv(), Ok(HealthSignal::ServiceFailure(_))));

        board.report(HealthSignal::ServiceRecovered {
            service: "camera".to_string(),
        });
        assert!(!board.snapshot().is_degraded());
        assert!(matches!(
            rx.try_recv(),
            Ok(HealthSignal::ServiceRecovered { .. })
        ));

        // 没有故障记录的服务恢复不广播
        board.report(HealthSignal::ServiceRecovered {
            service: "speaker".to_string(),
        });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_health_board_counters() {
        let board = HealthBoard::new();
        board.report(HealthSignal::CommandRejected {
            reason: "pitch".to_string(),
        });
        board.report(HealthSignal::CommandRejected {
            reason: "yaw".to_string(),
        });
        board.report(HealthSignal::SustainedContention {
            timeouts: 51,
            window: Duration::from_secs(5),
        });

        let report = board.snapshot();
        assert_eq!(report.rejected_commands, 2);
        assert!(report.contention_degraded);

        board.report(HealthSignal::ContentionRecovered);
        assert!(!board.snapshot().contention_degraded);
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let board = HealthBoard::new();
        let rx = board.subscribe();
        drop(rx);
        board.report(HealthSignal::LinkLost);
        assert!(board.subscribers.lock().is_empty());
        assert!(board.snapshot().link_lost);
    }
}
