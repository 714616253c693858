//! I/O 循环线程句柄
//!
//! 采集、播放、视觉循环共用：线程创建、挂起握手、关闭时带超时 join。

use crate::error::{LifecycleError, SatelliteError};
use crate::metrics::{LoopMetrics, LoopMetricsSnapshot};
use crate::service::ServiceControl;
use satellite_motion::JoinTimeout;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{Builder, JoinHandle};
use std::time::Duration;
use tracing::{error, info};

/// 关闭时等待循环线程退出的时长
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

pub(crate) struct IoWorker {
    control: Arc<ServiceControl>,
    metrics: Arc<LoopMetrics>,
    thread: Option<JoinHandle<()>>,
    ack_timeout: Duration,
}

impl IoWorker {
    /// 创建循环线程
    ///
    /// `body` 在线程内运行，必须在每轮开始时调用 `ServiceControl::checkpoint`；
    /// 无论 `body` 如何返回，线程退出前都会标记控制块为已退出。
    /// `start_suspended` 为 true 时线程在第一个检查点停靠，直到 `resume()`。
    pub(crate) fn spawn<F>(
        name: &'static str,
        ack_timeout: Duration,
        start_suspended: bool,
        body: F,
    ) -> Result<Self, SatelliteError>
    where
        F: FnOnce(Arc<ServiceControl>, Arc<LoopMetrics>) + Send + 'static,
    {
        let control = Arc::new(ServiceControl::new(name));
        if start_suspended {
            control.park_on_start();
        }
        let metrics = Arc::new(LoopMetrics::new());

        let thread = {
            let control = control.clone();
            let metrics = metrics.clone();
            Builder::new()
                .name(format!("satellite-{}", name))
                .spawn(move || {
                    let exit = ExitGuard(control.clone());
                    body(control, metrics);
                    drop(exit);
                })
                .map_err(|source| SatelliteError::Spawn { name, source })?
        };

        if start_suspended {
            info!("{} loop started (suspended)", name);
        } else {
            info!("{} loop started", name);
        }
        Ok(Self {
            control,
            metrics,
            thread: Some(thread),
            ack_timeout,
        })
    }

    pub(crate) fn name(&self) -> &'static str {
        self.control.name()
    }

    pub(crate) fn suspend(&self) -> Result<(), LifecycleError> {
        self.control.suspend(self.ack_timeout)?;
        self.metrics.suspends.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub(crate) fn resume(&self) -> Result<(), LifecycleError> {
        self.control.resume()
    }

    pub(crate) fn metrics(&self) -> LoopMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub(crate) fn is_suspended(&self) -> bool {
        self.control.is_suspended()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for IoWorker {
    fn drop(&mut self) {
        self.control.stop();
        if let Some(handle) = self.thread.take()
            && let Err(_e) = handle.join_timeout(JOIN_TIMEOUT)
        {
            error!(
                "{} thread panicked or failed to shut down within {:?}",
                self.control.name(),
                JOIN_TIMEOUT
            );
        }
        info!("{} loop shut down", self.control.name());
    }
}

/// 线程退出（包括 panic 展开）时标记控制块
struct ExitGuard(Arc<ServiceControl>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.0.mark_exited();
    }
}

/// 为包装了 `IoWorker` 的循环类型实现 `SleepAwareService` 和公共访问器
macro_rules! impl_io_service {
    ($ty:ty) => {
        impl $crate::service::SleepAwareService for $ty {
            fn name(&self) -> &str {
                self.worker.name()
            }

            fn suspend(&self) -> Result<(), $crate::error::LifecycleError> {
                self.worker.suspend()
            }

            fn resume(&self) -> Result<(), $crate::error::LifecycleError> {
                self.worker.resume()
            }
        }

        impl $ty {
            pub fn metrics(&self) -> $crate::metrics::LoopMetricsSnapshot {
                self.worker.metrics()
            }

            pub fn is_suspended(&self) -> bool {
                self.worker.is_suspended()
            }

            /// 循环线程是否仍在运行
            pub fn is_running(&self) -> bool {
                self.worker.is_running()
            }
        }
    };
}

pub(crate) use impl_io_service;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_suspend_and_drop() {
        let worker = IoWorker::spawn("test", Duration::from_millis(500), false, |control, metrics| {
            while control.checkpoint(|| {}) {
                metrics.cycles.fetch_add(1, Ordering::Relaxed);
                std::thread::sleep(Duration::from_millis(1));
            }
        })
        .unwrap();

        std::thread::sleep(Duration::from_millis(10));
        worker.suspend().unwrap();
        assert!(worker.is_suspended());
        assert_eq!(worker.metrics().suspends, 1);
        assert!(worker.is_running());
        drop(worker);
    }

    #[test]
    fn test_worker_started_suspended_waits_for_resume() {
        let worker = IoWorker::spawn("late", Duration::from_millis(500), true, |control, metrics| {
            while control.checkpoint(|| {}) {
                metrics.cycles.fetch_add(1, Ordering::Relaxed);
                std::thread::sleep(Duration::from_millis(1));
            }
        })
        .unwrap();

        std::thread::sleep(Duration::from_millis(20));
        assert!(worker.is_suspended());
        assert_eq!(worker.metrics().cycles, 0);

        worker.resume().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(worker.metrics().cycles > 0);
    }

    #[test]
    fn test_body_exit_marks_stopped() {
        let worker =
            IoWorker::spawn("short", Duration::from_millis(100), false, |_control, _metrics| {})
                .unwrap();
        std::thread::sleep(Duration::from_millis(20));

        assert!(!worker.is_running());
        assert!(matches!(worker.suspend(), Err(LifecycleError::Stopped(_))));
    }
}
