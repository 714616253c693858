//! 可挂起服务
//!
//! 所有需要随睡眠 / 断连停止工作的子系统都实现 `SleepAwareService`，
//! 在启动时按顺序注册到 `LifecycleManager`。
//!
//! I/O 循环线程通过 `ServiceControl` 与生命周期管理器握手：
//! `suspend()` 在循环线程停靠（并清空自己的缓冲区）之后才返回，
//! 因此返回时该服务已完全停止访问硬件链路。

use crate::error::LifecycleError;
use parking_lot::{Condvar, Mutex};
use satellite_motion::MotionHandle;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::trace;

/// 可随睡眠 / 唤醒挂起的服务
pub trait SleepAwareService: Send + Sync {
    /// 服务名称（用于日志和健康报告）
    fn name(&self) -> &str;

    /// 停止工作；返回时服务不再访问硬件链路
    fn suspend(&self) -> Result<(), LifecycleError>;

    /// 恢复工作
    fn resume(&self) -> Result<(), LifecycleError>;
}

impl SleepAwareService for MotionHandle {
    fn name(&self) -> &str {
        "motion"
    }

    fn suspend(&self) -> Result<(), LifecycleError> {
        MotionHandle::suspend(self).map_err(LifecycleError::from)
    }

    /// 阻塞直到控制循环按即将还原的状态产出一个合法位姿
    fn resume(&self) -> Result<(), LifecycleError> {
        MotionHandle::resume(self).map_err(LifecycleError::from)
    }
}

#[derive(Debug, Default)]
struct ControlFlags {
    suspended: bool,
    parked: bool,
    exited: bool,
}

/// 循环线程的挂起 / 退出控制块
#[derive(Debug)]
pub(crate) struct ServiceControl {
    name: &'static str,
    running: AtomicBool,
    flags: Mutex<ControlFlags>,
    changed: Condvar,
}

impl ServiceControl {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            running: AtomicBool::new(true),
            flags: Mutex::new(ControlFlags::default()),
            changed: Condvar::new(),
        }
    }

    /// 线程启动前标记为挂起：第一个检查点即停靠
    pub(crate) fn park_on_start(&self) {
        self.flags.lock().suspended = true;
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn is_suspended(&self) -> bool {
        self.flags.lock().suspended
    }

    /// 循环线程每轮开始时调用
    ///
    /// 挂起期间在此停靠；停靠前先执行 `on_park`（清空缓冲区等）。
    /// 返回 `false` 表示线程应退出。
    pub(crate) fn checkpoint(&self, on_park: impl FnOnce()) -> bool {
        if !self.is_running() {
            return false;
        }

        let mut flags = self.flags.lock();
        if !flags.suspended {
            return true;
        }

        on_park();
        flags.parked = true;
        self.changed.notify_all();
        trace!("{} loop parked", self.name);

        while flags.suspended && self.is_running() {
            self.changed.wait(&mut flags);
        }
        flags.parked = false;
        self.is_running()
    }

    /// 请求挂起并等待循环线程停靠
    pub(crate) fn suspend(&self, timeout: Duration) -> Result<(), LifecycleError> {
        let mut flags = self.flags.lock();
        if flags.exited {
            return Err(LifecycleError::Stopped(self.name.to_string()));
        }
        flags.suspended = true;
        self.changed.notify_all();

        let result = self
            .changed
            .wait_while_for(&mut flags, |f| !f.parked && !f.exited, timeout);
        if flags.parked {
            Ok(())
        } else if flags.exited {
            Err(LifecycleError::Stopped(self.name.to_string()))
        } else {
            debug_assert!(result.timed_out());
            Err(LifecycleError::Timeout {
                service: self.name.to_string(),
                waited: timeout,
            })
        }
    }

    /// 解除挂起
    pub(crate) fn resume(&self) -> Result<(), LifecycleError> {
        let mut flags = self.flags.lock();
        if flags.exited {
            return Err(LifecycleError::Stopped(self.name.to_string()));
        }
        flags.suspended = false;
        self.changed.notify_all();
        Ok(())
    }

    /// 请求线程退出（唤醒停靠中的线程）
    pub(crate) fn stop(&self) {
        self.running.store(false, Ordering::Release);
        let _flags = self.flags.lock();
        self.changed.notify_all();
    }

    /// 循环线程退出前调用
    pub(crate) fn mark_exited(&self) {
        self.running.store(false, Ordering::Release);
        let mut flags = self.flags.lock();
        flags.exited = true;
        flags.parked = false;
        self.changed.notify_all();
    }
}
