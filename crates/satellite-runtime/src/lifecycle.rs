//! 睡眠 / 唤醒生命周期管理
//!
//! 维护一个有序的 `SleepAwareService` 注册表：
//! - 睡眠触发（睡眠命令 / 断连）：先写入 SLEEPING / SUSPENDED，
//!   再按注册顺序逐个 `suspend()`
//! - 唤醒触发（唤醒命令 / 重连）：先在 `StateCell` 标记即将还原的状态，
//!   按注册顺序逐个 `resume()`，最后还原状态
//!
//! 转换不会中途放弃：单个服务失败只记录到 `TransitionReport` 并上报健康看板，
//! 其余服务照常处理。
//!
//! ```text
//! 清醒状态 --睡眠命令--> SLEEPING --唤醒命令--> IDLE
//!     |                      |
//!  断连(保存)              断连(记为 SLEEPING)
//!     ↓                      ↓
//! SUSPENDED --重连--> 保存的状态 / SLEEPING
//! ```

use crate::error::LifecycleError;
use crate::service::SleepAwareService;
use parking_lot::Mutex;
use satellite_link::{HealthBoard, HealthSignal, ServiceFailure, TransitionPhase};
use satellite_motion::StateCell;
use satellite_protocol::RobotState;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 生命周期触发源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleTrigger {
    Sleep,
    Wake,
    ConnectivityLost,
    ConnectivityRestored,
}

impl fmt::Display for LifecycleTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleTrigger::Sleep => "sleep",
            LifecycleTrigger::Wake => "wake",
            LifecycleTrigger::ConnectivityLost => "connectivity_lost",
            LifecycleTrigger::ConnectivityRestored => "connectivity_restored",
        };
        f.write_str(name)
    }
}

/// 一次生命周期转换的结果
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionReport {
    pub trigger: LifecycleTrigger,
    pub from: RobotState,
    pub to: RobotState,
    /// 本次转换调用的服务阶段（`None` 表示只改变了状态）
    pub phase: Option<TransitionPhase>,
    /// 成功处理的服务（按调用顺序）
    pub succeeded: Vec<String>,
    /// 失败的服务
    pub failures: Vec<ServiceFailure>,
}

impl TransitionReport {
    /// 所有服务都成功
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// 调用过的服务数量
    pub fn services_touched(&self) -> usize {
        self.succeeded.len() + self.failures.len()
    }
}

#[derive(Debug, Default)]
struct LifecycleInner {
    /// 断连前的状态（重连后还原）
    saved: Option<RobotState>,
}

/// 生命周期管理器
pub struct LifecycleManager {
    state: Arc<StateCell>,
    health: Arc<HealthBoard>,
    services: Mutex<Vec<Arc<dyn SleepAwareService>>>,
    /// 串行化所有生命周期转换
    inner: Mutex<LifecycleInner>,
}

impl LifecycleManager {
    pub fn new(state: Arc<StateCell>, health: Arc<HealthBoard>) -> Self {
        Self {
            state,
            health,
            services: Mutex::new(Vec::new()),
            inner: Mutex::new(LifecycleInner::default()),
        }
    }

    /// 注册服务（按注册顺序挂起和恢复）
    pub fn register(&self, service: Arc<dyn SleepAwareService>) {
        debug!("Registered sleep-aware service '{}'", service.name());
        self.services.lock().push(service);
    }

    /// 注销所有服务（关闭时调用）
    pub fn clear(&self) {
        self.services.lock().clear();
    }

    /// 已注册服务的名称（注册顺序）
    pub fn service_names(&self) -> Vec<String> {
        self.services
            .lock()
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    /// 断连前保存的状态
    pub fn saved_state(&self) -> Option<RobotState> {
        self.inner.lock().saved
    }

    /// 睡眠命令
    ///
    /// 已在睡眠中返回 `None`；断连期间只记录重连后进入 SLEEPING。
    pub fn sleep(&self) -> Option<TransitionReport> {
        let mut inner = self.inner.lock();
        let from = self.state.get();
        match from {
            state if state.is_awake() => {
                self.state.set(RobotState::Sleeping);
                Some(self.run(
                    LifecycleTrigger::Sleep,
                    from,
                    RobotState::Sleeping,
                    TransitionPhase::Suspend,
                ))
            },
            RobotState::Suspended => {
                inner.saved = Some(RobotState::Sleeping);
                info!("Sleep requested while disconnected, will sleep on reconnect");
                Some(self.state_only(LifecycleTrigger::Sleep, from, from))
            },
            _ => {
                debug!("Sleep ignored in state {}", from);
                None
            },
        }
    }

    /// 唤醒命令
    ///
    /// 断连期间只记录重连后进入 IDLE。
    pub fn wake(&self) -> Option<TransitionReport> {
        let mut inner = self.inner.lock();
        let from = self.state.get();
        match from {
            RobotState::Sleeping => Some(self.restore(LifecycleTrigger::Wake, from, RobotState::Idle)),
            RobotState::Suspended if inner.saved == Some(RobotState::Sleeping) => {
                inner.saved = Some(RobotState::Idle);
                info!("Wake requested while disconnected, will wake on reconnect");
                Some(self.state_only(LifecycleTrigger::Wake, from, from))
            },
            _ => {
                debug!("Wake ignored in state {}", from);
                None
            },
        }
    }

    /// 与后端的连接断开
    ///
    /// 清醒状态下保存当前状态并挂起所有服务；睡眠中服务已挂起，只记录 SUSPENDED。
    pub fn connectivity_lost(&self) -> Option<TransitionReport> {
        let mut inner = self.inner.lock();
        let from = self.state.get();
        match from {
            state if state.is_awake() => {
                inner.saved = Some(from);
                self.state.set(RobotState::Suspended);
                Some(self.run(
                    LifecycleTrigger::ConnectivityLost,
                    from,
                    RobotState::Suspended,
                    TransitionPhase::Suspend,
                ))
            },
            RobotState::Sleeping => {
                inner.saved = Some(RobotState::Sleeping);
                self.state.set(RobotState::Suspended);
                Some(self.state_only(
                    LifecycleTrigger::ConnectivityLost,
                    from,
                    RobotState::Suspended,
                ))
            },
            _ => {
                debug!("Connectivity loss ignored in state {}", from);
                None
            },
        }
    }

    /// 与后端的连接恢复
    ///
    /// 还原断连前的状态；断连前在睡眠则回到 SLEEPING，服务保持挂起。
    pub fn connectivity_restored(&self) -> Option<TransitionReport> {
        let mut inner = self.inner.lock();
        let from = self.state.get();
        if from != RobotState::Suspended {
            debug!("Connectivity restore ignored in state {}", from);
            return None;
        }

        let target = inner.saved.take().unwrap_or(RobotState::Idle);
        if target == RobotState::Sleeping {
            self.state.set(RobotState::Sleeping);
            return Some(self.state_only(LifecycleTrigger::ConnectivityRestored, from, target));
        }
        Some(self.restore(LifecycleTrigger::ConnectivityRestored, from, target))
    }

    /// 恢复服务后还原状态
    fn restore(
        &self,
        trigger: LifecycleTrigger,
        from: RobotState,
        to: RobotState,
    ) -> TransitionReport {
        // 控制循环按即将还原的状态渲染恢复位姿
        self.state.set_resume_to(Some(to));
        let report = self.run(trigger, from, to, TransitionPhase::Resume);
        if self.state.set(to).is_none() && self.state.get() != to {
            warn!("Failed to restore state {} after {}", to, trigger);
        }
        report
    }

    fn run(
        &self,
        trigger: LifecycleTrigger,
        from: RobotState,
        to: RobotState,
        phase: TransitionPhase,
    ) -> TransitionReport {
        // 复制注册表，服务回调期间不持有注册表锁
        let services: Vec<Arc<dyn SleepAwareService>> = self.services.lock().clone();
        let mut report = TransitionReport {
            trigger,
            from,
            to,
            phase: Some(phase),
            succeeded: Vec::with_capacity(services.len()),
            failures: Vec::new(),
        };

        for service in &services {
            let result: Result<(), LifecycleError> = match phase {
                TransitionPhase::Suspend => service.suspend(),
                TransitionPhase::Resume => service.resume(),
            };
            match result {
                Ok(()) => {
                    debug!("Service '{}' {} ok", service.name(), phase);
                    self.health.report(HealthSignal::ServiceRecovered {
                        service: service.name().to_string(),
                    });
                    report.succeeded.push(service.name().to_string());
                },
                Err(e) => {
                    warn!("Service '{}' failed to {}: {}", service.name(), phase, e);
                    let failure = ServiceFailure {
                        service: service.name().to_string(),
                        phase,
                        reason: e.to_string(),
                    };
                    self.health.report(HealthSignal::ServiceFailure(failure.clone()));
                    report.failures.push(failure);
                },
            }
        }

        info!(
            "Lifecycle {}: {} -> {} ({}/{} services ok)",
            trigger,
            from,
            to,
            report.succeeded.len(),
            services.len()
        );
        report
    }

    fn state_only(
        &self,
        trigger: LifecycleTrigger,
        from: RobotState,
        to: RobotState,
    ) -> TransitionReport {
        info!("Lifecycle {}: {} -> {} (services unchanged)", trigger, from, to);
        TransitionReport {
            trigger,
            from,
            to,
            phase: None,
            succeeded: Vec::new(),
            failures: Vec::new(),
        }
    }
}
