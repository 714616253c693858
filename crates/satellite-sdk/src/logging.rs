//! 日志初始化

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// 安装全局日志订阅者
///
/// 过滤规则取自 `RUST_LOG`，未设置时为 `info`；同时把 `log` crate 的记录转发到 `tracing`。
/// 可重复调用，只有第一次生效；已有其他全局订阅者时保持不变。
pub fn init_logger() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .finish();

        if tracing::subscriber::set_global_default(subscriber).is_ok() {
            let _ = tracing_log::LogTracer::init_with_filter(log::LevelFilter::Trace);
        }
    });
}
