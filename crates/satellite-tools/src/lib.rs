//! # Satellite Tools - 共享配置结构
//!
//! **依赖原则**: 只依赖 `satellite-protocol`，避免依赖 `satellite-link` / `satellite-motion`
//!
//! ## 包含模块
//!
//! - `config` - 运行时配置（TOML，只读加载，从不回写）

pub mod config;

// 重新导出常用类型
pub use config::{
    ActionConfig, ArbiterConfig, BreathingConfig, ConfigError, IoConfig, LifecycleConfig,
    MotionConfig, OscillatorConfig, SatelliteConfig, SwayConfig,
};
