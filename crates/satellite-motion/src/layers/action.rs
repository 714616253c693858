//! Action 叠加层
//!
//! 不排队的短暂手势（点头、摇头、歪头），与 Move 队列相互独立。
//! 触发后进入冷却期，冷却期内的再次触发是无操作。

use super::clip::{Clip, ClipSet, there_and_back};
use super::{AnimationLayer, LayerKind};
use crate::MotionError;
use satellite_protocol::PoseOffset;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Action 库
#[derive(Debug, Clone, Default)]
pub struct ActionLibrary {
    clips: ClipSet,
}

impl ActionLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// 内置手势：nod / shake / tilt
    pub fn builtin() -> Self {
        let mut library = Self::new();
        library.insert(there_and_back(
            "nod",
            800,
            &[
                PoseOffset::rotation(0.0, 15.0, 0.0),
                PoseOffset::rotation(0.0, -5.0, 0.0),
                PoseOffset::rotation(0.0, 12.0, 0.0),
            ],
        ));
        library.insert(there_and_back(
            "shake",
            1_000,
            &[
                PoseOffset::rotation(0.0, 0.0, 20.0),
                PoseOffset::rotation(0.0, 0.0, -20.0),
                PoseOffset::rotation(0.0, 0.0, 15.0),
                PoseOffset::rotation(0.0, 0.0, -10.0),
            ],
        ));
        library.insert(there_and_back(
            "tilt",
            900,
            &[PoseOffset::rotation(18.0, 0.0, 0.0).with_antennas(15.0, -15.0)],
        ));
        library
    }

    pub fn insert(&mut self, clip: Clip) {
        self.clips.insert(clip);
    }

    /// 按名称查找（大小写不敏感）
    pub fn get(&self, name: &str) -> Result<Arc<Clip>, MotionError> {
        self.clips
            .get(name)
            .ok_or_else(|| MotionError::UnknownAction(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        self.clips.names()
    }
}

/// Action 触发结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActionOutcome {
    /// 开始执行
    Started,
    /// 冷却期内，忽略
    Suppressed { remaining: Duration },
}

/// Action 叠加层
#[derive(Debug)]
pub struct ActionOverlay {
    cooldown: f64,
    active: Option<(Arc<Clip>, f64)>,
    /// 剩余冷却时间（秒）
    refractory: f64,
}

impl ActionOverlay {
    /// # 参数
    /// - `cooldown`: 冷却期；实际冷却取 `max(cooldown, 片段时长)`
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown: cooldown.as_secs_f64(),
            active: None,
            refractory: 0.0,
        }
    }

    /// 触发一个 Action
    pub fn trigger(&mut self, clip: Arc<Clip>) -> ActionOutcome {
        if self.refractory > 0.0 {
            debug!(
                "Action '{}' suppressed, refractory {:.3}s remaining",
                clip.name(),
                self.refractory
            );
            return ActionOutcome::Suppressed {
                remaining: Duration::from_secs_f64(self.refractory),
            };
        }

        self.refractory = self.cooldown.max(clip.duration().as_secs_f64());
        debug!("Action '{}' started", clip.name());
        self.active = Some((clip, 0.0));
        ActionOutcome::Started
    }

    /// 推进 `dt` 秒并采样
    pub fn advance(&mut self, dt: f64) -> PoseOffset {
        let dt = dt.max(0.0);
        self.refractory = (self.refractory - dt).max(0.0);

        let Some((clip, elapsed)) = self.active.as_mut() else {
            return PoseOffset::ZERO;
        };
        *elapsed += dt;
        if *elapsed >= clip.duration().as_secs_f64() {
            self.active = None;
            return PoseOffset::ZERO;
        }
        clip.sample_at(*elapsed)
    }

    /// 当前执行中的 Action 名称
    pub fn active_name(&self) -> Option<&str> {
        self.active.as_ref().map(|(clip, _)| clip.name())
    }

    /// 是否处于冷却期
    pub fn is_refractory(&self) -> bool {
        self.refractory > 0.0
    }
}

impl AnimationLayer for ActionOverlay {
    fn kind(&self) -> LayerKind {
        LayerKind::Action
    }

    fn is_active(&self) -> bool {
        self.active.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_actions() {
        let library = ActionLibrary::builtin();
        assert_eq!(library.names(), vec!["nod", "shake", "tilt"]);
        assert!(matches!(
            library.get("wave"),
            Err(MotionError::UnknownAction(_))
        ));
    }

    #[test]
    fn test_retrigger_within_cooldown_is_noop() {
        let library = ActionLibrary::builtin();
        let mut overlay = ActionOverlay::new(Duration::from_secs(2));

        assert_eq!(
            overlay.trigger(library.get("nod").unwrap()),
            ActionOutcome::Started
        );
        overlay.advance(0.5);
        assert!(matches!(
            overlay.trigger(library.get("nod").unwrap()),
            ActionOutcome::Suppressed { .. }
        ));
        // 冷却期内其它 Action 也被忽略
        assert!(matches!(
            overlay.trigger(library.get("shake").unwrap()),
            ActionOutcome::Suppressed { .. }
        ));
        assert_eq!(overlay.active_name(), Some("nod"));

        overlay.advance(1.6);
        assert!(!overlay.is_refractory());
        assert_eq!(
            overlay.trigger(library.get("shake").unwrap()),
            ActionOutcome::Started
        );
    }

    #[test]
    fn test_refractory_covers_clip_duration() {
        let library = ActionLibrary::builtin();
        // 冷却比片段短时，冷却延长到片段时长
        let mut overlay = ActionOverlay::new(Duration::from_millis(100));
        overlay.trigger(library.get("shake").unwrap());
        overlay.advance(0.5);
        assert!(overlay.is_refractory());
        overlay.advance(0.6);
        assert!(!overlay.is_refractory());
        assert_eq!(overlay.active_name(), None);
    }

    #[test]
    fn test_offset_returns_to_zero() {
        let library = ActionLibrary::builtin();
        let mut overlay = ActionOverlay::new(Duration::ZERO);
        overlay.trigger(library.get("nod").unwrap());

        let mid = overlay.advance(0.2);
        assert!(mid.pitch_deg > 0.0);
        assert_eq!(overlay.advance(1.0), PoseOffset::ZERO);
        assert!(!overlay.is_active());
    }
}
