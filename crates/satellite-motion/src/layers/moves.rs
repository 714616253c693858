//! Move 队列
//!
//! 同一时刻只播放一个 Move：
//! - 更高优先级的请求抢占（并丢弃）当前 Move
//! - 同级或更低优先级的请求排队；队列按优先级排序，同级先进先出
//! - 当前 Move 播放完毕后由队首接替

use super::clip::{Clip, ClipSet, there_and_back};
use super::{AnimationLayer, LayerKind};
use crate::MotionError;
use satellite_protocol::{MovePriority, PoseOffset};
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::debug;

/// Move 库
#[derive(Debug, Clone, Default)]
pub struct MoveLibrary {
    clips: ClipSet,
}

impl MoveLibrary {
    /// 空库
    pub fn new() -> Self {
        Self::default()
    }

    /// 内置情绪片段：happy / sad / curious / surprised / thinking / confused
    pub fn builtin() -> Self {
        let mut library = Self::new();
        library.insert(there_and_back(
            "happy",
            1_600,
            &[
                PoseOffset::rotation(0.0, -10.0, 0.0)
                    .with_translation(0.0, 0.0, 8.0)
                    .with_antennas(45.0, -45.0),
                PoseOffset::rotation(5.0, -8.0, 10.0).with_antennas(-30.0, 30.0),
                PoseOffset::rotation(-5.0, -8.0, -10.0).with_antennas(45.0, -45.0),
            ],
        ));
        library.insert(there_and_back(
            "sad",
            2_400,
            &[
                PoseOffset::rotation(0.0, 25.0, 0.0)
                    .with_translation(0.0, 0.0, -10.0)
                    .with_antennas(-90.0, 90.0),
                PoseOffset::rotation(0.0, 28.0, -8.0)
                    .with_translation(0.0, 0.0, -12.0)
                    .with_antennas(-100.0, 100.0),
            ],
        ));
        library.insert(there_and_back(
            "curious",
            1_800,
            &[
                PoseOffset::rotation(15.0, -5.0, 20.0).with_antennas(20.0, 20.0),
                PoseOffset::rotation(18.0, -8.0, 25.0)
                    .with_translation(10.0, 0.0, 0.0)
                    .with_antennas(30.0, 10.0),
            ],
        ));
        library.insert(there_and_back(
            "surprised",
            1_200,
            &[
                PoseOffset::rotation(0.0, -20.0, 0.0)
                    .with_translation(-10.0, 0.0, 12.0)
                    .with_antennas(80.0, -80.0),
                PoseOffset::rotation(0.0, -15.0, 0.0).with_antennas(70.0, -70.0),
            ],
        ));
        library.insert(there_and_back(
            "thinking",
            2_000,
            &[
                PoseOffset::rotation(-10.0, -15.0, 30.0).with_antennas(30.0, -10.0),
                PoseOffset::rotation(-12.0, -18.0, 35.0).with_antennas(10.0, -30.0),
            ],
        ));
        library.insert(there_and_back(
            "confused",
            1_600,
            &[
                PoseOffset::rotation(20.0, 0.0, -10.0).with_antennas(40.0, -20.0),
                PoseOffset::rotation(-20.0, 0.0, 10.0).with_antennas(-20.0, 40.0),
                PoseOffset::rotation(15.0, 5.0, 0.0),
            ],
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
            .ok_or_else(|| MotionError::UnknownMove(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        self.clips.names()
    }
}

/// Move 请求结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// 队列空闲，立即开始播放
    Started,
    /// 抢占并丢弃了当前 Move
    Preempted { discarded: String },
    /// 排队等待（队列中的位置，从 0 开始）
    Queued { position: usize },
}

#[derive(Debug, Clone)]
struct QueuedMove {
    clip: Arc<Clip>,
    priority: MovePriority,
    /// 已播放时长（秒）
    elapsed: f64,
}

/// Move 队列
#[derive(Debug, Default)]
pub struct MoveQueue {
    active: Option<QueuedMove>,
    pending: SmallVec<[QueuedMove; 8]>,
}

impl MoveQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 请求播放一个 Move
    pub fn request(&mut self, clip: Arc<Clip>, priority: MovePriority) -> MoveOutcome {
        let entry = QueuedMove {
            clip,
            priority,
            elapsed: 0.0,
        };

        let Some(active) = &self.active else {
            debug!("Move '{}' started ({})", entry.clip.name(), priority);
            self.active = Some(entry);
            return MoveOutcome::Started;
        };

        if priority > active.priority {
            let discarded = active.clip.name().to_string();
            debug!(
                "Move '{}' ({}) preempts '{}' ({})",
                entry.clip.name(),
                priority,
                discarded,
                active.priority
            );
            self.active = Some(entry);
            return MoveOutcome::Preempted { discarded };
        }

        // 插在所有优先级不低于自己的条目之后（同级 FIFO）
        let position = self
            .pending
            .iter()
            .position(|queued| queued.priority < priority)
            .unwrap_or(self.pending.len());
        self.pending.insert(position, entry);
        MoveOutcome::Queued { position }
    }

    /// 推进 `dt` 秒并采样；无 Move 播放时返回 `None`
    ///
    /// 第二个返回值为本次推进中开始播放的后续 Move 数量。
    pub fn advance(&mut self, dt: f64) -> (Option<PoseOffset>, usize) {
        let mut handovers = 0;
        let Some(active) = self.active.as_mut() else {
            return (None, 0);
        };
        active.elapsed += dt.max(0.0);

        loop {
            let Some(active) = self.active.as_ref() else {
                return (None, handovers);
            };
            let duration = active.clip.duration().as_secs_f64();
            if active.elapsed < duration {
                return (Some(active.clip.sample_at(active.elapsed)), handovers);
            }

            let leftover = active.elapsed - duration;
            debug!("Move '{}' completed", active.clip.name());
            self.active = if self.pending.is_empty() {
                None
            } else {
                let mut next = self.pending.remove(0);
                next.elapsed = leftover;
                handovers += 1;
                Some(next)
            };
        }
    }

    /// 是否有 Move 正在播放
    pub fn is_playing(&self) -> bool {
        self.active.is_some()
    }

    /// 当前 Move 的名称和优先级
    pub fn active(&self) -> Option<(&str, MovePriority)> {
        self.active
            .as_ref()
            .map(|active| (active.clip.name(), active.priority))
    }

    /// 等待队列中的名称（按播放顺序）
    pub fn pending_names(&self) -> Vec<&str> {
        self.pending.iter().map(|queued| queued.clip.name()).collect()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// 丢弃当前和所有等待的 Move
    pub fn clear(&mut self) {
        self.active = None;
        self.pending.clear();
    }
}

impl AnimationLayer for MoveQueue {
    fn kind(&self) -> LayerKind {
        LayerKind::Move
    }

    fn is_active(&self) -> bool {
        self.is_playing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> MoveLibrary {
        MoveLibrary::builtin()
    }

    #[test]
    fn test_builtin_library() {
        let library = library();
        assert_eq!(
            library.names(),
            vec!["confused", "curious", "happy", "sad", "surprised", "thinking"]
        );
        assert!(matches!(
            library.get("dance"),
            Err(MotionError::UnknownMove(name)) if name == "dance"
        ));
    }

    #[test]
    fn test_high_preempts_low() {
        let library = library();
        let mut queue = MoveQueue::new();

        assert_eq!(
            queue.request(library.get("sad").unwrap(), MovePriority::Low),
            MoveOutcome::Started
        );
        assert_eq!(
            queue.request(library.get("surprised").unwrap(), MovePriority::High),
            MoveOutcome::Preempted {
                discarded: "sad".to_string()
            }
        );
        assert_eq!(queue.active(), Some(("surprised", MovePriority::High)));
        // 被抢占的 Move 直接丢弃，不回到队列
        assert_eq!(queue.pending_len(), 0);
    }

    #[test]
    fn test_low_behind_high_is_appended() {
        let library = library();
        let mut queue = MoveQueue::new();

        queue.request(library.get("happy").unwrap(), MovePriority::High);
        assert_eq!(
            queue.request(library.get("sad").unwrap(), MovePriority::Low),
            MoveOutcome::Queued { position: 0 }
        );
        assert_eq!(queue.active(), Some(("happy", MovePriority::High)));
        assert_eq!(queue.pending_names(), vec!["sad"]);
    }

    #[test]
    fn test_pending_sorted_by_priority_fifo_within() {
        let library = library();
        let mut queue = MoveQueue::new();

        queue.request(library.get("happy").unwrap(), MovePriority::High);
        queue.request(library.get("sad").unwrap(), MovePriority::Low);
        queue.request(library.get("curious").unwrap(), MovePriority::Medium);
        queue.request(library.get("thinking").unwrap(), MovePriority::Medium);
        assert_eq!(
            queue.request(library.get("confused").unwrap(), MovePriority::High),
            MoveOutcome::Queued { position: 0 }
        );

        assert_eq!(
            queue.pending_names(),
            vec!["confused", "curious", "thinking", "sad"]
        );
    }

    #[test]
    fn test_completion_hands_over() {
        let library = library();
        let mut queue = MoveQueue::new();
        queue.request(library.get("surprised").unwrap(), MovePriority::Medium);
        queue.request(library.get("happy").unwrap(), MovePriority::Medium);

        // surprised 时长 1.2s
        let (offset, handovers) = queue.advance(0.6);
        assert!(offset.is_some());
        assert_eq!(handovers, 0);

        let (offset, handovers) = queue.advance(0.7);
        assert!(offset.is_some());
        assert_eq!(handovers, 1);
        assert_eq!(queue.active().map(|a| a.0), Some("happy"));

        // happy 时长 1.6s，结束后队列空闲
        let (offset, _) = queue.advance(2.0);
        assert_eq!(offset, None);
        assert!(!queue.is_playing());
    }

    #[test]
    fn test_clip_starts_and_ends_neutral() {
        let library = library();
        for name in library.names() {
            let clip = library.get(&name).unwrap();
            assert!(clip.sample(0.0).is_neutral(1e-12), "{}", name);
            assert!(clip.sample(1.0).is_neutral(1e-12), "{}", name);
        }
    }
}
