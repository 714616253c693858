//! 人脸追踪输入
//!
//! 视觉协作方推送最新的追踪增量；更新停止时保持最后一个值，
//! 过期只用于上报，不会把增量清零。

use arc_swap::ArcSwap;
use satellite_protocol::PoseOffset;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct TrackingSample {
    offset: PoseOffset,
    updated_at: Option<Instant>,
}

/// 人脸追踪增量（保持最后值）
#[derive(Debug)]
pub struct TrackingFeed {
    latest: ArcSwap<TrackingSample>,
}

impl TrackingFeed {
    pub fn new() -> Self {
        Self {
            latest: ArcSwap::from_pointee(TrackingSample {
                offset: PoseOffset::ZERO,
                updated_at: None,
            }),
        }
    }

    /// 推送新的追踪增量
    pub fn push(&self, offset: PoseOffset) {
        self.latest.store(Arc::new(TrackingSample {
            offset,
            updated_at: Some(Instant::now()),
        }));
    }

    /// 清除追踪（目标丢失且协作方明确要求回中时使用）
    pub fn clear(&self) {
        self.latest.store(Arc::new(TrackingSample {
            offset: PoseOffset::ZERO,
            updated_at: None,
        }));
    }

    /// 最后一个追踪增量
    #[inline]
    pub fn latest(&self) -> PoseOffset {
        self.latest.load().offset
    }

    /// 距上次更新的时长（从未更新返回 `None`）
    pub fn age(&self) -> Option<Duration> {
        self.latest.load().updated_at.map(|at| at.elapsed())
    }

    /// 是否超过 `max_age` 未更新（从未更新不算过期）
    pub fn is_stale(&self, max_age: Duration) -> bool {
        self.age().is_some_and(|age| age > max_age)
    }
}

impl Default for TrackingFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_holds_last_value() {
        let feed = TrackingFeed::new();
        assert_eq!(feed.latest(), PoseOffset::ZERO);
        assert!(!feed.is_stale(Duration::ZERO));

        let offset = PoseOffset::rotation(0.0, 5.0, -12.0);
        feed.push(offset);
        std::thread::sleep(Duration::from_millis(5));

        // 过期但仍保持
        assert!(feed.is_stale(Duration::from_millis(1)));
        assert_eq!(feed.latest(), offset);

        feed.clear();
        assert_eq!(feed.latest(), PoseOffset::ZERO);
        assert_eq!(feed.age(), None);
    }
}
