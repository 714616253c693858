//! 关键帧动画片段
//!
//! Move 和 Action 都是按名称查找的关键帧片段：
//! 关键帧位置是归一化进度 `[0, 1]`，相邻关键帧之间用 smoothstep 缓入缓出。

use satellite_protocol::PoseOffset;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// smoothstep 缓动：`3t² - 2t³`，输入钳位到 `[0, 1]`
#[inline]
pub fn smoothstep(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// 关键帧
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    /// 归一化进度 `[0, 1]`
    pub at: f64,
    pub offset: PoseOffset,
}

impl Keyframe {
    pub const fn new(at: f64, offset: PoseOffset) -> Self {
        Self { at, offset }
    }
}

/// 动画片段
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    name: String,
    duration: Duration,
    keyframes: Vec<Keyframe>,
}

impl Clip {
    /// 创建片段（关键帧按进度排序，进度钳位到 `[0, 1]`）
    pub fn new(name: impl Into<String>, duration: Duration, keyframes: Vec<Keyframe>) -> Self {
        let mut keyframes: Vec<Keyframe> = keyframes
            .into_iter()
            .map(|k| Keyframe::new(k.at.clamp(0.0, 1.0), k.offset))
            .collect();
        keyframes.sort_by(|a, b| a.at.total_cmp(&b.at));
        Self {
            name: name.into(),
            duration,
            keyframes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    /// 在经过 `elapsed` 秒时采样
    pub fn sample_at(&self, elapsed: f64) -> PoseOffset {
        let duration = self.duration.as_secs_f64();
        if duration <= 0.0 {
            return self.sample(1.0);
        }
        self.sample(elapsed / duration)
    }

    /// 按归一化进度采样
    pub fn sample(&self, progress: f64) -> PoseOffset {
        let (first, last) = match (self.keyframes.first(), self.keyframes.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return PoseOffset::ZERO,
        };
        if progress <= first.at {
            return first.offset;
        }
        if progress >= last.at {
            return last.offset;
        }

        for pair in self.keyframes.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if progress <= b.at {
                let span = b.at - a.at;
                if span <= f64::EPSILON {
                    return b.offset;
                }
                let t = smoothstep((progress - a.at) / span);
                return PoseOffset::lerp(a.offset, b.offset, t);
            }
        }
        last.offset
    }
}

/// 按名称索引的片段集合（Move 库与 Action 库共用）
#[derive(Debug, Clone, Default)]
pub(crate) struct ClipSet {
    clips: HashMap<String, Arc<Clip>>,
}

impl ClipSet {
    pub(crate) fn insert(&mut self, clip: Clip) {
        self.clips.insert(clip.name().to_ascii_lowercase(), Arc::new(clip));
    }

    pub(crate) fn get(&self, name: &str) -> Option<Arc<Clip>> {
        self.clips.get(&name.trim().to_ascii_lowercase()).cloned()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clips.keys().cloned().collect();
        names.sort();
        names
    }
}

/// 构造"出发 - 保持 - 返回"形状的片段：从零到峰值再回零
pub(crate) fn there_and_back(name: &str, duration_ms: u64, peaks: &[PoseOffset]) -> Clip {
    let n = peaks.len();
    let mut keyframes = Vec::with_capacity(n + 2);
    keyframes.push(Keyframe::new(0.0, PoseOffset::ZERO));
    for (i, peak) in peaks.iter().enumerate() {
        keyframes.push(Keyframe::new((i + 1) as f64 / (n + 1) as f64, *peak));
    }
    keyframes.push(Keyframe::new(1.0, PoseOffset::ZERO));
    Clip::new(name, Duration::from_millis(duration_ms), keyframes)
}
