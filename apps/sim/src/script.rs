//! 事件脚本
//!
//! JSON 脚本描述一段交互：对话事件、语音播放、显式 Move / Action、等待。

use crate::collaborators::synthetic_speech;
use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use satellite_sdk::link::MockLink;
use satellite_sdk::prelude::*;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// 内置脚本：唤醒 → 对话 → 回复 → 睡眠 / 唤醒 → 断连 / 重连
const BUILTIN_SCRIPT: &str = include_str!("../scripts/conversation.json");

/// 等待时检查退出标志的间隔
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// 脚本
#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub steps: Vec<ScriptStep>,
}

/// 脚本步骤
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptStep {
    /// 投递一个外部事件
    Event { event: SatelliteEvent },

    /// 向播放循环排入一段合成语音
    Speak { duration_ms: u64 },

    /// 显式请求 Move
    Move {
        name: String,
        #[serde(default = "default_priority")]
        priority: MovePriority,
    },

    /// 显式触发 Action
    Action { name: String },

    /// 等待
    Wait { duration_ms: u64 },
}

fn default_priority() -> MovePriority {
    MovePriority::Low
}

impl Script {
    pub fn builtin() -> Result<Self> {
        serde_json::from_str(BUILTIN_SCRIPT).context("Built-in script is malformed")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse script {}", path.display()))
    }

    /// 所有等待步骤和语音的总时长
    pub fn nominal_duration(&self) -> Duration {
        self.steps
            .iter()
            .map(|step| match step {
                ScriptStep::Wait { duration_ms } => Duration::from_millis(*duration_ms),
                _ => Duration::ZERO,
            })
            .sum()
    }
}

/// 脚本执行器
pub struct ScriptRunner<'a> {
    satellite: &'a Satellite<MockLink>,
    speech: Sender<Vec<f32>>,
    running: Arc<AtomicBool>,
}

impl<'a> ScriptRunner<'a> {
    pub fn new(
        satellite: &'a Satellite<MockLink>,
        speech: Sender<Vec<f32>>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            satellite,
            speech,
            running,
        }
    }

    /// 执行一遍脚本；收到退出信号时提前返回
    pub fn run(&self, script: &Script) -> Result<()> {
        for (index, step) in script.steps.iter().enumerate() {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            self.execute(step)
                .with_context(|| format!("Step {} of '{}' failed", index + 1, script.name))?;
        }
        Ok(())
    }

    fn execute(&self, step: &ScriptStep) -> Result<()> {
        match step {
            ScriptStep::Event { event } => {
                let kind = event.kind();
                match self.satellite.dispatch(event.clone()) {
                    DispatchOutcome::State(change) => {
                        info!("{}: {} -> {}", kind, change.from, change.to)
                    },
                    DispatchOutcome::Lifecycle(report) => {
                        info!(
                            "{}: {} -> {} ({} services, {} failures)",
                            kind,
                            report.from,
                            report.to,
                            report.services_touched(),
                            report.failures.len()
                        );
                    },
                    DispatchOutcome::Ignored => {
                        info!("{} ignored in state {}", kind, self.satellite.state())
                    },
                }
            },
            ScriptStep::Speak { duration_ms } => {
                let sample_rate = self.satellite.config().io.sample_rate_hz;
                let chunk = self.satellite.config().io.playback_chunk.max(1);
                let speech = synthetic_speech(Duration::from_millis(*duration_ms), sample_rate);
                for segment in speech.chunks(chunk * 8) {
                    self.speech
                        .send(segment.to_vec())
                        .context("Playback source closed")?;
                }
            },
            ScriptStep::Move { name, priority } => {
                if let Err(e) = self.satellite.request_move(name, *priority) {
                    warn!("Move '{}' rejected: {}", name, e);
                }
            },
            ScriptStep::Action { name } => {
                if let Err(e) = self.satellite.request_action(name) {
                    warn!("Action '{}' rejected: {}", name, e);
                }
            },
            ScriptStep::Wait { duration_ms } => {
                self.wait(Duration::from_millis(*duration_ms));
            },
        }
        Ok(())
    }

    fn wait(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while self.running.load(Ordering::SeqCst) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }
}
