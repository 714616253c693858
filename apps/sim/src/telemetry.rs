//! 周期性遥测日志

use crate::collaborators::SimStats;
use anyhow::{Context, Result};
use satellite_sdk::link::{Caller, MockLink, MockLinkProbe};
use satellite_sdk::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub fn spawn(
    observer: Observer<MockLink>,
    probe: MockLinkProbe,
    stats: Arc<SimStats>,
    interval: Duration,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("sim-telemetry".into())
        .spawn(move || {
            let mut last_report = Instant::now();
            let mut poses_total = 0usize;
            while running.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(100));
                if last_report.elapsed() < interval {
                    continue;
                }
                last_report = Instant::now();

                // 模拟链路会保存所有位姿，定期清空
                let poses = probe.pose_count();
                probe.clear_poses();
                poses_total += poses;
                report(&observer, &stats, poses, poses_total);
            }
        })
        .context("Failed to spawn telemetry thread")
}

fn report(observer: &Observer<MockLink>, stats: &SimStats, poses: usize, poses_total: usize) {
    let motion = observer.motion_metrics();
    let arbiter = observer.arbiter_metrics();
    let capture = arbiter.get(Caller::AudioCapture);

    let pose = observer
        .pose()
        .map(|p| {
            format!(
                "pitch={:+.1} yaw={:+.1} body={:+.1} z={:+.1} ant=({:+.0},{:+.0})",
                p.pitch_deg,
                p.yaw_deg,
                p.body_yaw_deg,
                p.z_mm,
                p.antenna_left_deg,
                p.antenna_right_deg
            )
        })
        .unwrap_or_else(|| "none".to_string());

    info!(
        "[{}] pose {} | {} poses sent ({} total), drop rate {:.1}%",
        observer.state(),
        pose,
        poses,
        poses_total,
        motion.drop_rate()
    );
    info!(
        "  mic {:.1} dBFS, {} samples, capture timeouts {} / flushes {} | frames {} | \
         actions {}/{} suppressed | moves {} started, {} preempted",
        stats.mic_dbfs(),
        stats.mic_samples.load(Ordering::Relaxed),
        capture.timeouts,
        capture.flushes,
        stats.frames.load(Ordering::Relaxed),
        motion.actions_executed,
        motion.actions_suppressed,
        motion.moves_started,
        motion.moves_preempted
    );

    let health = observer.health();
    if health.is_degraded() {
        warn!(
            "  degraded: contention={} link_lost={} failed_services={:?}",
            health.contention_degraded,
            health.link_lost,
            health
                .failed_services
                .iter()
                .map(|f| f.service.as_str())
                .collect::<Vec<_>>()
        );
    }
}

/// 退出前的汇总
pub fn summary(observer: &Observer<MockLink>, stats: &SimStats, elapsed: Duration) {
    let motion = observer.motion_metrics();
    let arbiter = observer.arbiter_metrics();
    info!("Simulation finished after {:.1}s", elapsed.as_secs_f64());
    info!(
        "  motion: {} ticks ({} idle), {} poses, {} dropped, {} rejected, {} time jumps",
        motion.ticks,
        motion.idle_ticks,
        motion.poses_sent,
        motion.dropped_timeouts,
        motion.rejected,
        motion.time_jumps
    );
    for caller in Caller::ALL {
        let snapshot = arbiter.get(caller);
        info!(
            "  {:<14} {} acquisitions ({} blocking), {} timeouts ({:.2}%), {} flushes / {} items",
            caller.as_str(),
            snapshot.acquisitions,
            snapshot.blocking_acquisitions,
            snapshot.timeouts,
            snapshot.timeout_rate(),
            snapshot.flushes,
            snapshot.flushed_items
        );
    }
    let holds = stats.contention_holds.load(Ordering::Relaxed);
    if holds > 0 {
        info!("  injected contention: {} holds", holds);
    }
}
