//! # Satellite Sim
//!
//! 在模拟硬件链路上运行完整的 satellite 核心：100Hz 控制循环、音频采集 / 播放、视觉，
//! 按脚本投递对话和生命周期事件，并周期性输出遥测。
//!
//! ```bash
//! # 内置对话脚本，循环直到 Ctrl+C
//! satellite-sim
//!
//! # 注入链路竞争，观察非对话期间的超时与清空
//! RUST_LOG=debug satellite-sim --contention-hold-ms 8 --loops 1
//!
//! # 自定义配置和脚本
//! satellite-sim --config satellite.toml --script my_script.json
//! ```

mod collaborators;
mod script;
mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;
use collaborators::SimStats;
use satellite_sdk::link::MockLink;
use satellite_sdk::prelude::*;
use script::{Script, ScriptRunner};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Satellite 模拟器
#[derive(Parser, Debug)]
#[command(name = "satellite-sim")]
#[command(about = "Run the satellite core against a simulated hardware link", long_about = None)]
#[command(version)]
struct Args {
    /// 配置文件（TOML）
    ///
    /// 默认: 内置默认配置
    #[arg(long)]
    config: Option<PathBuf>,

    /// 事件脚本（JSON）
    ///
    /// 默认: 内置对话脚本
    #[arg(long)]
    script: Option<PathBuf>,

    /// 脚本循环次数（0 表示直到 Ctrl+C）
    #[arg(long, default_value = "0")]
    loops: u32,

    /// 初始状态
    #[arg(long, default_value = "idle")]
    initial_state: RobotState,

    /// 每次链路操作的模拟耗时（微秒）
    #[arg(long, default_value = "200")]
    op_delay_us: u64,

    /// 链路操作的随机抖动上限（微秒）
    #[arg(long, default_value = "300")]
    jitter_us: u64,

    /// 注入竞争：干扰线程每次占用链路的时长（毫秒，0 表示不注入）
    #[arg(long, default_value = "0")]
    contention_hold_ms: u64,

    /// 遥测日志间隔（秒）
    #[arg(long, default_value = "2")]
    telemetry_secs: u64,
}

fn main() -> Result<()> {
    satellite_sdk::init_logger();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => SatelliteConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => SatelliteConfig::default(),
    };
    let script = match &args.script {
        Some(path) => Script::load(path)?,
        None => Script::builtin()?,
    };
    info!(
        "Loaded script '{}' ({} steps, ~{:.0}s per pass): {}",
        script.name,
        script.steps.len(),
        script.nominal_duration().as_secs_f64(),
        script.description
    );

    // Ctrl+C 优雅退出
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            eprintln!("\nReceived interrupt signal. Shutting down...");
            running.store(false, Ordering::SeqCst);
        })
        .context("Failed to set Ctrl+C handler")?;
    }

    let link = MockLink::new()
        .with_op_delay(Duration::from_micros(args.op_delay_us))
        .with_jitter(Duration::from_micros(args.jitter_us));
    let probe = link.probe();
    let stats = Arc::new(SimStats::new());
    let (speech, speech_source) = playback_channel(256);

    let satellite = SatelliteBuilder::new()
        .config(config)
        .initial_state(args.initial_state)
        .capture_sink(collaborators::microphone(stats.clone()))
        .playback_source(speech_source)
        .frame_sink(collaborators::face_tracker(stats.clone()))
        .build(link)
        .context("Failed to start satellite core")?;

    let contention = (args.contention_hold_ms > 0)
        .then(|| {
            collaborators::spawn_contention(
                satellite.arbiter().clone(),
                Duration::from_millis(args.contention_hold_ms),
                stats.clone(),
                running.clone(),
            )
        })
        .transpose()?;
    let telemetry = telemetry::spawn(
        satellite.observer(),
        probe,
        stats.clone(),
        Duration::from_secs(args.telemetry_secs.max(1)),
        running.clone(),
    )?;

    let started = Instant::now();
    let runner = ScriptRunner::new(&satellite, speech, running.clone());
    let mut pass = 0;
    let outcome = loop {
        if !running.load(Ordering::SeqCst) || (args.loops > 0 && pass >= args.loops) {
            break Ok(());
        }
        pass += 1;
        info!("Script '{}' pass {}", script.name, pass);
        if let Err(e) = runner.run(&script) {
            break Err(e);
        }
    };

    running.store(false, Ordering::SeqCst);
    for (name, handle) in [("contention", contention), ("telemetry", Some(telemetry))] {
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            warn!("{} thread panicked", name);
        }
    }

    telemetry::summary(&satellite.observer(), &stats, started.elapsed());
    satellite.shutdown();
    outcome
}
