//! 动画场景测试
//!
//! 通过完整控制循环验证动作冷却、Move 抢占与排队、呼吸周期，
//! 以及语音摆动包络对响度输入的响应。

use satellite_sdk::link::MockLink;
use satellite_sdk::motion::SpeechSway;
use satellite_sdk::prelude::*;
use satellite_sdk::runtime::dbfs;
use serial_test::serial;
use std::f32::consts::TAU;
use std::thread;
use std::time::Duration;

/// 生成整数个周期的正弦块（RMS 精确等于 `amplitude / √2`）
fn sine_chunk(amplitude: f32) -> Vec<f32> {
    const LEN: usize = 160;
    (0..LEN)
        .map(|n| amplitude * (TAU * 4.0 * n as f32 / LEN as f32).sin())
        .collect()
}

/// 从上升过零点（线性插值）计算的时刻
fn rising_crossings(samples: &[(f64, f64)]) -> Vec<f64> {
    samples
        .windows(2)
        .filter(|w| w[0].1 < 0.0 && w[1].1 >= 0.0)
        .map(|w| {
            let (t0, v0) = w[0];
            let (t1, v1) = w[1];
            t0 + (t1 - t0) * (-v0 / (v1 - v0))
        })
        .collect()
}

#[test]
#[serial]
fn test_repeated_action_is_suppressed_during_cooldown() {
    let satellite = SatelliteBuilder::new()
        .build(MockLink::new())
        .expect("build satellite");

    satellite.request_action("nod").expect("first nod");
    satellite.request_action("nod").expect("second nod");
    thread::sleep(Duration::from_millis(80));

    let metrics = satellite.observer().motion_metrics();
    assert_eq!(metrics.actions_executed, 1);
    assert_eq!(metrics.actions_suppressed, 1);

    assert!(matches!(
        satellite.request_action("backflip"),
        Err(MotionError::UnknownAction(_))
    ));
}

#[test]
#[serial]
fn test_high_priority_move_preempts_and_low_waits() {
    let satellite = SatelliteBuilder::new()
        .build(MockLink::new())
        .expect("build satellite");

    satellite.request_move("sad", MovePriority::Low).expect("sad");
    thread::sleep(Duration::from_millis(50));
    satellite.request_move("happy", MovePriority::High).expect("happy");
    satellite.request_move("curious", MovePriority::Low).expect("curious");
    thread::sleep(Duration::from_millis(50));

    let metrics = satellite.observer().motion_metrics();
    assert_eq!(metrics.moves_preempted, 1);
    assert_eq!(metrics.moves_started, 2);

    // happy 播放 1.6s 后 curious 接续
    thread::sleep(Duration::from_millis(1_800));
    let metrics = satellite.observer().motion_metrics();
    assert_eq!(metrics.moves_started, 3);
    assert_eq!(metrics.moves_preempted, 1);
}

#[test]
#[serial]
fn test_idle_breathing_period() {
    let link = MockLink::new();
    let probe = link.probe();
    let satellite = SatelliteBuilder::new().build(link).expect("build satellite");

    // 1s 回中 + 至少两个 2s 振荡周期
    thread::sleep(Duration::from_millis(5_600));
    satellite.shutdown();

    let samples: Vec<(f64, f64)> = probe
        .timed_poses()
        .into_iter()
        .map(|(at, pose)| (at.as_secs_f64(), pose.antenna_left_deg))
        .filter(|(t, _)| *t > 1.5)
        .collect();
    let peak = samples.iter().map(|(_, v)| v.abs()).fold(0.0, f64::max);
    assert!((peak - 15.0).abs() < 0.5, "antenna amplitude {}", peak);

    let crossings = rising_crossings(&samples);
    assert!(crossings.len() >= 2, "crossings: {:?}", crossings);
    for pair in crossings.windows(2) {
        let period = pair[1] - pair[0];
        println!("breathing period: {:.3}s", period);
        assert!((period - 2.0).abs() <= 0.1, "period {:.3}s", period);
    }
}

#[test]
fn test_sway_envelope_holds_between_thresholds() {
    let mut sway = SpeechSway::new(SatelliteConfig::default().sway);
    let loud = dbfs(&sine_chunk(0.0447));
    let medium = dbfs(&sine_chunk(0.01414));
    assert!((loud + 30.0).abs() < 0.1, "{}", loud);
    assert!((medium + 40.0).abs() < 0.1, "{}", medium);

    for _ in 0..100 {
        sway.advance(0.01, Some(loud));
    }
    assert!(sway.is_gate_open());
    assert!(sway.envelope() >= 0.95, "envelope {}", sway.envelope());

    // 落在关门限和开门限之间：门限保持打开
    for _ in 0..200 {
        sway.advance(0.01, Some(medium));
        assert!(sway.is_gate_open());
        assert!(sway.envelope() >= 0.95);
    }

    // 低于关门限后按 release 衰减
    let quiet = dbfs(&sine_chunk(0.001));
    for _ in 0..100 {
        sway.advance(0.01, Some(quiet));
    }
    assert!(!sway.is_gate_open());
    assert!(sway.envelope() < 0.2, "envelope {}", sway.envelope());
}
