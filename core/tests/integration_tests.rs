//! End-to-end integration tests for the lidar/radar fusion tracker.
//!
//! These tests drive the public API the way the surrounding application would: one
//! timestamped reading at a time through [`TrackFusion`], checking initialization
//! behavior, cross-sensor cycles, and closed-loop accuracy on synthetic datasets.
//!
//! The RMSE bounds asserted here are not theoretical limits; they are empirical
//! regression checks for the stock noise configuration on the seeded scenarios, loose
//! enough to tolerate floating-point drift but tight enough to catch a broken update
//! path (a wrong sign or transpose typically inflates them by an order of magnitude).

use assert_approx_eq::assert_approx_eq;
use nalgebra::DVector;

use fusiontrack::fusion::{FusionConfig, TrackFusion};
use fusiontrack::kalman::UpdateOutcome;
use fusiontrack::measurements::{RawMeasurement, SensorReading};
use fusiontrack::sim::{MeasurementRecord, calculate_rmse, generate_scenario, run_tracker};

fn lidar(timestamp_us: i64, x: f64, y: f64) -> SensorReading {
    SensorReading {
        timestamp_us,
        measurement: RawMeasurement::Lidar { x, y },
    }
}

fn radar(timestamp_us: i64, range: f64, bearing: f64, range_rate: f64) -> SensorReading {
    SensorReading {
        timestamp_us,
        measurement: RawMeasurement::Radar {
            range,
            bearing,
            range_rate,
        },
    }
}

/// Scenario A: a single lidar reading initializes the state directly, with low position
/// uncertainty and high velocity uncertainty; no predict/update runs.
#[test]
fn scenario_a_lidar_initialization() {
    let mut fusion = TrackFusion::default();
    fusion.process(&lidar(0, 3.0, 4.0));

    let state = fusion.state();
    assert_approx_eq!(state[0], 3.0, 1e-15);
    assert_approx_eq!(state[1], 4.0, 1e-15);
    assert_approx_eq!(state[2], 0.0, 1e-15);
    assert_approx_eq!(state[3], 0.0, 1e-15);

    let cov = fusion.covariance();
    assert_approx_eq!(cov[(0, 0)], 1.0, 1e-15);
    assert_approx_eq!(cov[(1, 1)], 1.0, 1e-15);
    assert_approx_eq!(cov[(2, 2)], 1000.0, 1e-15);
    assert_approx_eq!(cov[(3, 3)], 1000.0, 1e-15);
}

/// Scenario B: a second lidar reading 0.1 s later pulls the position toward it and the
/// inferred velocity positive on both axes.
#[test]
fn scenario_b_second_lidar_reading_infers_velocity() {
    let mut fusion = TrackFusion::default();
    fusion.process(&lidar(0, 3.0, 4.0));
    let outcome = fusion.process(&lidar(100_000, 3.1, 4.1));
    assert_eq!(outcome, UpdateOutcome::Applied);

    let state = fusion.state();
    assert!(state[0] > 3.0 && state[0] <= 3.1, "px = {}", state[0]);
    assert!(state[1] > 4.0 && state[1] <= 4.1, "py = {}", state[1]);
    assert!(state[2] > 0.0, "vx = {}", state[2]);
    assert!(state[3] > 0.0, "vy = {}", state[3]);
}

/// Scenario C: a first radar reading at zero bearing seeds the state exactly from the
/// polar projection.
#[test]
fn scenario_c_radar_initialization() {
    let mut fusion = TrackFusion::default();
    fusion.process(&radar(0, 5.0, 0.0, 1.0));

    let state = fusion.state();
    assert_approx_eq!(state[0], 5.0, 1e-15);
    assert_approx_eq!(state[1], 0.0, 1e-15);
    assert_approx_eq!(state[2], 1.0, 1e-15);
    assert_approx_eq!(state[3], 0.0, 1e-15);
}

/// Alternating lidar and radar readings on a constant-velocity object keep the estimate
/// close to truth and the velocity estimate converges from the uninformed start.
#[test]
fn mixed_sensor_closed_loop_tracks_truth() {
    let mut fusion = TrackFusion::default();
    let (px0, py0, vx, vy) = (5.0, 2.0, 0.8, -0.4);

    for step in 0..60i64 {
        let t = step as f64 * 0.1;
        let (px, py) = (px0 + vx * t, py0 + vy * t);
        let timestamp_us = step * 100_000;
        // Noise-free readings: the estimate should lock on tightly.
        let reading = if step % 2 == 0 {
            lidar(timestamp_us, px, py)
        } else {
            let range = (px * px + py * py).sqrt();
            radar(timestamp_us, range, py.atan2(px), (px * vx + py * vy) / range)
        };
        let outcome = fusion.process(&reading);
        assert_eq!(outcome, UpdateOutcome::Applied);
    }

    let t_final = 59.0 * 0.1;
    let state = fusion.state();
    assert_approx_eq!(state[0], px0 + vx * t_final, 0.05);
    assert_approx_eq!(state[1], py0 + vy * t_final, 0.05);
    assert_approx_eq!(state[2], vx, 0.1);
    assert_approx_eq!(state[3], vy, 0.1);
}

/// Closed-loop regression bound on a seeded noisy dataset.
#[test]
fn synthetic_dataset_rmse_regression() {
    let records = generate_scenario(42, 200, 100_000);
    let run = run_tracker(&records).expect("tracker run should succeed");

    assert_eq!(run.estimates.len(), 200);
    assert!(run.rmse[0] < 0.35, "px rmse regressed: {}", run.rmse[0]);
    assert!(run.rmse[1] < 0.35, "py rmse regressed: {}", run.rmse[1]);
    assert!(run.rmse[2] < 1.5, "vx rmse regressed: {}", run.rmse[2]);
    assert!(run.rmse[3] < 1.5, "vy rmse regressed: {}", run.rmse[3]);

    // Every estimate stays finite; a sign or transpose error here diverges fast.
    for estimate in &run.estimates {
        assert!(estimate.iter().all(|v| v.is_finite()));
    }
}

/// A radar-only stream still converges: the extended path alone carries the track.
#[test]
fn radar_only_stream_stays_bounded() {
    let mut fusion = TrackFusion::default();
    let (px0, py0, vx, vy) = (6.0, -3.0, -0.5, 0.3);

    let mut estimates = Vec::new();
    let mut truths = Vec::new();
    for step in 0..80i64 {
        let t = step as f64 * 0.1;
        let (px, py) = (px0 + vx * t, py0 + vy * t);
        let range = (px * px + py * py).sqrt();
        fusion.process(&radar(
            step * 100_000,
            range,
            py.atan2(px),
            (px * vx + py * vy) / range,
        ));
        estimates.push(fusion.state().clone());
        truths.push(DVector::from_vec(vec![px, py, vx, vy]));
    }

    let rmse = calculate_rmse(&estimates, &truths);
    assert!(rmse[0] < 0.5, "px rmse: {}", rmse[0]);
    assert!(rmse[1] < 0.5, "py rmse: {}", rmse[1]);
}

/// The dataset CSV round-trips exactly and feeds the same tracker result.
#[test]
fn dataset_csv_round_trip_preserves_run() {
    let records = generate_scenario(9, 40, 100_000);
    let path = std::env::temp_dir().join("fusiontrack_integration_dataset.csv");
    MeasurementRecord::to_csv(&records, &path).expect("write dataset");
    let loaded = MeasurementRecord::from_csv(&path).expect("read dataset");
    let _ = std::fs::remove_file(&path);

    assert_eq!(records, loaded);
    let run_a = run_tracker(&records).expect("run on originals");
    let run_b = run_tracker(&loaded).expect("run on loaded");
    for i in 0..4 {
        assert_approx_eq!(run_a.rmse[i], run_b.rmse[i], 1e-12);
    }
}

/// A custom noise configuration flows through to the update weighting: with a much less
/// trusted lidar, the same measurement moves the state less.
#[test]
fn config_noise_weighting_changes_update() {
    let mut trusted = TrackFusion::default();
    let mut distrusted = TrackFusion::new(FusionConfig {
        lidar_position_std: 5.0,
        ..FusionConfig::default()
    });

    for fusion in [&mut trusted, &mut distrusted] {
        fusion.process(&lidar(0, 1.0, 1.0));
        fusion.process(&lidar(100_000, 2.0, 2.0));
    }

    let pull_trusted = trusted.state()[0] - 1.0;
    let pull_distrusted = distrusted.state()[0] - 1.0;
    assert!(
        pull_trusted > pull_distrusted,
        "trusted {pull_trusted} vs distrusted {pull_distrusted}"
    );
}
