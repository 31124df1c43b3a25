//! Simulation utilities, CSV dataset loading, and accuracy metrics.
//!
//! This module provides:
//! - [`MeasurementRecord`] for reading and writing sensor/ground-truth datasets as CSV
//! - [`EstimateRecord`] for exporting per-step tracker output
//! - [`calculate_rmse`] for offline accuracy evaluation against ground truth
//! - [`generate_scenario`] for building seeded synthetic datasets
//! - [`run_tracker`] for running the fusion loop over a whole dataset

use nalgebra::DVector;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::Path;

use crate::fusion::TrackFusion;
use crate::measurements::{
    LIDAR_POSITION_STD, RADAR_BEARING_STD, RADAR_RANGE_RATE_STD, RADAR_RANGE_STD,
    RawMeasurement, SensorReading,
};
use crate::wrap_to_pi;

/// One row of a tracking dataset: a sensor reading plus the ground-truth state at the
/// same instant.
///
/// The `sensor` column is `"L"` for lidar rows (`m1` = x, `m2` = y, `m3` empty) and
/// `"R"` for radar rows (`m1` = range, `m2` = bearing, `m3` = range rate).
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MeasurementRecord {
    /// Sensor tag: "L" or "R".
    pub sensor: String,
    /// First raw measurement component.
    pub m1: f64,
    /// Second raw measurement component.
    pub m2: f64,
    /// Third raw measurement component; absent for lidar rows.
    pub m3: Option<f64>,
    /// Reading timestamp in microseconds.
    pub timestamp_us: i64,
    /// Ground-truth x position (m).
    pub gt_px: f64,
    /// Ground-truth y position (m).
    pub gt_py: f64,
    /// Ground-truth x velocity (m/s).
    pub gt_vx: f64,
    /// Ground-truth y velocity (m/s).
    pub gt_vy: f64,
}

impl MeasurementRecord {
    /// Reads a CSV file and returns a vector of records.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Self>, Box<dyn Error>> {
        let mut rdr = csv::Reader::from_path(path)?;
        let mut records = Vec::new();
        for result in rdr.deserialize() {
            let record: Self = result?;
            records.push(record);
        }
        Ok(records)
    }

    /// Writes records to a CSV file, creating or overwriting it.
    pub fn to_csv<P: AsRef<Path>>(records: &[Self], path: P) -> Result<(), Box<dyn Error>> {
        let mut wtr = csv::Writer::from_path(path)?;
        for record in records {
            wtr.serialize(record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// The sensor reading carried by this row.
    pub fn reading(&self) -> Result<SensorReading, Box<dyn Error>> {
        let measurement = match self.sensor.as_str() {
            "L" => RawMeasurement::Lidar {
                x: self.m1,
                y: self.m2,
            },
            "R" => RawMeasurement::Radar {
                range: self.m1,
                bearing: self.m2,
                range_rate: self
                    .m3
                    .ok_or("radar record is missing the range-rate column")?,
            },
            other => return Err(format!("unknown sensor tag: {other}").into()),
        };
        Ok(SensorReading {
            timestamp_us: self.timestamp_us,
            measurement,
        })
    }

    /// The ground-truth state `[px, py, vx, vy]` carried by this row.
    pub fn ground_truth(&self) -> DVector<f64> {
        DVector::from_vec(vec![self.gt_px, self.gt_py, self.gt_vx, self.gt_vy])
    }
}

/// One row of tracker output: the estimate and covariance diagonal after a reading.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EstimateRecord {
    pub timestamp_us: i64,
    pub px: f64,
    pub py: f64,
    pub vx: f64,
    pub vy: f64,
    pub var_px: f64,
    pub var_py: f64,
    pub var_vx: f64,
    pub var_vy: f64,
}

impl EstimateRecord {
    pub fn from_fusion(timestamp_us: i64, fusion: &TrackFusion) -> Self {
        let state = fusion.state();
        let cov = fusion.covariance();
        EstimateRecord {
            timestamp_us,
            px: state[0],
            py: state[1],
            vx: state[2],
            vy: state[3],
            var_px: cov[(0, 0)],
            var_py: cov[(1, 1)],
            var_vx: cov[(2, 2)],
            var_vy: cov[(3, 3)],
        }
    }

    /// Writes records to a CSV file, creating or overwriting it.
    pub fn to_csv<P: AsRef<Path>>(records: &[Self], path: P) -> Result<(), Box<dyn Error>> {
        let mut wtr = csv::Writer::from_path(path)?;
        for record in records {
            wtr.serialize(record)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Element-wise root-mean-square error between parallel estimate and ground-truth
/// sequences.
///
/// Offline validation only; not part of the filtering loop.
///
/// # Panics
/// Panics if the sequences are empty, have different lengths, or hold vectors of
/// differing dimensions.
pub fn calculate_rmse(estimates: &[DVector<f64>], ground_truth: &[DVector<f64>]) -> DVector<f64> {
    assert!(!estimates.is_empty(), "calculate_rmse: empty sequences");
    assert_eq!(
        estimates.len(),
        ground_truth.len(),
        "calculate_rmse: sequence lengths differ"
    );

    let dim = estimates[0].len();
    let mut accumulated = DVector::<f64>::zeros(dim);
    for (estimate, truth) in estimates.iter().zip(ground_truth.iter()) {
        assert_eq!(estimate.len(), dim, "calculate_rmse: vector dimensions differ");
        assert_eq!(truth.len(), dim, "calculate_rmse: vector dimensions differ");
        let residual = estimate - truth;
        accumulated += residual.component_mul(&residual);
    }
    (accumulated / estimates.len() as f64).map(f64::sqrt)
}

/// Result of running the tracker over a dataset.
#[derive(Debug, Clone)]
pub struct TrackerRun {
    /// Per-reading state estimates.
    pub estimates: Vec<DVector<f64>>,
    /// Per-reading output rows (estimate plus covariance diagonal).
    pub records: Vec<EstimateRecord>,
    /// Element-wise RMSE of the estimates against ground truth.
    pub rmse: DVector<f64>,
}

/// Run a fresh [`TrackFusion`] over a whole dataset, one reading at a time.
pub fn run_tracker(records: &[MeasurementRecord]) -> Result<TrackerRun, Box<dyn Error>> {
    let mut fusion = TrackFusion::default();
    let mut estimates = Vec::with_capacity(records.len());
    let mut truths = Vec::with_capacity(records.len());
    let mut outputs = Vec::with_capacity(records.len());

    for record in records {
        let reading = record.reading()?;
        fusion.process(&reading);
        estimates.push(fusion.state().clone());
        truths.push(record.ground_truth());
        outputs.push(EstimateRecord::from_fusion(reading.timestamp_us, &fusion));
    }

    let rmse = calculate_rmse(&estimates, &truths);
    Ok(TrackerRun {
        estimates,
        records: outputs,
        rmse,
    })
}

/// Generate a seeded synthetic dataset: constant-velocity ground truth sampled at a
/// fixed interval, with lidar and radar readings alternating and Gaussian noise drawn
/// from the stock sensor standard deviations.
///
/// The truth starts at (5, 2) m with velocity (0.8, −0.4) m/s, well away from the
/// radar-degenerate origin. The same seed always reproduces the same dataset.
pub fn generate_scenario(seed: u64, steps: usize, interval_us: i64) -> Vec<MeasurementRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let lidar_noise = Normal::new(0.0, LIDAR_POSITION_STD).unwrap();
    let range_noise = Normal::new(0.0, RADAR_RANGE_STD).unwrap();
    let bearing_noise = Normal::new(0.0, RADAR_BEARING_STD).unwrap();
    let range_rate_noise = Normal::new(0.0, RADAR_RANGE_RATE_STD).unwrap();

    let (px0, py0, vx, vy) = (5.0, 2.0, 0.8, -0.4);
    let mut records = Vec::with_capacity(steps);
    for step in 0..steps {
        let timestamp_us = step as i64 * interval_us;
        let t = timestamp_us as f64 / crate::fusion::MICROSECONDS_PER_SECOND;
        let px = px0 + vx * t;
        let py = py0 + vy * t;

        let record = if step % 2 == 0 {
            MeasurementRecord {
                sensor: "L".to_string(),
                m1: px + lidar_noise.sample(&mut rng),
                m2: py + lidar_noise.sample(&mut rng),
                m3: None,
                timestamp_us,
                gt_px: px,
                gt_py: py,
                gt_vx: vx,
                gt_vy: vy,
            }
        } else {
            let range = (px * px + py * py).sqrt();
            let bearing = py.atan2(px);
            let range_rate = (px * vx + py * vy) / range;
            MeasurementRecord {
                sensor: "R".to_string(),
                m1: (range + range_noise.sample(&mut rng)).max(0.0),
                m2: wrap_to_pi(bearing + bearing_noise.sample(&mut rng)),
                m3: Some(range_rate + range_rate_noise.sample(&mut rng)),
                timestamp_us,
                gt_px: px,
                gt_py: py,
                gt_vx: vx,
                gt_vy: vy,
            }
        };
        records.push(record);
    }
    records
}
