//! Measurement-related code for the planar tracker.
//!
//! This module defines the raw sensor reading types that arrive from the measurement
//! source, plus the generic [`MeasurementModel`] trait and its lidar and radar
//! implementations. The lidar model is fully linear (a fixed projection onto the position
//! components); the radar model is nonlinear in the state and carries its own
//! linearization, innovation wrapping, and degeneracy rules.

use std::fmt::{self, Display};

use nalgebra::{DMatrix, DVector};

use crate::linearize::radar_jacobian;
use crate::{STATE_SIZE, wrap_to_pi};

/// Range floor used in the radar forward model before the range-rate division.
///
/// Clamping trades a bounded bias very close to the origin for never dividing by zero.
pub const MIN_RANGE: f64 = 1e-4;

/// Default lidar per-axis position noise standard deviation (m).
pub const LIDAR_POSITION_STD: f64 = 0.15;
/// Default radar range noise standard deviation (m).
pub const RADAR_RANGE_STD: f64 = 0.3;
/// Default radar bearing noise standard deviation (rad).
pub const RADAR_BEARING_STD: f64 = 0.03;
/// Default radar range-rate noise standard deviation (m/s).
pub const RADAR_RANGE_RATE_STD: f64 = 0.3;

/// Raw sensor payload, discriminated by the producing sensor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RawMeasurement {
    /// Direct position reading: x and y in meters.
    Lidar { x: f64, y: f64 },
    /// Polar reading: range (m), bearing (rad, from the +x axis), range rate (m/s).
    Radar {
        range: f64,
        bearing: f64,
        range_rate: f64,
    },
}

/// One timestamped reading from the measurement source.
///
/// Timestamps are integer microseconds and are intended to be non-decreasing across the
/// stream; the tracker does not validate or enforce this.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SensorReading {
    pub timestamp_us: i64,
    pub measurement: RawMeasurement,
}

impl Display for SensorReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.measurement {
            RawMeasurement::Lidar { x, y } => {
                write!(f, "Lidar(t: {} us, x: {}, y: {})", self.timestamp_us, x, y)
            }
            RawMeasurement::Radar {
                range,
                bearing,
                range_rate,
            } => write!(
                f,
                "Radar(t: {} us, rho: {}, theta: {}, rhodot: {})",
                self.timestamp_us, range, bearing, range_rate
            ),
        }
    }
}

/// Generic measurement model trait for the filter core.
///
/// A model bundles everything one update needs: the raw measurement vector, the noise
/// covariance, the expected measurement as a function of the state, and the measurement
/// matrix (or Jacobian, for nonlinear models) evaluated at the state. The noise and
/// matrix returned always belong to the same sensor as the measurement vector, so an
/// update can never mix models from different sensors.
pub trait MeasurementModel {
    /// Dimension of the measurement vector.
    fn dimension(&self) -> usize;
    /// The measurement in vector format.
    fn vector(&self) -> DVector<f64>;
    /// The measurement noise covariance.
    fn noise(&self) -> DMatrix<f64>;
    /// Expected measurement from the state: the measurement function h(x).
    fn expected_measurement(&self, state: &DVector<f64>) -> DVector<f64>;
    /// Measurement matrix mapping state space to measurement space, evaluated at `state`.
    /// Constant for linear models; a freshly linearized Jacobian for nonlinear ones.
    fn measurement_matrix(&self, state: &DVector<f64>) -> DMatrix<f64>;
    /// Normalize an innovation component-wise. The default is the identity; circular
    /// components (angles) override this to wrap into (−π, π].
    fn normalize_innovation(&self, innovation: DVector<f64>) -> DVector<f64> {
        innovation
    }
    /// True when the measurement function is undefined at `state` and the update must be
    /// skipped entirely. Defaults to false.
    fn is_degenerate_at(&self, _state: &DVector<f64>) -> bool {
        false
    }
}

/// Direct-position (lidar) measurement model.
///
/// Linear: the measurement matrix is the fixed 2×4 projection onto the position
/// components and never depends on the state.
#[derive(Clone, Copy, Debug)]
pub struct LidarMeasurement {
    pub x: f64,
    pub y: f64,
    pub position_noise_std: f64,
}

impl LidarMeasurement {
    pub fn new(x: f64, y: f64) -> Self {
        LidarMeasurement {
            x,
            y,
            position_noise_std: LIDAR_POSITION_STD,
        }
    }
}

impl Display for LidarMeasurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LidarMeasurement(x: {}, y: {}, noise_std: {})",
            self.x, self.y, self.position_noise_std
        )
    }
}

impl MeasurementModel for LidarMeasurement {
    fn dimension(&self) -> usize {
        2
    }
    fn vector(&self) -> DVector<f64> {
        DVector::from_vec(vec![self.x, self.y])
    }
    fn noise(&self) -> DMatrix<f64> {
        DMatrix::from_diagonal(&DVector::from_vec(vec![
            self.position_noise_std.powi(2),
            self.position_noise_std.powi(2),
        ]))
    }
    fn expected_measurement(&self, state: &DVector<f64>) -> DVector<f64> {
        assert_eq!(state.len(), STATE_SIZE, "lidar model expects a 4-state");
        DVector::from_vec(vec![state[0], state[1]])
    }
    fn measurement_matrix(&self, _state: &DVector<f64>) -> DMatrix<f64> {
        DMatrix::from_row_slice(2, STATE_SIZE, &[1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0])
    }
}

/// Range/bearing/range-rate (radar) measurement model.
///
/// Nonlinear: the expected measurement is the polar forward model evaluated at the
/// current mean and the measurement matrix is the Jacobian linearized there, so both must
/// be recomputed every cycle. The bearing innovation is circular and is wrapped into
/// (−π, π]; a state with both position components exactly zero has no defined bearing and
/// marks the update degenerate (a no-op).
#[derive(Clone, Copy, Debug)]
pub struct RadarMeasurement {
    pub range: f64,
    pub bearing: f64,
    pub range_rate: f64,
    pub range_noise_std: f64,
    pub bearing_noise_std: f64,
    pub range_rate_noise_std: f64,
}

impl RadarMeasurement {
    pub fn new(range: f64, bearing: f64, range_rate: f64) -> Self {
        RadarMeasurement {
            range,
            bearing,
            range_rate,
            range_noise_std: RADAR_RANGE_STD,
            bearing_noise_std: RADAR_BEARING_STD,
            range_rate_noise_std: RADAR_RANGE_RATE_STD,
        }
    }

    /// Convert the polar reading to a Cartesian state via trigonometric projection.
    ///
    /// Used to seed the filter from a first radar reading. The range rate only carries
    /// the radial velocity component, so the projected velocity is exact only when the
    /// true velocity is radial; that is the best a single polar reading can do.
    pub fn to_cartesian_state(&self) -> DVector<f64> {
        let (sin_b, cos_b) = self.bearing.sin_cos();
        DVector::from_vec(vec![
            self.range * cos_b,
            self.range * sin_b,
            self.range_rate * cos_b,
            self.range_rate * sin_b,
        ])
    }
}

impl Display for RadarMeasurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RadarMeasurement(rho: {}, theta: {}, rhodot: {})",
            self.range, self.bearing, self.range_rate
        )
    }
}

impl MeasurementModel for RadarMeasurement {
    fn dimension(&self) -> usize {
        3
    }
    fn vector(&self) -> DVector<f64> {
        DVector::from_vec(vec![self.range, self.bearing, self.range_rate])
    }
    fn noise(&self) -> DMatrix<f64> {
        DMatrix::from_diagonal(&DVector::from_vec(vec![
            self.range_noise_std.powi(2),
            self.bearing_noise_std.powi(2),
            self.range_rate_noise_std.powi(2),
        ]))
    }
    fn expected_measurement(&self, state: &DVector<f64>) -> DVector<f64> {
        assert_eq!(state.len(), STATE_SIZE, "radar model expects a 4-state");
        let (px, py, vx, vy) = (state[0], state[1], state[2], state[3]);

        let mut rho = (px * px + py * py).sqrt();
        let theta = py.atan2(px);
        if rho < MIN_RANGE {
            rho = MIN_RANGE;
        }
        let rhodot = (px * vx + py * vy) / rho;

        DVector::from_vec(vec![rho, theta, rhodot])
    }
    fn measurement_matrix(&self, state: &DVector<f64>) -> DMatrix<f64> {
        radar_jacobian(state)
    }
    fn normalize_innovation(&self, mut innovation: DVector<f64>) -> DVector<f64> {
        innovation[1] = wrap_to_pi(innovation[1]);
        innovation
    }
    fn is_degenerate_at(&self, state: &DVector<f64>) -> bool {
        state[0] == 0.0 && state[1] == 0.0
    }
}
