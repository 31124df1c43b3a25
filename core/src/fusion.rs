//! Fusion manager: sensor-specific configuration and per-cycle orchestration.
//!
//! [`TrackFusion`] owns the per-sensor noise configuration and drives the filter core
//! one reading at a time. The first reading of any kind seeds the state; every
//! subsequent reading runs a predict with freshly built time-dependent matrices,
//! followed by the update path matching the reading's sensor.

use nalgebra::{DMatrix, DVector};

use crate::STATE_SIZE;
use crate::kalman::{KalmanFilter, UpdateOutcome};
use crate::measurements::{
    LIDAR_POSITION_STD, LidarMeasurement, RADAR_BEARING_STD, RADAR_RANGE_RATE_STD,
    RADAR_RANGE_STD, RadarMeasurement, RawMeasurement, SensorReading,
};

/// Microseconds per second; reading timestamps are integer microseconds.
pub const MICROSECONDS_PER_SECOND: f64 = 1_000_000.0;

/// Initial per-axis position variance. Position is observed directly by the first
/// reading, so the seed is near-certain.
pub const INITIAL_POSITION_VARIANCE: f64 = 1.0;
/// Initial per-axis velocity variance. Velocity is not observable from a single
/// reading, so the seed uncertainty is three orders of magnitude larger.
pub const INITIAL_VELOCITY_VARIANCE: f64 = 1000.0;

/// Default per-axis acceleration-noise intensity for the process model.
pub const DEFAULT_ACCELERATION_NOISE: f64 = 9.0;

/// Constant-velocity transition matrix for elapsed time `dt` (seconds).
///
/// Identity plus the position/velocity coupling terms, which equal `dt` exactly. An
/// elapsed time of zero yields the identity, which is accepted as a valid (no-motion)
/// cycle, not an error.
pub fn transition_matrix(dt: f64) -> DMatrix<f64> {
    let mut f = DMatrix::<f64>::identity(STATE_SIZE, STATE_SIZE);
    f[(0, 2)] = dt;
    f[(1, 3)] = dt;
    f
}

/// Process-noise covariance for elapsed time `dt` (seconds) and per-axis
/// acceleration-noise intensities.
///
/// Models unmodeled acceleration as zero-mean white noise; the entries are closed-form
/// polynomials in `dt` (degree up to four). The matrix depends on the current elapsed
/// time and must be rebuilt every cycle, never reused.
pub fn process_noise_matrix(dt: f64, noise_ax: f64, noise_ay: f64) -> DMatrix<f64> {
    let dt_2 = dt * dt;
    let dt_3 = dt_2 * dt;
    let dt_4 = dt_3 * dt;

    DMatrix::from_row_slice(
        STATE_SIZE,
        STATE_SIZE,
        &[
            dt_4 / 4.0 * noise_ax, 0.0,                   dt_3 / 2.0 * noise_ax, 0.0,
            0.0,                   dt_4 / 4.0 * noise_ay, 0.0,                   dt_3 / 2.0 * noise_ay,
            dt_3 / 2.0 * noise_ax, 0.0,                   dt_2 * noise_ax,       0.0,
            0.0,                   dt_3 / 2.0 * noise_ay, 0.0,                   dt_2 * noise_ay,
        ],
    )
}

/// Noise configuration for a [`TrackFusion`] instance.
///
/// Plain public fields; the defaults are the stock tuning for the reference sensor
/// suite.
#[derive(Clone, Copy, Debug)]
pub struct FusionConfig {
    /// Acceleration-noise intensity along x (process model).
    pub noise_ax: f64,
    /// Acceleration-noise intensity along y (process model).
    pub noise_ay: f64,
    /// Lidar per-axis position noise standard deviation (m).
    pub lidar_position_std: f64,
    /// Radar range noise standard deviation (m).
    pub radar_range_std: f64,
    /// Radar bearing noise standard deviation (rad).
    pub radar_bearing_std: f64,
    /// Radar range-rate noise standard deviation (m/s).
    pub radar_range_rate_std: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        FusionConfig {
            noise_ax: DEFAULT_ACCELERATION_NOISE,
            noise_ay: DEFAULT_ACCELERATION_NOISE,
            lidar_position_std: LIDAR_POSITION_STD,
            radar_range_std: RADAR_RANGE_STD,
            radar_bearing_std: RADAR_BEARING_STD,
            radar_range_rate_std: RADAR_RANGE_RATE_STD,
        }
    }
}

/// Sensor-fusion manager for a single tracked object.
///
/// Strictly sequential and single-threaded: each call to [`TrackFusion::process`] fully
/// handles one reading (initialize, or predict-then-update) before returning. Tracking
/// several independent objects takes one `TrackFusion` each; instances share no state.
#[derive(Clone, Debug)]
pub struct TrackFusion {
    filter: KalmanFilter,
    config: FusionConfig,
    previous_timestamp_us: i64,
}

impl Default for TrackFusion {
    fn default() -> Self {
        TrackFusion::new(FusionConfig::default())
    }
}

impl TrackFusion {
    pub fn new(config: FusionConfig) -> Self {
        TrackFusion {
            filter: KalmanFilter::new(),
            config,
            previous_timestamp_us: 0,
        }
    }

    /// Process one timestamped reading.
    ///
    /// The very first reading always initializes rather than running a predict/update
    /// cycle: a lidar reading seeds the position directly and zeroes the velocity (a
    /// single position fix carries no velocity information); a radar reading seeds both
    /// position and velocity via trigonometric projection. No reading is ever rejected
    /// for being out of order or duplicate-timestamped.
    pub fn process(&mut self, reading: &SensorReading) -> UpdateOutcome {
        if !self.filter.is_initialized() {
            self.initialize(reading);
            return UpdateOutcome::Applied;
        }

        let dt = (reading.timestamp_us - self.previous_timestamp_us) as f64
            / MICROSECONDS_PER_SECOND;
        self.previous_timestamp_us = reading.timestamp_us;

        let transition = transition_matrix(dt);
        let process_noise = process_noise_matrix(dt, self.config.noise_ax, self.config.noise_ay);
        self.filter.predict(&transition, &process_noise);

        let outcome = match reading.measurement {
            RawMeasurement::Lidar { x, y } => {
                let mut model = LidarMeasurement::new(x, y);
                model.position_noise_std = self.config.lidar_position_std;
                self.filter.update(&model)
            }
            RawMeasurement::Radar {
                range,
                bearing,
                range_rate,
            } => {
                // The model recomputes the Jacobian at the just-predicted mean inside
                // the update; nothing stale is carried between cycles.
                let mut model = RadarMeasurement::new(range, bearing, range_rate);
                model.range_noise_std = self.config.radar_range_std;
                model.bearing_noise_std = self.config.radar_bearing_std;
                model.range_rate_noise_std = self.config.radar_range_rate_std;
                self.filter.update(&model)
            }
        };
        if outcome == UpdateOutcome::SkippedSingular {
            eprintln!(
                "warning: singular innovation covariance at t={} us, update skipped",
                reading.timestamp_us
            );
        }
        outcome
    }

    fn initialize(&mut self, reading: &SensorReading) {
        let mean = match reading.measurement {
            RawMeasurement::Lidar { x, y } => DVector::from_vec(vec![x, y, 0.0, 0.0]),
            RawMeasurement::Radar {
                range,
                bearing,
                range_rate,
            } => RadarMeasurement::new(range, bearing, range_rate).to_cartesian_state(),
        };
        let covariance = DMatrix::from_diagonal(&DVector::from_vec(vec![
            INITIAL_POSITION_VARIANCE,
            INITIAL_POSITION_VARIANCE,
            INITIAL_VELOCITY_VARIANCE,
            INITIAL_VELOCITY_VARIANCE,
        ]));
        self.filter.initialize(mean, covariance);
        self.previous_timestamp_us = reading.timestamp_us;
    }

    pub fn is_initialized(&self) -> bool {
        self.filter.is_initialized()
    }

    /// The current estimate `[px, py, vx, vy]`. Empty until the first reading.
    pub fn state(&self) -> &DVector<f64> {
        self.filter.state()
    }

    /// The current state covariance. Empty until the first reading.
    pub fn covariance(&self) -> &DMatrix<f64> {
        self.filter.covariance()
    }
}
