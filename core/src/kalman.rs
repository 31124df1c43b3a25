//! Filter core: the recursive `{mean, covariance}` estimator.
//!
//! This module contains the sensor-agnostic half of the tracker. [`KalmanFilter`] owns
//! only the state mean and covariance; every matrix that varies with elapsed time (the
//! transition and process-noise matrices) or with the current linearization point (the
//! radar Jacobian) is rebuilt each cycle by the fusion layer and passed in explicitly.
//! Keeping those matrices out of the struct removes the staleness class of bugs where an
//! update silently reuses a prior cycle's linearization.
//!
//! # Mathematical background
//!
//! The predict step propagates the estimate through the (linear) transition model:
//!
//! $$
//! \begin{aligned}
//! x &\leftarrow F x \\\\
//! P &\leftarrow F P F^T + Q
//! \end{aligned}
//! $$
//!
//! The update step corrects it with a measurement `z` through a [`MeasurementModel`]:
//!
//! $$
//! \begin{aligned}
//! y &= z - h(x) \\\\
//! S &= H P H^T + R \\\\
//! K &= P H^T S^{-1} \\\\
//! x &\leftarrow x + K y \\\\
//! P &\leftarrow (I - K H) P
//! \end{aligned}
//! $$
//!
//! For a linear model `h(x) = H x` and this is the canonical Kalman correction; for a
//! nonlinear model `h` is the forward measurement function and `H` its Jacobian at the
//! current mean, which is the extended-filter correction. Both flow through the single
//! [`KalmanFilter::update`] seam; the model supplies `h`, `H`, `R`, the innovation
//! normalization (bearing wrap), and the degeneracy rule.

use std::fmt::{self, Debug, Display};

use nalgebra::{DMatrix, DVector};

use crate::linalg::{SolveOptions, chol_solve_spd, symmetrize};
use crate::measurements::MeasurementModel;

/// What an update call did to the state.
///
/// The skip variants are expected, recurring conditions handled locally, not errors: in
/// both cases the predicted mean and covariance pass through unchanged and the filter
/// remains healthy for the next cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The correction was applied normally.
    Applied,
    /// The measurement function is undefined at the current mean (radar update with both
    /// position components exactly zero); no correction applied.
    SkippedDegenerate,
    /// The innovation covariance was not solvable even with diagonal jitter; the
    /// predicted state was kept. Callers should surface a recoverable warning.
    SkippedSingular,
}

/// Linear/extended Kalman filter over a 4-component planar state.
///
/// The filter is either uninitialized (no valid state) or initialized; initialization is
/// one-way and is triggered by [`KalmanFilter::initialize`] with the seed mean and
/// covariance. Thereafter the caller alternates [`KalmanFilter::predict`] and
/// [`KalmanFilter::update`], one pair per sensor reading.
#[derive(Clone)]
pub struct KalmanFilter {
    mean_state: DVector<f64>,
    covariance: DMatrix<f64>,
    initialized: bool,
}

impl Debug for KalmanFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KalmanFilter")
            .field("mean_state", &self.mean_state)
            .field("covariance", &self.covariance)
            .field("initialized", &self.initialized)
            .finish()
    }
}

impl Display for KalmanFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.initialized {
            return write!(f, "KalmanFilter(uninitialized)");
        }
        write!(
            f,
            "KalmanFilter(x: [{:.3}, {:.3}, {:.3}, {:.3}])",
            self.mean_state[0], self.mean_state[1], self.mean_state[2], self.mean_state[3]
        )
    }
}

impl KalmanFilter {
    /// Create an uninitialized filter. Predict and update may not be called until
    /// [`KalmanFilter::initialize`] has run.
    pub fn new() -> Self {
        KalmanFilter {
            mean_state: DVector::zeros(0),
            covariance: DMatrix::zeros(0, 0),
            initialized: false,
        }
    }

    /// Seed the filter with an initial mean and covariance.
    ///
    /// One-way transition from uninitialized to initialized. The mean and covariance
    /// dimensions must agree; the covariance must be square.
    pub fn initialize(&mut self, mean: DVector<f64>, covariance: DMatrix<f64>) {
        assert!(covariance.is_square(), "initialize: covariance must be square");
        assert_eq!(
            mean.len(),
            covariance.nrows(),
            "initialize: mean and covariance dimensions disagree"
        );
        self.mean_state = mean;
        self.covariance = covariance;
        self.initialized = true;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Advance the state by one time step.
    ///
    /// The transition and process-noise matrices are owned by the caller and rebuilt for
    /// the current elapsed time before every call; they are never stored here. Always
    /// succeeds given well-formed matrices.
    pub fn predict(&mut self, transition: &DMatrix<f64>, process_noise: &DMatrix<f64>) {
        assert!(self.initialized, "predict: filter is not initialized");
        let n = self.mean_state.len();
        assert_eq!(transition.shape(), (n, n), "predict: transition shape mismatch");
        assert_eq!(
            process_noise.shape(),
            (n, n),
            "predict: process noise shape mismatch"
        );

        self.mean_state = transition * &self.mean_state;
        self.covariance = transition * &self.covariance * transition.transpose() + process_noise;
        self.covariance = symmetrize(&self.covariance);
    }

    /// Correct the state with one measurement.
    ///
    /// The model supplies the measurement vector, noise covariance, expected measurement
    /// and measurement matrix (constant for the linear lidar path, freshly linearized for
    /// the radar path), so the noise and matrix used always belong to the same sensor as
    /// the incoming reading. The gain solve goes through the jittered Cholesky in
    /// [`crate::linalg`]; an unsolvable innovation covariance skips the cycle instead of
    /// propagating a numerically poisoned state.
    pub fn update<M: MeasurementModel>(&mut self, measurement: &M) -> UpdateOutcome {
        assert!(self.initialized, "update: filter is not initialized");
        if measurement.is_degenerate_at(&self.mean_state) {
            return UpdateOutcome::SkippedDegenerate;
        }

        let z = measurement.vector();
        let z_hat = measurement.expected_measurement(&self.mean_state);
        let h = measurement.measurement_matrix(&self.mean_state);
        let r = measurement.noise();

        let dim = measurement.dimension();
        assert_eq!(z.len(), dim, "update: measurement vector dimension mismatch");
        assert_eq!(h.shape(), (dim, self.mean_state.len()), "update: matrix shape mismatch");
        assert_eq!(r.shape(), (dim, dim), "update: noise shape mismatch");

        let innovation = measurement.normalize_innovation(z - z_hat);

        // S = H P Hᵀ + R
        let s = &h * &self.covariance * h.transpose() + r;
        // K = P Hᵀ S⁻¹, computed as Kᵀ = S⁻¹ (P Hᵀ)ᵀ since S is symmetric.
        let p_ht = &self.covariance * h.transpose();
        let Some(k_t) = chol_solve_spd(&s, &p_ht.transpose(), SolveOptions::default()) else {
            return UpdateOutcome::SkippedSingular;
        };
        let gain = k_t.transpose();

        self.mean_state += &gain * innovation;
        let identity = DMatrix::<f64>::identity(self.mean_state.len(), self.mean_state.len());
        self.covariance = (identity - &gain * &h) * &self.covariance;
        self.covariance = symmetrize(&self.covariance);

        UpdateOutcome::Applied
    }

    /// The current state estimate `[px, py, vx, vy]`.
    pub fn state(&self) -> &DVector<f64> {
        &self.mean_state
    }

    /// The current state covariance.
    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }
}
