//! Planar sensor-fusion tracking toolbox
//!
//! This crate provides a recursive Bayesian estimator for a single object moving on a
//! plane. The object's position and velocity are estimated from a stream of asynchronous,
//! heterogeneous sensor readings: a lidar channel that reports position directly, and a
//! radar channel that reports range, bearing, and range rate and therefore requires
//! extended (linearized) filtering. The estimator is strictly sequential: one timestamped
//! reading at a time, fully processed before the next is accepted.
//!
//! The crate is split into a sensor-agnostic filter core and a fusion layer that owns the
//! sensor-specific models:
//!
//! - [`kalman`]: the filter core, a `{mean, covariance}` pair with predict and update
//!   operations over abstract vectors and matrices. It knows nothing about which sensor
//!   produced a measurement; the measurement model is pluggable.
//! - [`measurements`]: the raw reading types and the [`measurements::MeasurementModel`]
//!   trait together with the lidar and radar implementations.
//! - [`linearize`]: the radar measurement Jacobian, recomputed at the current state
//!   estimate every cycle.
//! - [`fusion`]: the fusion manager that initializes the filter from the first reading,
//!   rebuilds the time-dependent transition and process-noise matrices each cycle, and
//!   dispatches the correct measurement path per reading.
//! - [`linalg`]: robust SPD solve helpers used by the update step.
//! - [`sim`]: CSV dataset records, a seeded synthetic scenario generator, a closed-loop
//!   runner, and the RMSE accuracy metric used for offline validation.
//!
//! Primarily built off of [`nalgebra`](https://crates.io/crates/nalgebra) for the linear
//! algebra. The state vector is a flat `DVector<f64>` of length four, ordered as:
//!
//! $$
//! x = [p_x, p_y, v_x, v_y]
//! $$
//!
//! with positions in meters and velocities in meters per second. Covariance matrices are
//! symmetric positive semi-definite by construction and always match the dimensionality of
//! the vector they describe; dimension mismatches are programming errors and fail fast.
//!
//! Each tracked object requires its own estimator instance. Instances share no state and
//! carry no internal synchronization; callers own the read/write access.

pub mod fusion;
pub mod kalman;
pub mod linalg;
pub mod linearize;
pub mod measurements;
pub mod sim;

/// Number of components in the tracker state vector: `[px, py, vx, vy]`.
pub const STATE_SIZE: usize = 4;

/// Wrap an angle in radians into the half-open interval (−π, π].
///
/// Angle innovations are circular quantities: a raw bearing difference of 2π − ε must be
/// treated as −ε, not as a large linear residual. The wrapped result differs from the
/// input by an integer multiple of 2π.
///
/// # Arguments
/// * `angle` - The angle to be wrapped, in radians.
/// # Returns
/// * The wrapped angle in (−π, π].
pub fn wrap_to_pi(angle: f64) -> f64 {
    let mut wrapped = angle;
    while wrapped > std::f64::consts::PI {
        wrapped -= 2.0 * std::f64::consts::PI;
    }
    while wrapped <= -std::f64::consts::PI {
        wrapped += 2.0 * std::f64::consts::PI;
    }
    wrapped
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::f64::consts::PI;

    #[test]
    fn wrap_identity_inside_interval() {
        assert_approx_eq!(wrap_to_pi(0.0), 0.0, 1e-15);
        assert_approx_eq!(wrap_to_pi(1.0), 1.0, 1e-15);
        assert_approx_eq!(wrap_to_pi(-3.0), -3.0, 1e-15);
        assert_approx_eq!(wrap_to_pi(PI), PI, 1e-15);
    }

    #[test]
    fn wrap_reduces_modulo_two_pi() {
        assert_approx_eq!(wrap_to_pi(PI + 0.5), -PI + 0.5, 1e-12);
        assert_approx_eq!(wrap_to_pi(-PI - 0.5), PI - 0.5, 1e-12);
        assert_approx_eq!(wrap_to_pi(5.0 * PI), PI, 1e-12);
        assert_approx_eq!(wrap_to_pi(-4.0 * PI), 0.0, 1e-12);
    }

    #[test]
    fn wrap_lands_in_half_open_interval() {
        // -π maps to +π: the interval is (−π, π].
        assert_approx_eq!(wrap_to_pi(-PI), PI, 1e-15);
        for k in -5..=5 {
            for frac in [-0.99, -0.5, 0.0, 0.25, 0.75, 0.99] {
                let raw = 2.0 * PI * k as f64 + frac * PI;
                let wrapped = wrap_to_pi(raw);
                assert!(
                    wrapped > -PI && wrapped <= PI,
                    "wrapped {wrapped} out of range"
                );
                // Difference must be an integer multiple of 2π.
                let turns = (raw - wrapped) / (2.0 * PI);
                assert_approx_eq!(turns, turns.round(), 1e-9);
            }
        }
    }
}
