//! Measurement Jacobians for the extended (linearized) update path.
//!
//! The radar measurement function is nonlinear in the state, so the covariance algebra of
//! the update step uses its Jacobian evaluated at the current mean. The Jacobian is a
//! per-cycle quantity: it must be recomputed at the just-predicted state before every
//! radar update, never cached across cycles.

use nalgebra::{DMatrix, DVector};

use crate::STATE_SIZE;

/// Threshold on the squared position magnitude below which the linearization is
/// considered degenerate.
pub const DEGENERATE_THRESHOLD: f64 = 1e-4;

/// Jacobian of the range/bearing/range-rate measurement function at `state`.
///
/// For state `[px, py, vx, vy]` and c1 = px² + py², c2 = √c1, c3 = c1·c2:
///
/// $$
/// H_j = \begin{bmatrix}
/// p_x/c_2 & p_y/c_2 & 0 & 0 \\\\
/// -p_y/c_1 & p_x/c_1 & 0 & 0 \\\\
/// p_y(v_x p_y - v_y p_x)/c_3 & p_x(v_y p_x - v_x p_y)/c_3 & p_x/c_2 & p_y/c_2
/// \end{bmatrix}
/// $$
///
/// When c1 falls below [`DEGENERATE_THRESHOLD`] the partials are dominated by division by
/// a vanishing quantity; the returned matrix is left zero instead. A zero measurement
/// matrix yields a zero Kalman gain, so the update that consumes it is a no-op rather
/// than a division fault.
///
/// # Panics
/// Panics if `state` does not have exactly four components.
pub fn radar_jacobian(state: &DVector<f64>) -> DMatrix<f64> {
    assert_eq!(
        state.len(),
        STATE_SIZE,
        "radar_jacobian: state must have 4 components"
    );
    let (px, py, vx, vy) = (state[0], state[1], state[2], state[3]);

    let c1 = px * px + py * py;
    let mut jacobian = DMatrix::<f64>::zeros(3, STATE_SIZE);
    if c1.abs() < DEGENERATE_THRESHOLD {
        return jacobian;
    }
    let c2 = c1.sqrt();
    let c3 = c1 * c2;

    jacobian[(0, 0)] = px / c2;
    jacobian[(0, 1)] = py / c2;
    jacobian[(1, 0)] = -py / c1;
    jacobian[(1, 1)] = px / c1;
    jacobian[(2, 0)] = py * (vx * py - vy * px) / c3;
    jacobian[(2, 1)] = px * (vy * px - vx * py) / c3;
    jacobian[(2, 2)] = px / c2;
    jacobian[(2, 3)] = py / c2;

    jacobian
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn jacobian_on_axis() {
        // Object dead ahead on the x axis, moving along it.
        let state = DVector::from_vec(vec![2.0, 0.0, 1.0, 0.0]);
        let h = radar_jacobian(&state);
        assert_eq!(h.shape(), (3, 4));
        assert_approx_eq!(h[(0, 0)], 1.0, 1e-12);
        assert_approx_eq!(h[(0, 1)], 0.0, 1e-12);
        assert_approx_eq!(h[(1, 0)], 0.0, 1e-12);
        assert_approx_eq!(h[(1, 1)], 0.5, 1e-12);
        assert_approx_eq!(h[(2, 2)], 1.0, 1e-12);
        assert_approx_eq!(h[(2, 3)], 0.0, 1e-12);
        // Radial velocity is insensitive to position when v is radial.
        assert_approx_eq!(h[(2, 0)], 0.0, 1e-12);
        assert_approx_eq!(h[(2, 1)], 0.0, 1e-12);
    }

    #[test]
    fn jacobian_matches_finite_differences() {
        use crate::measurements::{MeasurementModel, RadarMeasurement};

        let state = DVector::from_vec(vec![3.0, -4.0, 0.7, 1.1]);
        let h = radar_jacobian(&state);
        let model = RadarMeasurement::new(0.0, 0.0, 0.0);
        let step = 1e-7;
        for col in 0..4 {
            let mut plus = state.clone();
            let mut minus = state.clone();
            plus[col] += step;
            minus[col] -= step;
            let dz = (model.expected_measurement(&plus) - model.expected_measurement(&minus))
                / (2.0 * step);
            for row in 0..3 {
                assert_approx_eq!(h[(row, col)], dz[row], 1e-5);
            }
        }
    }

    #[test]
    fn jacobian_degenerate_near_origin() {
        let state = DVector::from_vec(vec![1e-3, 1e-3, 1.0, 1.0]);
        // c1 = 2e-6 < threshold: left in the degenerate zero-gain form.
        let h = radar_jacobian(&state);
        assert_eq!(h, DMatrix::<f64>::zeros(3, 4));
    }

    #[test]
    #[should_panic(expected = "state must have 4 components")]
    fn jacobian_rejects_wrong_state_size() {
        let state = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let _ = radar_jacobian(&state);
    }
}
