//! Linear algebra helpers for robust innovation-covariance solves.
//!
//! The update step needs `S⁻¹` where `S = H P Hᵀ + R` is symmetric positive definite in
//! theory but only approximately so in floating point. Strategy:
//! 1) Symmetrize S ← 0.5 (S + Sᵀ)
//! 2) Cholesky
//! 3) Jittered Cholesky (geometric ramp on the diagonal)
//!
//! The solve deliberately returns `Option` instead of panicking or falling back to an
//! explicit inverse: a singular S means the caller skips the update for that cycle,
//! keeping the predicted state rather than poisoning it with NaN/∞.

use nalgebra::DMatrix;
use nalgebra::linalg::Cholesky;

/// Symmetrize a matrix: M ← 0.5 (M + Mᵀ)
///
/// Reduces the round-off asymmetry that accumulates in covariance recurrences.
#[inline]
pub fn symmetrize(m: &DMatrix<f64>) -> DMatrix<f64> {
    0.5 * (m + m.transpose())
}

/// Tuning knobs for [`chol_solve_spd`].
#[derive(Debug, Clone, Copy)]
pub struct SolveOptions {
    pub initial_jitter: f64,
    pub max_jitter: f64,
    pub max_tries: usize,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            initial_jitter: 1e-12,
            max_jitter: 1e-6,
            max_tries: 6,
        }
    }
}

/// Solve A X = B for SPD-ish A via Cholesky, with jitter retries.
///
/// A is symmetrized first, then factored as-is; on failure the diagonal is jittered on a
/// geometric ramp up to `opt.max_jitter`. Returns `None` if all attempts fail, which the
/// filter core maps to a skipped update.
///
/// # Panics
/// Panics if A is not square or A and B have incompatible row counts; those are
/// programming errors at the call site, not recoverable numerical conditions.
pub fn chol_solve_spd(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    opt: SolveOptions,
) -> Option<DMatrix<f64>> {
    assert!(a.is_square(), "chol_solve_spd: A must be square");
    assert_eq!(a.nrows(), b.nrows(), "chol_solve_spd: A and B incompatible");

    let a_sym = symmetrize(a);

    if let Some(ch) = Cholesky::new(a_sym.clone()) {
        return Some(ch.solve(b));
    }

    let n = a_sym.nrows();
    let mut jitter = opt.initial_jitter;
    for _ in 0..opt.max_tries {
        let mut a_j = a_sym.clone();
        for i in 0..n {
            a_j[(i, i)] += jitter;
        }
        if let Some(ch) = Cholesky::new(a_j) {
            return Some(ch.solve(b));
        }
        jitter *= 10.0;
        if jitter > opt.max_jitter {
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: &DMatrix<f64>, b: &DMatrix<f64>, tol: f64) -> bool {
        if a.shape() != b.shape() {
            return false;
        }
        let mut max_abs = 0.0f64;
        for i in 0..a.nrows() {
            for j in 0..a.ncols() {
                max_abs = max_abs.max((a[(i, j)] - b[(i, j)]).abs());
            }
        }
        max_abs <= tol
    }

    #[test]
    fn t_symmetrize() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 0.0, 3.0]);
        let s = symmetrize(&m);
        let s_expected = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 3.0]);
        assert!(approx_eq(&s, &s_expected, 1e-15));
    }

    #[test]
    fn t_solve_spd_basic() {
        let a = DMatrix::from_row_slice(2, 2, &[4.0, 2.0, 2.0, 3.0]);
        let b = DMatrix::from_row_slice(2, 1, &[6.0, 5.0]);

        let x = chol_solve_spd(&a, &b, SolveOptions::default()).expect("should solve");
        let result = &a * &x;
        assert!(approx_eq(&result, &b, 1e-10));
    }

    #[test]
    fn t_solve_spd_with_jitter() {
        // Barely positive definite after nudging the diagonal down.
        let mut a = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.5, 1.0]);
        a[(1, 1)] -= 0.25;
        let b = DMatrix::from_row_slice(2, 1, &[1.0, 1.0]);

        let x = chol_solve_spd(&a, &b, SolveOptions::default()).expect("should solve with jitter");
        let result = &a * &x;
        assert!(approx_eq(&result, &b, 1e-8));
    }

    #[test]
    fn t_solve_spd_singular_returns_none() {
        // Rank-one matrix: singular beyond what the jitter ramp will repair.
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let b = DMatrix::from_row_slice(2, 1, &[1.0, 1.0]);

        let opts = SolveOptions {
            initial_jitter: 1e-300,
            max_jitter: 1e-299,
            max_tries: 1,
        };
        assert!(chol_solve_spd(&a, &b, opts).is_none());
    }

    #[test]
    fn t_solve_identity_rhs_gives_inverse() {
        let a = DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 5.0]);
        let eye = DMatrix::<f64>::identity(2, 2);
        let inv = chol_solve_spd(&a, &eye, SolveOptions::default()).expect("should invert");
        let expected = DMatrix::from_row_slice(2, 2, &[0.5, 0.0, 0.0, 0.2]);
        assert!(approx_eq(&inv, &expected, 1e-12));
    }

    #[test]
    #[should_panic(expected = "chol_solve_spd: A must be square")]
    fn t_solve_spd_non_square_panics() {
        let a = DMatrix::<f64>::zeros(3, 2);
        let b = DMatrix::<f64>::zeros(3, 1);
        let _ = chol_solve_spd(&a, &b, SolveOptions::default());
    }

    #[test]
    #[should_panic(expected = "chol_solve_spd: A and B incompatible")]
    fn t_solve_spd_incompatible_panics() {
        let a = DMatrix::<f64>::identity(2, 2);
        let b = DMatrix::<f64>::zeros(3, 1);
        let _ = chol_solve_spd(&a, &b, SolveOptions::default());
    }
}
