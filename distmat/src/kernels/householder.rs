//! Householder reflectors
//!
//! `H = I - tau * v * v^T` with `v[0] = 1` implicit, so only `v[1..]` is
//! stored below the diagonal of the factored matrix.

use std::ops::Range;

use mdarray::DTensor;

use crate::scalar::Scalar;
use crate::utils::norm_2;

/// Turn `x` into the reflector that maps it onto a multiple of `e_1`.
///
/// On return `x[0]` holds `beta = (H x)[0]` and `x[1..]` holds `v[1..]`.
/// Returns `tau`, which is zero when `x` is zero.
pub fn reflector<T: Scalar>(x: &mut [T]) -> T {
    if x.is_empty() {
        return T::zero();
    }
    let norm = norm_2(x);
    if norm == T::zero() {
        return T::zero();
    }
    let x0 = x[0];
    let nu = if x0 >= T::zero() { norm } else { -norm };
    let head = x0 + nu;
    x[0] = -nu;
    for xi in x.iter_mut().skip(1) {
        *xi /= head;
    }
    head / nu
}

/// Apply the reflector stored in column `vcol` (rows `row0..`) of `a`
/// from the left to columns `cols` of `a`, rows `row0..`.
pub fn apply_left<T: Scalar>(a: &mut DTensor<T, 2>, row0: usize, vcol: usize, tau: T, cols: Range<usize>) {
    if tau == T::zero() {
        return;
    }
    let (m, _) = *a.shape();
    for j in cols {
        debug_assert_ne!(j, vcol);
        let mut s = a[[row0, j]];
        for i in row0 + 1..m {
            s += a[[i, vcol]] * a[[i, j]];
        }
        s *= tau;
        a[[row0, j]] -= s;
        for i in row0 + 1..m {
            let v = a[[i, vcol]];
            a[[i, j]] -= s * v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_reflector_annihilates_tail() {
        let original = [3.0, 4.0, 0.0, 12.0];
        let mut x = original;
        let tau = reflector(&mut x);
        // apply H to the original vector: H x = x - tau * v * (v^T x)
        let v = [1.0, x[1], x[2], x[3]];
        let vtx: f64 = v.iter().zip(&original).map(|(a, b)| a * b).sum();
        let hx: Vec<f64> = original.iter().zip(&v).map(|(xi, vi)| xi - tau * vi * vtx).collect();
        assert_abs_diff_eq!(hx[0], x[0], epsilon = 1e-12);
        assert_abs_diff_eq!(x[0].abs(), 13.0, epsilon = 1e-12);
        for &t in &hx[1..] {
            assert_abs_diff_eq!(t, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_zero_vector() {
        let mut x = [0.0f64; 3];
        assert_eq!(reflector(&mut x), 0.0);
        assert_eq!(x, [0.0; 3]);
    }

    #[test]
    fn test_apply_left_preserves_norms() {
        let mut a = DTensor::<f64, 2>::from_fn([3, 2], |idx| (idx[0] * 2 + idx[1] + 1) as f64);
        let mut col: Vec<f64> = (0..3).map(|i| a[[i, 0]]).collect();
        let tau = reflector(&mut col);
        for i in 0..3 {
            a[[i, 0]] = col[i];
        }
        let before: f64 = (0..3).map(|i| a[[i, 1]] * a[[i, 1]]).sum();
        apply_left(&mut a, 0, 0, tau, 1..2);
        let after: f64 = (0..3).map(|i| a[[i, 1]] * a[[i, 1]]).sum();
        assert_abs_diff_eq!(before, after, epsilon = 1e-10);
    }
}
