//! Result validation utilities

use mdarray::DTensor;

use crate::scalar::Scalar;

/// Check whether the columns of `matrix` are orthonormal.
pub fn is_orthogonal<T: Scalar>(matrix: &DTensor<T, 2>, tolerance: T) -> bool {
    let (m, k) = *matrix.shape();
    for i in 0..k {
        for j in 0..k {
            let mut sum = T::zero();
            for row in 0..m {
                sum += matrix[[row, i]] * matrix[[row, j]];
            }
            let expected = if i == j { T::one() } else { T::zero() };
            if (sum - expected).abs() > tolerance {
                return false;
            }
        }
    }
    true
}

/// Largest entry-wise difference between two matrices of equal shape.
pub fn max_abs_diff<T: Scalar>(a: &DTensor<T, 2>, b: &DTensor<T, 2>) -> T {
    assert_eq!(a.shape(), b.shape(), "max_abs_diff: shape mismatch");
    let (m, n) = *a.shape();
    let mut max_val = T::zero();
    for i in 0..m {
        for j in 0..n {
            max_val = max_val.max((a[[i, j]] - b[[i, j]]).abs());
        }
    }
    max_val
}
