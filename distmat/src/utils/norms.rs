//! Vector and matrix norm computations

use mdarray::DTensor;

use crate::scalar::Scalar;

/// Euclidean norm of a slice
pub fn norm_2<T: Scalar>(vec: &[T]) -> T {
    let mut sum = T::zero();
    for &val in vec {
        sum += val * val;
    }
    sum.sqrt()
}

/// Frobenius norm of a matrix
pub fn norm_frobenius<T: Scalar>(mat: &DTensor<T, 2>) -> T {
    let (m, n) = *mat.shape();
    let mut sum = T::zero();
    for i in 0..m {
        for j in 0..n {
            let val = mat[[i, j]];
            sum += val * val;
        }
    }
    sum.sqrt()
}

/// Largest absolute entry of a matrix
pub fn norm_max<T: Scalar>(mat: &DTensor<T, 2>) -> T {
    let (m, n) = *mat.shape();
    let mut max_val = T::zero();
    for i in 0..m {
        for j in 0..n {
            max_val = max_val.max(mat[[i, j]].abs());
        }
    }
    max_val
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use mdarray::tensor;

    #[test]
    fn test_norm_2() {
        assert_abs_diff_eq!(norm_2(&[3.0, 4.0, 0.0]), 5.0, epsilon = 1e-10);
    }

    #[test]
    fn test_norm_frobenius() {
        let m: DTensor<f64, 2> = tensor![[3.0, 4.0], [0.0, 5.0]];
        assert_abs_diff_eq!(norm_frobenius(&m), 50.0f64.sqrt(), epsilon = 1e-10);
    }

    #[test]
    fn test_norm_max() {
        let m: DTensor<f64, 2> = tensor![[1.0, -3.0], [2.0, 0.5]];
        assert_abs_diff_eq!(norm_max(&m), 3.0, epsilon = 1e-10);
    }
}
