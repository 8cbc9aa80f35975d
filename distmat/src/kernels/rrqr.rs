//! Rank-revealing QR with column pivoting.

use mdarray::DTensor;

use super::householder::{apply_left, reflector};
use crate::scalar::Scalar;

/// Result of [`geqp3`]. The factored matrix itself is left in place.
#[derive(Debug, Clone)]
pub struct PivotedQr<T> {
    /// Householder coefficients, one per eliminated column.
    pub taus: Vec<T>,
    /// Column permutation: position `i` holds original column `jpvt[i]`.
    pub jpvt: Vec<usize>,
    /// The same permutation as successive interchanges: step `i` swapped
    /// columns `i` and `ipiv[i]`.
    pub ipiv: Vec<usize>,
    /// Number of columns eliminated before the tolerances stopped it.
    pub rank: usize,
}

/// QR with column pivoting that stops once the next pivot is negligible.
///
/// Elimination stops before step `i` when `|R[i, i]| <= rel_tol * |R[0, 0]|`
/// or `|R[i, i]| <= abs_tol`, leaving `rank = i`. Rows and columns from
/// `rank` on are then zeroed in `a`, so the upper trapezoid of the
/// leading `rank` rows holds `[R11 R12]`.
pub fn geqp3<T: Scalar>(a: &mut DTensor<T, 2>, rel_tol: T, abs_tol: T) -> PivotedQr<T> {
    let (m, n) = *a.shape();
    let k = m.min(n);

    let mut jpvt: Vec<usize> = (0..n).collect();
    let mut ipiv: Vec<usize> = (0..n).collect();
    let mut taus = Vec::with_capacity(k);

    let column_norm = |a: &DTensor<T, 2>, j: usize, from: usize| {
        let mut sum = T::zero();
        for i in from..m {
            sum += a[[i, j]] * a[[i, j]];
        }
        sum.sqrt()
    };
    let mut xnorms: Vec<T> = (0..n).map(|j| column_norm(a, j, 0)).collect();
    let mut pnorms = xnorms.clone();

    let sqrteps = T::epsilon().sqrt();
    let mut r00 = T::zero();
    let mut rank = k;

    for i in 0..k {
        let mut pvt = i;
        for j in i + 1..n {
            if pnorms[j] > pnorms[pvt] {
                pvt = j;
            }
        }
        if pvt != i {
            jpvt.swap(i, pvt);
            xnorms.swap(i, pvt);
            pnorms.swap(i, pvt);
            for row in 0..m {
                let tmp = a[[row, i]];
                a[[row, i]] = a[[row, pvt]];
                a[[row, pvt]] = tmp;
            }
        }
        ipiv[i] = pvt;

        let mut col: Vec<T> = (i..m).map(|r| a[[r, i]]).collect();
        let tau = reflector(&mut col);
        for (r, v) in (i..m).zip(col) {
            a[[r, i]] = v;
        }

        let diag = a[[i, i]].abs();
        if i == 0 {
            r00 = diag;
        }
        if diag == T::zero() || diag <= rel_tol * r00 || diag <= abs_tol {
            rank = i;
            break;
        }
        taus.push(tau);
        apply_left(a, i, i, tau, i + 1..n);

        // downdate the partial column norms
        for j in i + 1..n {
            if pnorms[j] == T::zero() {
                continue;
            }
            let t = a[[i, j]].abs() / pnorms[j];
            let t = ((T::one() + t) * (T::one() - t)).max(T::zero());
            let ratio = pnorms[j] / xnorms[j];
            if t * ratio * ratio < sqrteps {
                let recomputed = column_norm(a, j, i + 1);
                pnorms[j] = recomputed;
                xnorms[j] = recomputed;
            } else {
                pnorms[j] *= t.sqrt();
            }
        }
    }

    if rank < k {
        for row in rank..m {
            for col in rank..n {
                a[[row, col]] = T::zero();
            }
        }
    }
    tracing::trace!(m, n, rank, "geqp3");
    PivotedQr { taus, jpvt, ipiv, rank }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::{matmul, orgqr};
    use crate::utils::{invert_permutation, max_abs_diff, permutation_from_interchanges};

    fn low_rank(m: usize, n: usize, r: usize) -> DTensor<f64, 2> {
        let u = DTensor::<f64, 2>::from_fn([m, r], |idx| ((idx[0] + 1) as f64).powi(idx[1] as i32 % 3) + idx[1] as f64);
        let v = DTensor::<f64, 2>::from_fn([r, n], |idx| (((idx[0] * 5 + idx[1] * 3) % 7) as f64) - 3.0);
        matmul(&u, &v)
    }

    #[test]
    fn test_full_rank_reconstruction() {
        let a = DTensor::<f64, 2>::from_fn([5, 4], |idx| 1.0 / (idx[0] + idx[1] + 1) as f64 + if idx[0] == idx[1] { 1.0 } else { 0.0 });
        let mut f = a.clone();
        let qr = geqp3(&mut f, 0.0, 0.0);
        assert_eq!(qr.rank, 4);
        let r = DTensor::<f64, 2>::from_fn([4, 4], |idx| if idx[1] >= idx[0] { f[[idx[0], idx[1]]] } else { 0.0 });
        orgqr(&mut f, 4, &qr.taus);
        let q = DTensor::<f64, 2>::from_fn([5, 4], |idx| f[[idx[0], idx[1]]]);
        let ap = DTensor::<f64, 2>::from_fn([5, 4], |idx| a[[idx[0], qr.jpvt[idx[1]]]]);
        assert!(max_abs_diff(&matmul(&q, &r), &ap) < 1e-12);
        // diagonal of R is non-increasing in magnitude
        for i in 1..4 {
            assert!(r[[i, i]].abs() <= r[[i - 1, i - 1]].abs() + 1e-14);
        }
    }

    #[test]
    fn test_detects_rank() {
        let mut a = low_rank(8, 6, 3);
        let qr = geqp3(&mut a, 1e-10, 0.0);
        assert_eq!(qr.rank, 3);
        assert_eq!(qr.taus.len(), 3);
        for i in 3..8 {
            for j in 3..6 {
                assert_eq!(a[[i, j]], 0.0);
            }
        }
    }

    #[test]
    fn test_absolute_tolerance() {
        let mut a = DTensor::<f64, 2>::from_fn([3, 3], |idx| if idx[0] == idx[1] { [4.0, 1e-3, 1e-9][idx[0]] } else { 0.0 });
        let qr = geqp3(&mut a, 0.0, 1e-2);
        assert_eq!(qr.rank, 1);
    }

    #[test]
    fn test_interchanges_match_permutation() {
        let mut a = low_rank(6, 7, 4);
        let qr = geqp3(&mut a, 0.0, 0.0);
        let perm = permutation_from_interchanges(&qr.ipiv, true);
        assert_eq!(perm, qr.jpvt);
        let inv = invert_permutation(&perm);
        for (i, &p) in perm.iter().enumerate() {
            assert_eq!(inv[p], i);
        }
    }

    #[test]
    fn test_zero_matrix() {
        let mut a = DTensor::<f64, 2>::from_fn([3, 2], |_| 0.0);
        let qr = geqp3(&mut a, 1e-8, 0.0);
        assert_eq!(qr.rank, 0);
        assert_eq!(qr.jpvt, vec![0, 1]);
    }
}
