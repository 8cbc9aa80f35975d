//! Householder QR and LQ.

use mdarray::DTensor;

use super::blas::transpose;
use super::householder::{apply_left, reflector};
use crate::scalar::Scalar;

/// QR-factor the leading `ncols` columns of `a` in place.
///
/// On return the upper triangle holds `R` and the reflector vectors sit
/// below the diagonal. Returns one `tau` per reflector
/// (`min(rows, ncols)` of them).
pub fn geqrf<T: Scalar>(a: &mut DTensor<T, 2>, ncols: usize) -> Vec<T> {
    let (m, n) = *a.shape();
    assert!(ncols <= n, "geqrf: {ncols} columns requested from {n}");
    let k = m.min(ncols);
    let mut taus = Vec::with_capacity(k);
    for i in 0..k {
        let mut col: Vec<T> = (i..m).map(|r| a[[r, i]]).collect();
        let tau = reflector(&mut col);
        for (r, v) in (i..m).zip(col) {
            a[[r, i]] = v;
        }
        apply_left(a, i, i, tau, i + 1..ncols);
        taus.push(tau);
    }
    taus
}

/// Overwrite the leading `ncols` columns of a [`geqrf`] result with the
/// first `ncols` columns of `Q`. Requires `ncols <= rows`.
pub fn orgqr<T: Scalar>(a: &mut DTensor<T, 2>, ncols: usize, taus: &[T]) {
    let (m, _) = *a.shape();
    assert!(ncols <= m, "orgqr: {ncols} columns of Q requested from {m} rows");
    let k = taus.len();
    debug_assert!(k <= ncols);

    // columns without a reflector start as unit vectors
    for j in k..ncols {
        for i in 0..m {
            a[[i, j]] = if i == j { T::one() } else { T::zero() };
        }
    }
    for i in (0..k).rev() {
        let tau = taus[i];
        apply_left(a, i, i, tau, i + 1..ncols);
        for r in i + 1..m {
            a[[r, i]] = -tau * a[[r, i]];
        }
        a[[i, i]] = T::one() - tau;
        for r in 0..i {
            a[[r, i]] = T::zero();
        }
    }
}

/// LQ factorisation `A = L[:, :k] * Q[:k, :]` of an `m x n` matrix with
/// `k = min(m, n)`.
///
/// Returns `L` (`m x m`, lower triangular, columns `k..` zero) and the
/// full orthogonal `Q` (`n x n`). Computed as the QR factorisation of
/// `A^T`.
pub fn lq<T: Scalar>(a: &DTensor<T, 2>) -> (DTensor<T, 2>, DTensor<T, 2>) {
    let (m, n) = *a.shape();
    let k = m.min(n);
    let mut at = transpose(a);
    let taus = geqrf(&mut at, m);

    let l = DTensor::<T, 2>::from_fn([m, m], |idx| {
        let (i, j) = (idx[0], idx[1]);
        if j < k && j <= i {
            at[[j, i]]
        } else {
            T::zero()
        }
    });

    let mut w = DTensor::<T, 2>::from_fn([n, n], |idx| if idx[1] < k { at[[idx[0], idx[1]]] } else { T::zero() });
    orgqr(&mut w, n, &taus);
    (l, transpose(&w))
}
