//! Dense matrix products and triangular solves.

use mdarray::DTensor;

use super::{Diag, Side, Trans, UpLo};
use crate::scalar::Scalar;

pub fn transpose<T: Scalar>(a: &DTensor<T, 2>) -> DTensor<T, 2> {
    let (m, n) = *a.shape();
    if m == 0 || n == 0 {
        return DTensor::<T, 2>::from_elem([n, m], T::zero());
    }
    DTensor::<T, 2>::from_fn([n, m], |idx| a[[idx[1], idx[0]]])
}

/// `a * b`
pub fn matmul<T: Scalar>(a: &DTensor<T, 2>, b: &DTensor<T, 2>) -> DTensor<T, 2> {
    let (m, _) = *a.shape();
    let (_, n) = *b.shape();
    let mut c = DTensor::<T, 2>::from_fn([m, n], |_| T::zero());
    gemm(Trans::N, Trans::N, T::one(), a, b, T::zero(), &mut c);
    c
}

#[inline]
fn op_at<T: Scalar>(a: &DTensor<T, 2>, trans: Trans, i: usize, j: usize) -> T {
    match trans {
        Trans::N => a[[i, j]],
        Trans::T => a[[j, i]],
    }
}

/// `c = alpha * op(a) * op(b) + beta * c`. With `beta == 0` the old
/// contents of `c` are ignored.
pub fn gemm<T: Scalar>(
    ta: Trans,
    tb: Trans,
    alpha: T,
    a: &DTensor<T, 2>,
    b: &DTensor<T, 2>,
    beta: T,
    c: &mut DTensor<T, 2>,
) {
    let (m, n) = *c.shape();
    let (am, an) = *a.shape();
    let (ar, k) = match ta {
        Trans::N => (am, an),
        Trans::T => (an, am),
    };
    let (bm, bn) = *b.shape();
    let (bk, bc) = match tb {
        Trans::N => (bm, bn),
        Trans::T => (bn, bm),
    };
    assert!(ar == m && bc == n && bk == k, "gemm: incompatible shapes");

    for i in 0..m {
        for j in 0..n {
            let mut s = T::zero();
            for l in 0..k {
                s += op_at(a, ta, i, l) * op_at(b, tb, l, j);
            }
            c[[i, j]] = if beta == T::zero() {
                alpha * s
            } else {
                alpha * s + beta * c[[i, j]]
            };
        }
    }
}

/// Solve `op(a) * x = alpha * b` (`Side::Left`) or
/// `x * op(a) = alpha * b` (`Side::Right`) for triangular `a`,
/// overwriting `b` with `x`.
pub fn trsm<T: Scalar>(
    side: Side,
    uplo: UpLo,
    trans: Trans,
    diag: Diag,
    alpha: T,
    a: &DTensor<T, 2>,
    b: &mut DTensor<T, 2>,
) {
    match side {
        Side::Left => trsm_left(uplo, trans, diag, alpha, a, b),
        Side::Right => {
            // x op(a) = alpha b  <=>  op(a)^T x^T = alpha b^T
            let mut bt = transpose(b);
            trsm_left(uplo, trans.flip(), diag, alpha, a, &mut bt);
            *b = transpose(&bt);
        }
    }
}

fn trsm_left<T: Scalar>(uplo: UpLo, trans: Trans, diag: Diag, alpha: T, a: &DTensor<T, 2>, b: &mut DTensor<T, 2>) {
    let (n, an) = *a.shape();
    assert_eq!(n, an, "trsm: triangular operand must be square");
    let (bm, nrhs) = *b.shape();
    assert_eq!(bm, n, "trsm: right-hand side has {bm} rows, expected {n}");

    // op(a) is lower triangular when exactly one of (lower, transposed) holds
    let lower = matches!((uplo, trans), (UpLo::Lower, Trans::N) | (UpLo::Upper, Trans::T));
    let t = |i: usize, j: usize| op_at(a, trans, i, j);

    for c in 0..nrhs {
        for i in 0..n {
            b[[i, c]] *= alpha;
        }
        if lower {
            for i in 0..n {
                let mut s = b[[i, c]];
                for k in 0..i {
                    s -= t(i, k) * b[[k, c]];
                }
                b[[i, c]] = match diag {
                    Diag::Unit => s,
                    Diag::NonUnit => s / t(i, i),
                };
            }
        } else {
            for i in (0..n).rev() {
                let mut s = b[[i, c]];
                for k in i + 1..n {
                    s -= t(i, k) * b[[k, c]];
                }
                b[[i, c]] = match diag {
                    Diag::Unit => s,
                    Diag::NonUnit => s / t(i, i),
                };
            }
        }
    }
}
