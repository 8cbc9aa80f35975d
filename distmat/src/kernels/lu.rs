//! LU factorisation with partial pivoting.

use mdarray::DTensor;

use crate::scalar::Scalar;

/// Factor `a = P * L * U` in place (unit lower `L` below the diagonal,
/// `U` on and above it).
///
/// Returns the row interchanges (`ipiv[j]` is the row swapped with row
/// `j` at step `j`, `min(rows, cols)` entries) and `info`: zero on
/// success, otherwise `j + 1` for the first exactly zero pivot `U[j, j]`.
/// The factorisation is completed either way.
pub fn getrf<T: Scalar>(a: &mut DTensor<T, 2>) -> (Vec<usize>, usize) {
    let (m, n) = *a.shape();
    let k = m.min(n);
    let mut ipiv = Vec::with_capacity(k);
    let mut info = 0;

    for j in 0..k {
        let mut p = j;
        for i in j + 1..m {
            if a[[i, j]].abs() > a[[p, j]].abs() {
                p = i;
            }
        }
        ipiv.push(p);

        if a[[p, j]] != T::zero() {
            if p != j {
                for c in 0..n {
                    let tmp = a[[j, c]];
                    a[[j, c]] = a[[p, c]];
                    a[[p, c]] = tmp;
                }
            }
            let pivot = a[[j, j]];
            for i in j + 1..m {
                a[[i, j]] /= pivot;
            }
        } else if info == 0 {
            info = j + 1;
        }

        for i in j + 1..m {
            let l = a[[i, j]];
            if l != T::zero() {
                for c in j + 1..n {
                    let u = a[[j, c]];
                    a[[i, c]] -= l * u;
                }
            }
        }
    }
    (ipiv, info)
}

/// Solve `A X = B` in place using the output of [`getrf`] on a square
/// `A`.
pub fn getrs<T: Scalar>(lu: &DTensor<T, 2>, ipiv: &[usize], b: &mut DTensor<T, 2>) {
    let (n, _) = *lu.shape();
    let (bm, nrhs) = *b.shape();
    assert_eq!(bm, n, "getrs: right-hand side has {bm} rows, expected {n}");

    for (i, &p) in ipiv.iter().enumerate() {
        if p != i {
            for c in 0..nrhs {
                let tmp = b[[i, c]];
                b[[i, c]] = b[[p, c]];
                b[[p, c]] = tmp;
            }
        }
    }
    for c in 0..nrhs {
        for i in 0..n {
            let mut s = b[[i, c]];
            for k in 0..i {
                s -= lu[[i, k]] * b[[k, c]];
            }
            b[[i, c]] = s;
        }
        for i in (0..n).rev() {
            let mut s = b[[i, c]];
            for k in i + 1..n {
                s -= lu[[i, k]] * b[[k, c]];
            }
            b[[i, c]] = s / lu[[i, i]];
        }
    }
}
