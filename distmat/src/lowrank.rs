//! Boundary to an external low-rank compression engine.
//!
//! An engine compresses an operator it can only sample through
//! matrix-vector products. [`DistributedMatVec`] provides those products
//! for a block-cyclic matrix; [`ContiguousLayout`] describes the 1D
//! row/column ranges engines of this kind usually work with.

use std::ops::Range;

use mdarray::DTensor;

use crate::comm::Communicator;
use crate::error::Result;
use crate::kernels::Trans;
use crate::matrix::{BlockCyclic, DistributedMatrix};
use crate::scalar::Scalar;

/// Operation applied by a mat-vec: `A` or `A^T`.
pub type Op = Trans;

/// `y = op(A) x` on replicated dense blocks of right-hand sides.
pub trait MatVec<T: Scalar> {
    fn apply(&mut self, op: Op, x: &DTensor<T, 2>, y: &mut DTensor<T, 2>);
}

impl<T, F> MatVec<T> for F
where
    T: Scalar,
    F: FnMut(Op, &DTensor<T, 2>, &mut DTensor<T, 2>),
{
    fn apply(&mut self, op: Op, x: &DTensor<T, 2>, y: &mut DTensor<T, 2>) {
        self(op, x, y)
    }
}

/// A compression engine driven by mat-vec samples.
pub trait LowRankEngine<T: Scalar> {
    /// Build the compressed representation from `op`.
    fn compress(&mut self, op: &mut dyn MatVec<T>) -> Result<()>;

    /// `y = op(A~) x` with the compressed operator.
    fn mult(&self, op: Op, x: &DTensor<T, 2>, y: &mut DTensor<T, 2>) -> Result<()>;
}

/// Mat-vec with a distributed matrix. Collective over the matrix's grid;
/// `x` and `y` must be identical on all grid workers.
#[derive(Debug)]
pub struct DistributedMatVec<'a, 'g, T: Scalar, C: Communicator> {
    a: &'a DistributedMatrix<'g, T, C>,
}

impl<'a, 'g, T: Scalar, C: Communicator + 'g> DistributedMatVec<'a, 'g, T, C> {
    pub fn new(a: &'a DistributedMatrix<'g, T, C>) -> Self {
        Self { a }
    }
}

impl<'a, 'g, T: Scalar, C: Communicator + 'g> MatVec<T> for DistributedMatVec<'a, 'g, T, C> {
    fn apply(&mut self, op: Op, x: &DTensor<T, 2>, y: &mut DTensor<T, 2>) {
        let a = self.a;
        let Some(comm) = a.grid().comm() else {
            return;
        };
        let (xm, k) = *x.shape();
        let (ym, yk) = *y.shape();
        let (out_rows, in_rows) = match op {
            Trans::N => (a.rows(), a.cols()),
            Trans::T => (a.cols(), a.rows()),
        };
        assert!(
            xm == in_rows && ym == out_rows && yk == k,
            "mat-vec: x is {xm}x{k}, y is {ym}x{yk}, operator is {}x{}",
            out_rows,
            in_rows
        );

        // column-major partial product from the owned entries
        let mut partial = vec![T::zero(); out_rows * k];
        for lc in 0..a.lcols() {
            let gc = a.coll2g(lc);
            for lr in 0..a.lrows() {
                let gr = a.rowl2g(lr);
                let v = a.get(lr, lc);
                let (out, inp) = match op {
                    Trans::N => (gr, gc),
                    Trans::T => (gc, gr),
                };
                for j in 0..k {
                    partial[out + out_rows * j] += v * x[[inp, j]];
                }
            }
        }
        let total = comm.all_reduce_sum(partial);
        for j in 0..k {
            for i in 0..out_rows {
                y[[i, j]] = total[i + out_rows * j];
            }
        }
    }
}

/// 1D contiguous distribution: worker `p` holds rows
/// `rdist[p]..rdist[p + 1]` and columns `cdist[p]..cdist[p + 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContiguousLayout {
    rank: usize,
    rdist: Vec<usize>,
    cdist: Vec<usize>,
}

impl ContiguousLayout {
    /// Collective over `comm`: each worker contributes its local counts.
    pub fn new<C: Communicator>(comm: &C, local_rows: usize, local_cols: usize) -> Self {
        let counts = comm.all_gather(vec![(local_rows, local_cols)]);
        let mut rdist = Vec::with_capacity(counts.len() + 1);
        let mut cdist = Vec::with_capacity(counts.len() + 1);
        rdist.push(0);
        cdist.push(0);
        for (r, c) in counts.into_iter().flatten() {
            rdist.push(rdist[rdist.len() - 1] + r);
            cdist.push(cdist[cdist.len() - 1] + c);
        }
        Self {
            rank: comm.rank(),
            rdist,
            cdist,
        }
    }

    pub fn rdist(&self) -> &[usize] {
        &self.rdist
    }

    pub fn cdist(&self) -> &[usize] {
        &self.cdist
    }

    pub fn rows(&self) -> usize {
        self.rdist[self.rdist.len() - 1]
    }

    pub fn cols(&self) -> usize {
        self.cdist[self.cdist.len() - 1]
    }

    pub fn begin_row(&self) -> usize {
        self.rdist[self.rank]
    }

    pub fn end_row(&self) -> usize {
        self.rdist[self.rank + 1]
    }

    pub fn begin_col(&self) -> usize {
        self.cdist[self.rank]
    }

    pub fn end_col(&self) -> usize {
        self.cdist[self.rank + 1]
    }

    /// Rows held by `rank`.
    pub fn row_range(&self, rank: usize) -> Range<usize> {
        self.rdist[rank]..self.rdist[rank + 1]
    }

    /// Columns held by `rank`.
    pub fn col_range(&self, rank: usize) -> Range<usize> {
        self.cdist[rank]..self.cdist[rank + 1]
    }
}
