//! Distributed BLAS-class operations.
//!
//! Each routine replicates its operands on the grid, runs the local
//! kernel and keeps the owned part of the result. Operands must live on
//! the same grid; all routines are collective over it and do nothing on
//! inactive workers.
//!
//! Replication means every active worker holds full copies of all
//! operands: `gemm` on `m x k` and `k x n` inputs needs
//! `O(m * k + k * n + m * n)` memory per worker, independent of the grid
//! size. [`vconcat`] is the exception and moves only owned blocks.

use num_traits::{One, Zero};

use crate::comm::Communicator;
use crate::grid::ProcessGrid;
use crate::kernels;
use crate::matrix::{assign_owned, replicate, BlockCyclic, BlockCyclicMut, DistributedMatrix};
use crate::redistribute::copy;
use crate::scalar::Scalar;

pub use crate::kernels::{Diag, Side, Trans, UpLo};

fn op_shape<'g, A: BlockCyclic<'g>>(a: &A, trans: Trans) -> (usize, usize) {
    match trans {
        Trans::N => (a.rows(), a.cols()),
        Trans::T => (a.cols(), a.rows()),
    }
}

/// `c = alpha * op(a) * op(b) + beta * c`
#[allow(clippy::too_many_arguments)]
pub fn gemm<'g, A, B, M>(ta: Trans, tb: Trans, alpha: A::Scalar, a: &A, b: &B, beta: A::Scalar, c: &mut M)
where
    A: BlockCyclic<'g>,
    B: BlockCyclic<'g, Scalar = A::Scalar, Comm = A::Comm>,
    M: BlockCyclicMut<'g, Scalar = A::Scalar, Comm = A::Comm>,
{
    if !a.active() {
        return;
    }
    let (am, ak) = op_shape(a, ta);
    let (bk, bn) = op_shape(b, tb);
    debug_assert!(
        am == c.rows() && bn == c.cols() && ak == bk,
        "gemm: op(a) is {am}x{ak}, op(b) is {bk}x{bn}, c is {}x{}",
        c.rows(),
        c.cols()
    );
    debug_assert!(std::ptr::eq(a.grid(), c.grid()) && std::ptr::eq(b.grid(), c.grid()));

    let fa = replicate(a);
    let fb = replicate(b);
    let mut fc = if beta == A::Scalar::zero() {
        mdarray::DTensor::<A::Scalar, 2>::from_elem([c.rows(), c.cols()], A::Scalar::zero())
    } else {
        replicate(c)
    };
    kernels::gemm(ta, tb, alpha, &fa, &fb, beta, &mut fc);
    assign_owned(c, &fc);
}

/// `y = alpha * op(a) * x + beta * y` for single-column `x` and `y`.
pub fn gemv<'g, A, X, Y>(ta: Trans, alpha: A::Scalar, a: &A, x: &X, beta: A::Scalar, y: &mut Y)
where
    A: BlockCyclic<'g>,
    X: BlockCyclic<'g, Scalar = A::Scalar, Comm = A::Comm>,
    Y: BlockCyclicMut<'g, Scalar = A::Scalar, Comm = A::Comm>,
{
    debug_assert!(x.cols() == 1 && y.cols() == 1, "gemv: x and y must be single columns");
    gemm(ta, Trans::N, alpha, a, x, beta, y);
}

/// Solve `op(a) * x = alpha * b` or `x * op(a) = alpha * b` with
/// triangular `a`, overwriting `b`.
pub fn trsm<'g, A, B>(side: Side, uplo: UpLo, trans: Trans, diag: Diag, alpha: A::Scalar, a: &A, b: &mut B)
where
    A: BlockCyclic<'g>,
    B: BlockCyclicMut<'g, Scalar = A::Scalar, Comm = A::Comm>,
{
    if !a.active() {
        return;
    }
    debug_assert_eq!(a.rows(), a.cols(), "trsm: triangular operand must be square");
    debug_assert!(match side {
        Side::Left => a.rows() == b.rows(),
        Side::Right => a.cols() == b.cols(),
    });
    let fa = replicate(a);
    let mut fb = replicate(b);
    kernels::trsm(side, uplo, trans, diag, alpha, &fa, &mut fb);
    assign_owned(b, &fb);
}

/// Solve `op(a) * x = b` for a single column `b`, overwriting `b`.
pub fn trsv<'g, A, B>(uplo: UpLo, trans: Trans, diag: Diag, a: &A, b: &mut B)
where
    A: BlockCyclic<'g>,
    B: BlockCyclicMut<'g, Scalar = A::Scalar, Comm = A::Comm>,
{
    debug_assert_eq!(b.cols(), 1, "trsv: right-hand side must be a single column");
    trsm(Side::Left, uplo, trans, diag, A::Scalar::one(), a, b);
}

/// Stack the leading `arows x cols` block of `a` on top of the leading
/// `brows x cols` block of `b`, on `grid`. Collective over `ctx`, which
/// must span the grids of `a`, `b` and `grid`.
#[allow(clippy::too_many_arguments)]
pub fn vconcat<'a, 'b, 'h, T, C, A, B>(
    cols: usize,
    arows: usize,
    brows: usize,
    a: &A,
    b: &B,
    grid: &'h ProcessGrid<C>,
    ctx: &C,
) -> DistributedMatrix<'h, T, C>
where
    T: Scalar,
    C: Communicator + 'h + 'a + 'b,
    A: BlockCyclic<'a, Scalar = T, Comm = C>,
    B: BlockCyclic<'b, Scalar = T, Comm = C>,
{
    let mut out = DistributedMatrix::new(grid, arows + brows, cols);
    copy(arows, cols, a, 0, 0, &mut out, 0, 0, ctx);
    copy(brows, cols, b, 0, 0, &mut out, arows, 0, ctx);
    out
}
