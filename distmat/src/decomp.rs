//! LU, LQ, orthogonalisation and interpolative decompositions.
//!
//! Every routine here is collective over the matrix's grid and returns
//! immediately on inactive workers. The factorisation itself runs as a
//! replicated local kernel; norms and diagonal statistics are reduced
//! across the grid.
//!
//! # Memory
//!
//! Each active worker holds a full `m x n` copy of the operand while the
//! kernel runs, so peak memory per worker is `O(m * n)` rather than the
//! `O(m * n / P)` of the block-cyclic storage. The kernels never work on
//! local blocks alone. Use these routines for the moderate front and
//! skeleton sizes of hierarchical solvers, not for matrices that only fit
//! distributed.

use crate::comm::Communicator;
use crate::error::{Error, Result};
use crate::grid::ProcessGrid;
use crate::kernels;
use crate::matrix::{assign_owned, replicate, BlockCyclic, BlockCyclicMut, DistributedMatrix};
use crate::pblas::{trsm, Diag, Side, Trans, UpLo};
use crate::redistribute::copy;
use crate::scalar::Scalar;

/// Interpolative decomposition `A[:, rest] ≈ A[:, ind] * x` (column
/// version) or `A[rest, :] ≈ x * A[ind, :]` (row version).
#[derive(Debug)]
pub struct Interpolative<'g, T: Scalar, C: Communicator> {
    /// `rank x (n - rank)` interpolation matrix (transposed for rows).
    pub x: DistributedMatrix<'g, T, C>,
    /// Pivots of the locally owned columns (rows for [`id_row`]) in
    /// interchange form, `lcols + NB` entries.
    ///
    /// [`id_row`]: DistributedMatrix::id_row
    pub piv: Vec<usize>,
    /// Global indices of the selected skeleton, in pivot order.
    pub ind: Vec<usize>,
    pub rank: usize,
}

/// Rebuild a global interchange vector of length `n` from the local
/// parts held by each worker. Entries no worker reports stay identity.
pub(crate) fn assemble_pivots<C: Communicator>(
    comm: &C,
    n: usize,
    piv: &[usize],
    nlocal: usize,
    local_to_global: impl Fn(usize) -> usize,
) -> Vec<usize> {
    assert!(piv.len() >= nlocal, "pivot vector shorter than the local extent");
    let pairs: Vec<(usize, usize)> = (0..nlocal).map(|l| (local_to_global(l), piv[l])).collect();
    let mut full: Vec<usize> = (0..n).collect();
    for (g, p) in comm.all_gather(pairs).into_iter().flatten() {
        full[g] = p;
    }
    full
}

impl<'g, T: Scalar, C: Communicator + 'g> DistributedMatrix<'g, T, C> {
    fn empty_like(&self, m: usize, n: usize) -> Self {
        Self::new(self.grid(), m, n)
    }

    /// LU factorisation with partial pivoting, in place.
    ///
    /// Returns `lrows + MB` pivot entries; entry `l < lrows` is the
    /// global row interchanged with global row `rowl2g(l)`.
    pub fn lu(&mut self) -> Result<Vec<usize>> {
        if !self.active() {
            return Ok(Vec::new());
        }
        let mut full = replicate(self);
        let (ipiv, info) = kernels::getrf(&mut full);
        assign_owned(self, &full);
        if info != 0 {
            return self
                .grid()
                .config()
                .failure_policy
                .handle(Error::NumericalFailure { routine: "getrf", info });
        }
        let mut piv = vec![0; self.lrows() + self.mb()];
        for (l, p) in piv.iter_mut().enumerate().take(self.lrows()) {
            let g = self.rowl2g(l);
            *p = ipiv.get(g).copied().unwrap_or(g);
        }
        tracing::debug!(rows = self.rows(), cols = self.cols(), "lu factorisation complete");
        Ok(piv)
    }

    /// Solve `A X = B` with the factors and pivots produced by
    /// [`lu`](Self::lu). Returns `X` with `B`'s layout.
    pub fn solve(&self, b: &Self, piv: &[usize]) -> Result<Self> {
        let grid = self.grid();
        let Some(comm) = grid.comm() else {
            return Ok(Self::with_blocks(b.grid(), b.rows(), b.cols(), b.mb(), b.nb()));
        };
        let n = self.rows();
        debug_assert_eq!(n, self.cols(), "solve needs a square factorisation");
        debug_assert_eq!(n, b.rows());

        let ipiv = assemble_pivots(comm, n, piv, self.lrows(), |l| self.rowl2g(l));
        let lu = replicate(self);
        if let Some(i) = (0..n).find(|&i| lu[[i, i]] == T::zero()) {
            return grid
                .config()
                .failure_policy
                .handle(Error::NumericalFailure { routine: "getrs", info: i + 1 });
        }
        let mut rhs = replicate(b);
        kernels::getrs(&lu, &ipiv, &mut rhs);
        let mut x = Self::with_blocks(b.grid(), b.rows(), b.cols(), b.mb(), b.nb());
        assign_owned(&mut x, &rhs);
        Ok(x)
    }

    /// LQ factorisation `A = L[:, :k] * Q[:k, :]`, `k = min(m, n)`.
    ///
    /// Returns `L` (`m x m`, lower triangular) and the full orthogonal
    /// `Q` (`n x n`).
    pub fn lq(&self) -> Result<(Self, Self)> {
        let (m, n) = (self.rows(), self.cols());
        let mut l = self.empty_like(m, m);
        let mut q = self.empty_like(n, n);
        let Some(comm) = self.grid().comm() else {
            return Ok((l, q));
        };
        // padded copy so every row of Q has room in the factored matrix
        let mut tmp = self.empty_like(m.max(n), n);
        copy(m, n, self, 0, 0, &mut tmp, 0, 0, comm);
        let full = replicate(&tmp);
        let top = if m == 0 || n == 0 {
            mdarray::DTensor::<T, 2>::from_elem([m, n], T::zero())
        } else {
            mdarray::DTensor::<T, 2>::from_fn([m, n], |idx| full[[idx[0], idx[1]]])
        };
        let (lf, qf) = kernels::lq(&top);
        assign_owned(&mut l, &lf);
        assign_owned(&mut q, &qf);
        Ok((l, q))
    }

    /// Replace the matrix by the orthonormal factor `Q` of its QR
    /// factorisation.
    ///
    /// Returns the largest and smallest `|R[i, i]|`, reduced over the
    /// grid. Columns beyond the row count are zeroed. On inactive workers
    /// the reduction identities are returned.
    pub fn orthogonalize(&mut self) -> Result<(T, T)> {
        let mut r_max = T::min_positive_value();
        let mut r_min = T::max_value();
        let Some(comm) = self.grid().comm() else {
            return Ok((r_max, r_min));
        };
        let (m, n) = (self.rows(), self.cols());
        let minmn = m.min(n);
        let mut full = replicate(self);
        let taus = kernels::geqrf(&mut full, minmn);
        for i in 0..minmn {
            if self.is_local(i, i) {
                let d = full[[i, i]].abs();
                r_max = r_max.max(d);
                r_min = r_min.min(d);
            }
        }
        let r_max = comm.all_reduce(r_max, |a, b| a.max(b));
        let r_min = comm.all_reduce(r_min, |a, b| a.min(b));

        kernels::orgqr(&mut full, minmn, &taus);
        assign_owned(self, &full);
        if n > m {
            self.view_mut(m, n - m, 0, m).zero();
        }
        tracing::debug!(%r_max, %r_min, "orthogonalized");
        Ok((r_max, r_min))
    }

    /// Column interpolative decomposition.
    ///
    /// The matrix is overwritten by its pivoted QR factors. The rank is
    /// the number of pivots with `|R[i, i]| > max(rel_tol * |R[0, 0]|, abs_tol)`.
    pub fn id_column(&mut self, rel_tol: T, abs_tol: T) -> Result<Interpolative<'g, T, C>> {
        let grid = self.grid();
        let Some(comm) = grid.comm() else {
            return Ok(Interpolative {
                x: self.empty_like(0, 0),
                piv: Vec::new(),
                ind: Vec::new(),
                rank: 0,
            });
        };
        let n = self.cols();
        let mut full = replicate(self);
        let qr = kernels::geqp3(&mut full, rel_tol, abs_tol);
        assign_owned(self, &full);
        let rank = qr.rank;

        let mut piv = vec![0; self.lcols() + self.nb()];
        for (l, p) in piv.iter_mut().enumerate().take(self.lcols()) {
            *p = qr.ipiv[self.coll2g(l)];
        }
        let ind = qr.jpvt[..rank].to_vec();

        let mut x = self.empty_like(rank, n - rank);
        copy(rank, n - rank, self, 0, rank, &mut x, 0, 0, comm);
        trsm(
            Side::Left,
            UpLo::Upper,
            Trans::N,
            Diag::NonUnit,
            T::one(),
            &self.view(rank, rank, 0, 0),
            &mut x,
        );
        tracing::debug!(rows = self.rows(), cols = n, rank, "column ID");
        Ok(Interpolative { x, piv, ind, rank })
    }

    /// Row interpolative decomposition through the transposed grid.
    ///
    /// `grid_t` must be this grid with coordinates swapped (see
    /// [`ProcessGrid::transposed`]) so the transpose is a local copy.
    /// The matrix itself is left unchanged; `x` lives on this grid.
    pub fn id_row(&self, rel_tol: T, abs_tol: T, grid_t: &ProcessGrid<C>) -> Result<Interpolative<'g, T, C>> {
        let grid = self.grid();
        let Some(comm) = grid.comm() else {
            return Ok(Interpolative {
                x: self.empty_like(0, 0),
                piv: Vec::new(),
                ind: Vec::new(),
                rank: 0,
            });
        };
        if grid_t.nprows() != grid.npcols() || grid_t.npcols() != grid.nprows() {
            return Err(Error::config(format!(
                "id_row: transposed grid is {}x{}, expected {}x{}",
                grid_t.nprows(),
                grid_t.npcols(),
                grid.npcols(),
                grid.nprows()
            )));
        }
        let swapped = grid_t.coords() == Some((grid.pcol(), grid.prow()));
        if !comm.all_reduce(swapped, |a, b| a && b) {
            return Err(Error::config("id_row: grid_t does not swap the coordinates of this grid"));
        }

        let mut this_t = DistributedMatrix::with_layout(
            grid_t,
            self.cols(),
            self.rows(),
            self.nb(),
            self.mb(),
            self.desc().csrc(),
            self.desc().rsrc(),
        );
        transpose_local(self, &mut this_t);
        let res = this_t.id_column(rel_tol, abs_tol)?;

        let mut x = DistributedMatrix::with_layout(
            grid,
            res.x.cols(),
            res.x.rows(),
            res.x.nb(),
            res.x.mb(),
            res.x.desc().csrc(),
            res.x.desc().rsrc(),
        );
        transpose_local(&res.x, &mut x);
        Ok(Interpolative {
            x,
            piv: res.piv,
            ind: res.ind,
            rank: res.rank,
        })
    }
}

/// Transpose between two matrices whose grids have swapped coordinates
/// and swapped layouts, touching only local memory.
fn transpose_local<'a, 'b, A, B>(a: &A, b: &mut B)
where
    A: BlockCyclic<'a>,
    B: BlockCyclicMut<'b, Scalar = A::Scalar>,
{
    debug_assert_eq!((a.lrows(), a.lcols()), (b.lcols(), b.lrows()));
    for lc in 0..a.lcols() {
        for lr in 0..a.lrows() {
            b.set(lc, lr, a.get(lr, lc));
        }
    }
}
