//! Block-cyclically distributed dense matrices.
//!
//! [`BlockCyclic`] is the read-only capability shared by owning matrices
//! and views: index maps, the locally owned rectangle, norms, gathering
//! and printing. [`BlockCyclicMut`] adds in-place updates. Both are
//! implemented by [`DistributedMatrix`], [`DistributedMatrixView`] and
//! [`DistributedMatrixViewMut`].
//!
//! Local storage is column-major with leading dimension `lrows`.

mod view;

pub use view::{DistributedMatrixView, DistributedMatrixViewMut};

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use mdarray::DTensor;
use num_traits::{Float, One, Zero};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

use crate::comm::Communicator;
use crate::descriptor::Descriptor;
use crate::error::{Error, Result};
use crate::grid::ProcessGrid;
use crate::index::BlockMap;
use crate::redistribute::{copy, copy_transposed};
use crate::scalar::Scalar;
use crate::extract;
use crate::utils::permutation_from_interchanges;

const RANDOM_SEED_SALT: u64 = 0x2545_F491_4F6C_DD1D;

/// Read access to a block-cyclic matrix, owning or not.
///
/// Global indices are relative to the matrix (or view) itself; the
/// `row_offset`/`col_offset` of a view are added before consulting the
/// owner's index maps.
pub trait BlockCyclic<'g>: Sized {
    type Scalar: Scalar;
    type Comm: Communicator + 'g;

    fn grid(&self) -> &'g ProcessGrid<Self::Comm>;

    /// Descriptor of the underlying storage.
    fn desc(&self) -> &Descriptor;

    fn rows(&self) -> usize;

    fn cols(&self) -> usize;

    fn row_offset(&self) -> usize {
        0
    }

    fn col_offset(&self) -> usize {
        0
    }

    /// Rows stored locally by the owner of the buffer.
    fn lrows(&self) -> usize;

    /// Columns stored locally by the owner of the buffer.
    fn lcols(&self) -> usize;

    /// Local buffer of the owner, column-major.
    fn data(&self) -> &[Self::Scalar];

    fn active(&self) -> bool {
        self.grid().active()
    }

    fn mb(&self) -> usize {
        self.desc().mb()
    }

    fn nb(&self) -> usize {
        self.desc().nb()
    }

    fn ld(&self) -> usize {
        self.lrows()
    }

    fn row_map(&self) -> BlockMap {
        BlockMap::new(self.mb(), self.grid().nprows(), self.desc().rsrc())
    }

    fn col_map(&self) -> BlockMap {
        BlockMap::new(self.nb(), self.grid().npcols(), self.desc().csrc())
    }

    fn rowl2g(&self, l: usize) -> usize {
        self.row_map().local_to_global(l, self.grid().prow()) - self.row_offset()
    }

    fn coll2g(&self, l: usize) -> usize {
        self.col_map().local_to_global(l, self.grid().pcol()) - self.col_offset()
    }

    fn rowg2l(&self, g: usize) -> usize {
        self.row_map().global_to_local(g + self.row_offset())
    }

    fn colg2l(&self, g: usize) -> usize {
        self.col_map().global_to_local(g + self.col_offset())
    }

    /// Grid row owning global row `g`.
    fn rowg2p(&self, g: usize) -> usize {
        self.row_map().owner_of(g + self.row_offset())
    }

    /// Grid column owning global column `g`.
    fn colg2p(&self, g: usize) -> usize {
        self.col_map().owner_of(g + self.col_offset())
    }

    fn is_local(&self, r: usize, c: usize) -> bool {
        self.active()
            && self.rowg2p(r) == self.grid().prow()
            && self.colg2p(c) == self.grid().pcol()
    }

    /// Half-open local index ranges `(rlo, rhi, clo, chi)` of the entries
    /// this worker owns inside the matrix. Empty when inactive.
    fn lranges(&self) -> (usize, usize, usize, usize) {
        if !self.active() {
            return (0, 0, 0, 0);
        }
        let (prow, pcol) = (self.grid().prow(), self.grid().pcol());
        let (rmap, cmap) = (self.row_map(), self.col_map());
        let (i, j) = (self.row_offset(), self.col_offset());
        (
            rmap.local_len(i, prow),
            rmap.local_len(i + self.rows(), prow),
            cmap.local_len(j, pcol),
            cmap.local_len(j + self.cols(), pcol),
        )
    }

    /// Local entry `(lr, lc)` of the owner's buffer.
    #[inline]
    fn get(&self, lr: usize, lc: usize) -> Self::Scalar {
        self.data()[lr + self.ld() * lc]
    }

    /// Entry at global `(r, c)`.
    ///
    /// # Panics
    ///
    /// If `(r, c)` is not owned by this worker.
    fn global(&self, r: usize, c: usize) -> Self::Scalar {
        assert!(self.is_local(r, c), "entry ({r}, {c}) is not stored on this worker");
        self.get(self.rowg2l(r), self.colg2l(c))
    }

    /// Entry at global `(r, c)`, broadcast from its owner to the whole
    /// grid. Collective over the grid; zero on inactive workers.
    fn all_global(&self, r: usize, c: usize) -> Self::Scalar {
        let Some(comm) = self.grid().comm() else {
            return Self::Scalar::zero();
        };
        let owner = self.grid().grid_rank_of(self.rowg2p(r), self.colg2p(c));
        let value = if self.is_local(r, c) {
            vec![self.global(r, c)]
        } else {
            Vec::new()
        };
        comm.broadcast(owner, value)[0]
    }

    /// Frobenius norm.
    fn norm(&self) -> Self::Scalar {
        self.norm_frobenius()
    }

    /// Maximum absolute column sum. `-1` on inactive workers.
    fn norm1(&self) -> Self::Scalar {
        let Some(comm) = self.grid().comm() else {
            return -Self::Scalar::one();
        };
        let (rlo, rhi, clo, chi) = self.lranges();
        let mut sums = vec![Self::Scalar::zero(); self.cols()];
        for lc in clo..chi {
            let gc = self.coll2g(lc);
            for lr in rlo..rhi {
                sums[gc] += self.get(lr, lc).abs();
            }
        }
        comm.all_reduce_sum(sums)
            .into_iter()
            .fold(Self::Scalar::zero(), Self::Scalar::max)
    }

    /// Maximum absolute row sum. `-1` on inactive workers.
    fn norm_inf(&self) -> Self::Scalar {
        let Some(comm) = self.grid().comm() else {
            return -Self::Scalar::one();
        };
        let (rlo, rhi, clo, chi) = self.lranges();
        let mut sums = vec![Self::Scalar::zero(); self.rows()];
        for lc in clo..chi {
            for lr in rlo..rhi {
                sums[self.rowl2g(lr)] += self.get(lr, lc).abs();
            }
        }
        comm.all_reduce_sum(sums)
            .into_iter()
            .fold(Self::Scalar::zero(), Self::Scalar::max)
    }

    /// Frobenius norm. `-1` on inactive workers.
    fn norm_frobenius(&self) -> Self::Scalar {
        let Some(comm) = self.grid().comm() else {
            return -Self::Scalar::one();
        };
        let (rlo, rhi, clo, chi) = self.lranges();
        let mut sum = Self::Scalar::zero();
        for lc in clo..chi {
            for lr in rlo..rhi {
                let v = self.get(lr, lc);
                sum += v * v;
            }
        }
        comm.all_reduce(sum, |a, b| a + b).sqrt()
    }

    /// Bytes of local storage.
    fn memory(&self) -> usize {
        self.data().len() * Self::Scalar::bytes()
    }

    /// Bytes of storage summed over the grid. Zero on inactive workers.
    fn total_memory(&self) -> usize {
        match self.grid().comm() {
            Some(comm) => comm.all_reduce(self.memory(), |a, b| a + b),
            None => 0,
        }
    }

    /// Entries stored locally. Dense storage keeps every owned entry,
    /// zero or not.
    fn nonzeros(&self) -> usize {
        let (rlo, rhi, clo, chi) = self.lranges();
        (rhi - rlo) * (chi - clo)
    }

    /// Entries stored over the whole grid, `rows * cols`. Zero on
    /// inactive workers.
    fn total_nonzeros(&self) -> usize {
        if self.active() {
            self.rows() * self.cols()
        } else {
            0
        }
    }

    /// Collect the whole matrix on the grid master. Collective over the
    /// grid; `None` everywhere else.
    fn gather(&self) -> Option<DTensor<Self::Scalar, 2>> {
        let grid = self.grid();
        let comm = grid.comm()?;
        let mut root: DistributedMatrix<'g, Self::Scalar, Self::Comm> =
            DistributedMatrix::single_owner(grid, self.rows(), self.cols(), 0, 0);
        copy(self.rows(), self.cols(), self, 0, 0, &mut root, 0, 0, comm);
        grid.is_master().then(|| root.into_dense())
    }

    /// Copy of the whole matrix on every worker of the spanning
    /// communicator, active or not. Collective over `comm_all()`.
    fn all_gather(&self) -> DTensor<Self::Scalar, 2> {
        let grid = self.grid();
        let all = grid.comm_all();
        let (m, n) = (self.rows(), self.cols());
        let mut root: DistributedMatrix<'g, Self::Scalar, Self::Comm> =
            DistributedMatrix::single_owner(grid, m, n, 0, 0);
        copy(m, n, self, 0, 0, &mut root, 0, 0, all);
        let root_rank = grid.all_rank_of(0, 0);
        let data = if all.rank() == root_rank {
            root.data
        } else {
            Vec::new()
        };
        let data = all.broadcast(root_rank, data);
        column_major_to_dense(m, n, &data)
    }

    /// Dense copy of the matrix on every worker. Same as [`all_gather`].
    ///
    /// [`all_gather`]: BlockCyclic::all_gather
    fn dense(&self) -> DTensor<Self::Scalar, 2> {
        self.all_gather()
    }

    /// `Aᵀ` on the same grid with swapped block sizes.
    fn transpose(&self) -> DistributedMatrix<'g, Self::Scalar, Self::Comm> {
        let grid = self.grid();
        let mut out = DistributedMatrix::with_blocks(grid, self.cols(), self.rows(), self.nb(), self.mb());
        if let Some(comm) = grid.comm() {
            copy_transposed(self.rows(), self.cols(), self, 0, 0, &mut out, 0, 0, comm);
        }
        out
    }

    /// Rows `rows` (in that order, repeats allowed) of this matrix.
    fn extract_rows(&self, rows: &[usize]) -> DistributedMatrix<'g, Self::Scalar, Self::Comm> {
        extract::extract_rows(self, rows)
    }

    /// Columns `cols` (in that order, repeats allowed) of this matrix.
    fn extract_cols(&self, cols: &[usize]) -> DistributedMatrix<'g, Self::Scalar, Self::Comm> {
        extract::extract_cols(self, cols)
    }

    /// The submatrix at rows `rows` and columns `cols`.
    fn extract(&self, rows: &[usize], cols: &[usize]) -> DistributedMatrix<'g, Self::Scalar, Self::Comm> {
        extract::extract_rows(self, rows).extract_cols(cols)
    }

    /// Write the matrix as `name = [ ... ];` from the grid master.
    /// Collective over the grid. `width` pads every entry.
    fn write_to<W: Write>(&self, name: &str, out: &mut W, width: Option<usize>) -> Result<()> {
        match self.gather() {
            Some(dense) => write_dense(out, name, &dense, width),
            None => Ok(()),
        }
    }

    /// Print to standard output from the grid master.
    fn print(&self, name: &str) {
        let stdout = std::io::stdout();
        if let Err(e) = self.write_to(name, &mut stdout.lock(), None) {
            tracing::warn!(error = %e, name, "failed to print matrix");
        }
    }

    /// Write to `path` from the grid master. Other workers do not touch
    /// the file system.
    fn print_to_file<P: AsRef<Path>>(&self, name: &str, path: P, width: Option<usize>) -> Result<()> {
        let Some(dense) = self.gather() else {
            return Ok(());
        };
        let mut out = BufWriter::new(File::create(path)?);
        write_dense(&mut out, name, &dense, width)?;
        out.flush()?;
        Ok(())
    }
}

fn write_dense<T: Scalar, W: Write>(
    out: &mut W,
    name: &str,
    dense: &DTensor<T, 2>,
    width: Option<usize>,
) -> Result<()> {
    let (m, n) = *dense.shape();
    writeln!(out, "{name} = [  % {m}x{n}")?;
    for i in 0..m {
        for j in 0..n {
            match width {
                Some(w) => write!(out, "{:>w$} ", dense[[i, j]], w = w)?,
                None => write!(out, "{} ", dense[[i, j]])?,
            }
        }
        writeln!(out)?;
    }
    writeln!(out, "];")?;
    Ok(())
}

/// In-place access to a block-cyclic matrix.
pub trait BlockCyclicMut<'g>: BlockCyclic<'g> {
    fn data_mut(&mut self) -> &mut [Self::Scalar];

    #[inline]
    fn get_mut(&mut self, lr: usize, lc: usize) -> &mut Self::Scalar {
        let ld = self.ld();
        &mut self.data_mut()[lr + ld * lc]
    }

    #[inline]
    fn set(&mut self, lr: usize, lc: usize, value: Self::Scalar) {
        *self.get_mut(lr, lc) = value;
    }

    /// # Panics
    ///
    /// If `(r, c)` is not owned by this worker.
    fn global_mut(&mut self, r: usize, c: usize) -> &mut Self::Scalar {
        assert!(self.is_local(r, c), "entry ({r}, {c}) is not stored on this worker");
        let (lr, lc) = (self.rowg2l(r), self.colg2l(c));
        self.get_mut(lr, lc)
    }

    /// Set global `(r, c)` if this worker owns it, otherwise do nothing.
    fn set_global(&mut self, r: usize, c: usize, value: Self::Scalar) {
        if self.is_local(r, c) {
            *self.global_mut(r, c) = value;
        }
    }

    /// Replace every owned entry `a` at global `(r, c)` by `f(r, c, a)`.
    fn apply_local<F>(&mut self, mut f: F)
    where
        F: FnMut(usize, usize, Self::Scalar) -> Self::Scalar,
    {
        let (rlo, rhi, clo, chi) = self.lranges();
        let grows: Vec<usize> = (rlo..rhi).map(|l| self.rowl2g(l)).collect();
        let ld = self.ld();
        for lc in clo..chi {
            let gc = self.coll2g(lc);
            let column = &mut self.data_mut()[ld * lc..];
            for (lr, &gr) in (rlo..rhi).zip(&grows) {
                column[lr] = f(gr, gc, column[lr]);
            }
        }
    }

    fn zero(&mut self) {
        self.fill(Self::Scalar::zero());
    }

    fn fill(&mut self, value: Self::Scalar) {
        self.apply_local(|_, _, _| value);
    }

    /// Identity on the leading square part, zero elsewhere.
    fn eye(&mut self) {
        let (zero, one) = (Self::Scalar::zero(), Self::Scalar::one());
        self.apply_local(|r, c, _| if r == c { one } else { zero });
    }

    /// Add `sigma` to the diagonal.
    fn shift(&mut self, sigma: Self::Scalar) {
        self.apply_local(|r, c, a| if r == c { a + sigma } else { a });
    }

    fn scale(&mut self, alpha: Self::Scalar) {
        self.apply_local(|_, _, a| a * alpha);
    }

    /// Standard-normal entries from a generator seeded by this worker's
    /// grid coordinates, so the result depends only on the grid shape.
    fn random(&mut self) {
        let Some((prow, pcol)) = self.grid().coords() else {
            return;
        };
        let seed = (((prow as u64) << 32) | pcol as u64) ^ RANDOM_SEED_SALT;
        self.random_with(&mut StdRng::seed_from_u64(seed));
    }

    fn random_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.apply_local(|_, _, _| {
            let z: f64 = StandardNormal.sample(&mut *rng);
            Self::Scalar::cast(z)
        });
    }

    /// `self += b` for a matrix with the same shape and distribution.
    fn add<B>(&mut self, b: &B)
    where
        B: BlockCyclic<'g, Scalar = Self::Scalar, Comm = Self::Comm>,
    {
        self.scaled_add(Self::Scalar::one(), b);
    }

    /// `self += alpha * b` for a matrix with the same shape and
    /// distribution.
    fn scaled_add<B>(&mut self, alpha: Self::Scalar, b: &B)
    where
        B: BlockCyclic<'g, Scalar = Self::Scalar, Comm = Self::Comm>,
    {
        debug_assert_eq!((self.rows(), self.cols()), (b.rows(), b.cols()));
        let (rlo, rhi, clo, chi) = self.lranges();
        let (brlo, brhi, bclo, bchi) = b.lranges();
        debug_assert_eq!((rhi - rlo, chi - clo), (brhi - brlo, bchi - bclo));
        for lc in clo..chi {
            for lr in rlo..rhi {
                let v = b.get(brlo + lr - rlo, bclo + lc - clo);
                *self.get_mut(lr, lc) += alpha * v;
            }
        }
    }

    /// Distribute a dense matrix held by the grid master. Collective over
    /// the grid; `dense` is only read on the master.
    ///
    /// # Panics
    ///
    /// On the master, if `dense` is missing or has the wrong shape.
    fn scatter(&mut self, dense: Option<&DTensor<Self::Scalar, 2>>) {
        let grid = self.grid();
        let Some(comm) = grid.comm() else {
            return;
        };
        let (m, n) = (self.rows(), self.cols());
        let mut root: DistributedMatrix<'g, Self::Scalar, Self::Comm> =
            DistributedMatrix::single_owner(grid, m, n, 0, 0);
        if grid.is_master() {
            let dense = match dense {
                Some(d) => d,
                None => panic!("scatter needs the dense matrix on the grid master"),
            };
            assert_eq!(*dense.shape(), (m, n), "scatter: shape mismatch");
            for j in 0..n {
                for i in 0..m {
                    root.data[i + m * j] = dense[[i, j]];
                }
            }
        }
        copy(m, n, &root, 0, 0, self, 0, 0, comm);
    }
}

/// Replicate `a` on every worker of its grid. Collective over the grid.
pub(crate) fn replicate<'g, A: BlockCyclic<'g>>(a: &A) -> DTensor<A::Scalar, 2> {
    let grid = a.grid();
    let (m, n) = (a.rows(), a.cols());
    let Some(comm) = grid.comm() else {
        return column_major_to_dense(0, 0, &[]);
    };
    let mut root: DistributedMatrix<'g, A::Scalar, A::Comm> = DistributedMatrix::single_owner(grid, m, n, 0, 0);
    copy(m, n, a, 0, 0, &mut root, 0, 0, comm);
    let data = if grid.is_master() { root.data } else { Vec::new() };
    let data = comm.broadcast(0, data);
    column_major_to_dense(m, n, &data)
}

/// `m x n` tensor from column-major `data` with leading dimension `m`.
/// Empty shapes never read `data`.
pub(crate) fn column_major_to_dense<T: Scalar>(m: usize, n: usize, data: &[T]) -> DTensor<T, 2> {
    if m == 0 || n == 0 {
        return DTensor::<T, 2>::from_elem([m, n], T::zero());
    }
    debug_assert!(data.len() >= m * n);
    DTensor::<T, 2>::from_fn([m, n], |idx| data[idx[0] + m * idx[1]])
}

/// Overwrite the locally owned entries of `b` from a replicated copy.
pub(crate) fn assign_owned<'g, B: BlockCyclicMut<'g>>(b: &mut B, full: &DTensor<B::Scalar, 2>) {
    b.apply_local(|r, c, _| full[[r, c]]);
}

/// Owning distributed matrix.
pub struct DistributedMatrix<'g, T: Scalar, C: Communicator> {
    grid: &'g ProcessGrid<C>,
    data: Vec<T>,
    lrows: usize,
    lcols: usize,
    desc: Descriptor,
}

impl<'g, T: Scalar, C: Communicator> DistributedMatrix<'g, T, C> {
    /// Zero `m x n` matrix with the grid's default block sizes.
    pub fn new(grid: &'g ProcessGrid<C>, m: usize, n: usize) -> Self {
        let config = grid.config();
        Self::with_blocks(grid, m, n, config.mb, config.nb)
    }

    pub fn with_blocks(grid: &'g ProcessGrid<C>, m: usize, n: usize, mb: usize, nb: usize) -> Self {
        Self::with_layout(grid, m, n, mb, nb, 0, 0)
    }

    /// Zero matrix whose first block row and column live on grid
    /// position `(rsrc, csrc)`. Block sizes below one are raised to one.
    pub fn with_layout(
        grid: &'g ProcessGrid<C>,
        m: usize,
        n: usize,
        mb: usize,
        nb: usize,
        rsrc: usize,
        csrc: usize,
    ) -> Self {
        let (mb, nb) = (mb.max(1), nb.max(1));
        assert!(
            rsrc < grid.nprows() && csrc < grid.npcols(),
            "source position ({rsrc}, {csrc}) outside the grid"
        );
        let (lrows, lcols) = match grid.coords() {
            Some((prow, pcol)) => (
                BlockMap::new(mb, grid.nprows(), rsrc).local_len(m, prow),
                BlockMap::new(nb, grid.npcols(), csrc).local_len(n, pcol),
            ),
            None => (0, 0),
        };
        let desc = Descriptor::new(m, n, mb, nb, rsrc, csrc, grid.ctxt(), lrows.max(1));
        Self {
            grid,
            data: vec![T::zero(); lrows * lcols],
            lrows,
            lcols,
            desc,
        }
    }

    /// Matrix stored entirely on grid position `(prow, pcol)`.
    pub fn single_owner(grid: &'g ProcessGrid<C>, m: usize, n: usize, prow: usize, pcol: usize) -> Self {
        Self::with_layout(grid, m, n, m, n, prow, pcol)
    }

    pub fn from_descriptor(grid: &'g ProcessGrid<C>, desc: Descriptor) -> Result<Self> {
        desc.validate(grid.nprows(), grid.npcols(), 0)?;
        Ok(Self::with_layout(
            grid,
            desc.rows(),
            desc.cols(),
            desc.mb(),
            desc.nb(),
            desc.rsrc(),
            desc.csrc(),
        ))
    }

    /// Wrap a dense matrix on a 1x1 grid.
    pub fn from_dense(grid: &'g ProcessGrid<C>, dense: &DTensor<T, 2>) -> Result<Self> {
        if grid.npactives() != 1 {
            return Err(Error::config(format!(
                "a dense matrix can only be wrapped on a 1x1 grid, not {}x{}",
                grid.nprows(),
                grid.npcols()
            )));
        }
        let (m, n) = *dense.shape();
        let mut out = Self::single_owner(grid, m, n, 0, 0);
        if grid.active() {
            for j in 0..n {
                for i in 0..m {
                    out.data[i + m * j] = dense[[i, j]];
                }
            }
        }
        Ok(out)
    }

    /// Redistribute `source` onto `grid` with default block sizes. Both
    /// grids must come from the same spanning communicator; collective
    /// over it.
    pub fn from_matrix<'h, A>(grid: &'g ProcessGrid<C>, source: &A) -> Self
    where
        A: BlockCyclic<'h, Scalar = T, Comm = C>,
        C: 'h,
    {
        assert_eq!(
            grid.ctxt_all(),
            source.grid().ctxt_all(),
            "grids do not share a spanning communicator"
        );
        let (m, n) = (source.rows(), source.cols());
        let mut out = Self::new(grid, m, n);
        copy(m, n, source, 0, 0, &mut out, 0, 0, grid.comm_all());
        out
    }

    /// Drop the local storage, leaving an empty matrix.
    pub fn clear(&mut self) {
        self.data = Vec::new();
        self.lrows = 0;
        self.lcols = 0;
        self.desc = Descriptor::new(0, 0, self.mb(), self.nb(), 0, 0, self.grid.ctxt(), 1);
    }

    /// Change the global extent, keeping the overlapping entries. New
    /// entries are zero. Local operation.
    pub fn resize(&mut self, m: usize, n: usize) {
        let mut out = Self::with_layout(
            self.grid,
            m,
            n,
            self.mb(),
            self.nb(),
            self.desc.rsrc(),
            self.desc.csrc(),
        );
        for lc in 0..self.lcols.min(out.lcols) {
            for lr in 0..self.lrows.min(out.lrows) {
                out.data[lr + out.lrows * lc] = self.data[lr + self.lrows * lc];
            }
        }
        *self = out;
    }

    /// Append the columns of `b` on the right. Collective over the grid.
    pub fn hconcat(&mut self, b: &Self) -> Result<()> {
        if self.rows() != b.rows() {
            return Err(Error::config(format!(
                "hconcat: row counts differ ({} vs {})",
                self.rows(),
                b.rows()
            )));
        }
        if !std::ptr::eq(self.grid, b.grid) {
            return Err(Error::config("hconcat: matrices live on different grids"));
        }
        let grid = self.grid;
        let (m, n) = (self.rows(), self.cols());
        self.resize(m, n + b.cols());
        if let Some(comm) = grid.comm() {
            copy(m, b.cols(), b, 0, 0, self, 0, n, comm);
        }
        Ok(())
    }

    /// Local block as a dense `lrows x lcols` matrix.
    pub fn into_dense(self) -> DTensor<T, 2> {
        let (m, n) = (self.lrows, self.lcols);
        column_major_to_dense(m, n, &self.data)
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    /// Borrow the `m x n` block starting at `(i, j)`.
    pub fn view(&self, m: usize, n: usize, i: usize, j: usize) -> DistributedMatrixView<'_, 'g, T, C> {
        assert!(
            i + m <= self.rows() && j + n <= self.cols(),
            "view {m}x{n} at ({i}, {j}) exceeds {}x{}",
            self.rows(),
            self.cols()
        );
        DistributedMatrixView::from_parts(self.grid, &self.data, self.lrows, self.lcols, self.desc, m, n, i, j)
    }

    /// Mutably borrow the `m x n` block starting at `(i, j)`.
    pub fn view_mut(&mut self, m: usize, n: usize, i: usize, j: usize) -> DistributedMatrixViewMut<'_, 'g, T, C> {
        assert!(
            i + m <= self.rows() && j + n <= self.cols(),
            "view {m}x{n} at ({i}, {j}) exceeds {}x{}",
            self.rows(),
            self.cols()
        );
        DistributedMatrixViewMut::from_parts(
            self.grid,
            &mut self.data,
            self.lrows,
            self.lcols,
            self.desc,
            m,
            n,
            i,
            j,
        )
    }

    /// Apply the row interchanges of a distributed pivot vector as
    /// returned by [`lu`](Self::lu): row `g` was swapped with `piv[l]`
    /// where `l` is the local index of `g`. `forward` applies them in
    /// increasing order. Collective over the grid.
    pub fn laswp(&mut self, piv: &[usize], forward: bool) {
        let grid = self.grid;
        let Some(comm) = grid.comm() else {
            return;
        };
        let interchanges = crate::decomp::assemble_pivots(comm, self.rows(), piv, self.lrows, |l| self.rowl2g(l));
        let perm = permutation_from_interchanges(&interchanges, forward);
        *self = self.extract_rows(&perm);
    }

    /// Reorder rows: row `i` of the result is row `perm[i]`.
    pub fn permute_rows(&mut self, perm: &[usize]) {
        *self = self.extract_rows(perm);
    }

    /// Reorder columns: column `j` of the result is column `perm[j]`.
    pub fn permute_cols(&mut self, perm: &[usize]) {
        *self = self.extract_cols(perm);
    }
}

impl<'g, T: Scalar, C: Communicator> Clone for DistributedMatrix<'g, T, C> {
    fn clone(&self) -> Self {
        Self {
            grid: self.grid,
            data: self.data.clone(),
            lrows: self.lrows,
            lcols: self.lcols,
            desc: self.desc,
        }
    }
}

impl<'g, T: Scalar, C: Communicator> fmt::Debug for DistributedMatrix<'g, T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributedMatrix")
            .field("rows", &self.rows())
            .field("cols", &self.cols())
            .field("lrows", &self.lrows)
            .field("lcols", &self.lcols)
            .field("desc", &self.desc)
            .finish()
    }
}

impl<'g, T: Scalar, C: Communicator + 'g> BlockCyclic<'g> for DistributedMatrix<'g, T, C> {
    type Scalar = T;
    type Comm = C;

    fn grid(&self) -> &'g ProcessGrid<C> {
        self.grid
    }

    fn desc(&self) -> &Descriptor {
        &self.desc
    }

    fn rows(&self) -> usize {
        self.desc.rows()
    }

    fn cols(&self) -> usize {
        self.desc.cols()
    }

    fn lrows(&self) -> usize {
        self.lrows
    }

    fn lcols(&self) -> usize {
        self.lcols
    }

    fn data(&self) -> &[T] {
        &self.data
    }
}

impl<'g, T: Scalar, C: Communicator + 'g> BlockCyclicMut<'g> for DistributedMatrix<'g, T, C> {
    fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}
