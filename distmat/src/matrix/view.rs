//! Non-owning windows onto distributed matrices.
//!
//! A view is an `m x n` block at offset `(i, j)` of some storage laid out
//! block-cyclically. It shares the owner's descriptor and local buffer;
//! only the global extent and the offset differ.

use std::fmt;

use super::{BlockCyclic, BlockCyclicMut, DistributedMatrix};
use crate::comm::Communicator;
use crate::descriptor::Descriptor;
use crate::grid::ProcessGrid;
use crate::index::BlockMap;
use crate::redistribute::copy;
use crate::scalar::Scalar;

fn local_extent<C: Communicator>(grid: &ProcessGrid<C>, m: usize, n: usize, mb: usize, nb: usize) -> (usize, usize) {
    match grid.coords() {
        Some((prow, pcol)) => (
            BlockMap::new(mb, grid.nprows(), 0).local_len(m, prow),
            BlockMap::new(nb, grid.npcols(), 0).local_len(n, pcol),
        ),
        None => (0, 0),
    }
}

/// Shared window onto a block-cyclic matrix.
pub struct DistributedMatrixView<'a, 'g, T: Scalar, C: Communicator> {
    grid: &'g ProcessGrid<C>,
    data: &'a [T],
    lrows: usize,
    lcols: usize,
    desc: Descriptor,
    rows: usize,
    cols: usize,
    i: usize,
    j: usize,
}

impl<'a, 'g, T: Scalar, C: Communicator> DistributedMatrixView<'a, 'g, T, C> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        grid: &'g ProcessGrid<C>,
        data: &'a [T],
        lrows: usize,
        lcols: usize,
        desc: Descriptor,
        rows: usize,
        cols: usize,
        i: usize,
        j: usize,
    ) -> Self {
        Self {
            grid,
            data,
            lrows,
            lcols,
            desc,
            rows,
            cols,
            i,
            j,
        }
    }

    /// Treat `data` as this worker's local part of an `m x n` matrix with
    /// blocks `mb x nb` whose first block lives on grid position `(0, 0)`.
    ///
    /// # Panics
    ///
    /// If `data` does not hold exactly the local part.
    pub fn from_local_slice(
        grid: &'g ProcessGrid<C>,
        m: usize,
        n: usize,
        mb: usize,
        nb: usize,
        data: &'a [T],
    ) -> Self {
        let (lrows, lcols) = local_extent(grid, m, n, mb, nb);
        assert_eq!(data.len(), lrows * lcols, "local buffer does not match the layout");
        let desc = Descriptor::new(m, n, mb, nb, 0, 0, grid.ctxt(), lrows.max(1));
        Self::from_parts(grid, data, lrows, lcols, desc, m, n, 0, 0)
    }

    /// Window of this window.
    pub fn subview(&self, m: usize, n: usize, i: usize, j: usize) -> Self {
        assert!(i + m <= self.rows && j + n <= self.cols, "subview exceeds its parent");
        Self {
            rows: m,
            cols: n,
            i: self.i + i,
            j: self.j + j,
            ..*self
        }
    }

    /// Copy the window into a new matrix with the same block sizes.
    /// Collective over the grid.
    pub fn to_matrix(&self) -> DistributedMatrix<'g, T, C> {
        let mut out = DistributedMatrix::with_blocks(self.grid, self.rows, self.cols, self.mb(), self.nb());
        if let Some(comm) = self.grid.comm() {
            copy(self.rows, self.cols, self, 0, 0, &mut out, 0, 0, comm);
        }
        out
    }
}

impl<T: Scalar, C: Communicator> Clone for DistributedMatrixView<'_, '_, T, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Scalar, C: Communicator> Copy for DistributedMatrixView<'_, '_, T, C> {}

impl<T: Scalar, C: Communicator> fmt::Debug for DistributedMatrixView<'_, '_, T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributedMatrixView")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("offset", &(self.i, self.j))
            .field("desc", &self.desc)
            .finish()
    }
}

impl<'a, 'g, T: Scalar, C: Communicator + 'g> BlockCyclic<'g> for DistributedMatrixView<'a, 'g, T, C> {
    type Scalar = T;
    type Comm = C;

    fn grid(&self) -> &'g ProcessGrid<C> {
        self.grid
    }

    fn desc(&self) -> &Descriptor {
        &self.desc
    }

    fn rows(&self) -> usize {
        self.rows
    }

    fn cols(&self) -> usize {
        self.cols
    }

    fn row_offset(&self) -> usize {
        self.i
    }

    fn col_offset(&self) -> usize {
        self.j
    }

    fn lrows(&self) -> usize {
        self.lrows
    }

    fn lcols(&self) -> usize {
        self.lcols
    }

    fn data(&self) -> &[T] {
        self.data
    }
}

/// Exclusive window onto a block-cyclic matrix.
pub struct DistributedMatrixViewMut<'a, 'g, T: Scalar, C: Communicator> {
    grid: &'g ProcessGrid<C>,
    data: &'a mut [T],
    lrows: usize,
    lcols: usize,
    desc: Descriptor,
    rows: usize,
    cols: usize,
    i: usize,
    j: usize,
}

impl<'a, 'g, T: Scalar, C: Communicator> DistributedMatrixViewMut<'a, 'g, T, C> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        grid: &'g ProcessGrid<C>,
        data: &'a mut [T],
        lrows: usize,
        lcols: usize,
        desc: Descriptor,
        rows: usize,
        cols: usize,
        i: usize,
        j: usize,
    ) -> Self {
        Self {
            grid,
            data,
            lrows,
            lcols,
            desc,
            rows,
            cols,
            i,
            j,
        }
    }

    /// Mutable counterpart of [`DistributedMatrixView::from_local_slice`].
    pub fn from_local_slice(
        grid: &'g ProcessGrid<C>,
        m: usize,
        n: usize,
        mb: usize,
        nb: usize,
        data: &'a mut [T],
    ) -> Self {
        let (lrows, lcols) = local_extent(grid, m, n, mb, nb);
        assert_eq!(data.len(), lrows * lcols, "local buffer does not match the layout");
        let desc = Descriptor::new(m, n, mb, nb, 0, 0, grid.ctxt(), lrows.max(1));
        Self::from_parts(grid, data, lrows, lcols, desc, m, n, 0, 0)
    }

    /// Shared reborrow of the same window.
    pub fn as_view(&self) -> DistributedMatrixView<'_, 'g, T, C> {
        DistributedMatrixView::from_parts(
            self.grid, &*self.data, self.lrows, self.lcols, self.desc, self.rows, self.cols, self.i, self.j,
        )
    }
}

impl<T: Scalar, C: Communicator> fmt::Debug for DistributedMatrixViewMut<'_, '_, T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributedMatrixViewMut")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("offset", &(self.i, self.j))
            .field("desc", &self.desc)
            .finish()
    }
}

impl<'a, 'g, T: Scalar, C: Communicator + 'g> BlockCyclic<'g> for DistributedMatrixViewMut<'a, 'g, T, C> {
    type Scalar = T;
    type Comm = C;

    fn grid(&self) -> &'g ProcessGrid<C> {
        self.grid
    }

    fn desc(&self) -> &Descriptor {
        &self.desc
    }

    fn rows(&self) -> usize {
        self.rows
    }

    fn cols(&self) -> usize {
        self.cols
    }

    fn row_offset(&self) -> usize {
        self.i
    }

    fn col_offset(&self) -> usize {
        self.j
    }

    fn lrows(&self) -> usize {
        self.lrows
    }

    fn lcols(&self) -> usize {
        self.lcols
    }

    fn data(&self) -> &[T] {
        &*self.data
    }
}

impl<'a, 'g, T: Scalar, C: Communicator + 'g> BlockCyclicMut<'g> for DistributedMatrixViewMut<'a, 'g, T, C> {
    fn data_mut(&mut self) -> &mut [T] {
        &mut *self.data
    }
}
