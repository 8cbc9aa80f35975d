//! Gathering arbitrary rows or columns by global index.
//!
//! Rows move only within a grid column and columns only within a grid
//! row, so each worker exchanges at most one message with each peer on
//! its own process column (or row). Repeated indices are allowed and the
//! output follows the order of the index list.

use crate::comm::{Exchange, TAG_EXTRACT_COLS, TAG_EXTRACT_ROWS};
use crate::matrix::{BlockCyclic, BlockCyclicMut, DistributedMatrix};

/// Rows `rows` of `a`, as a new matrix with `a`'s block sizes.
///
/// # Panics
///
/// If an index is out of range, or if the column offset of a view is
/// not a whole number of block cycles.
pub(crate) fn extract_rows<'g, A: BlockCyclic<'g>>(
    a: &A,
    rows: &[usize],
) -> DistributedMatrix<'g, A::Scalar, A::Comm> {
    let grid = a.grid();
    let mut out = DistributedMatrix::with_layout(grid, rows.len(), a.cols(), a.mb(), a.nb(), 0, a.desc().csrc());
    let Some(comm) = grid.comm() else {
        return out;
    };
    assert!(
        a.col_offset() % (a.nb() * grid.npcols()) == 0,
        "extract_rows needs a column offset aligned to the block cycle"
    );
    let (prow, pcol) = (grid.prow(), grid.pcol());
    let (_, _, clo, chi) = a.lranges();
    let width = chi - clo;
    debug_assert_eq!(width, out.lcols());

    let mut exchange = Exchange::new(comm);
    for (i, &g) in rows.iter().enumerate() {
        assert!(g < a.rows(), "row {g} out of range for {} rows", a.rows());
        let (owner, dest) = (a.rowg2p(g), out.rowg2p(i));
        if owner == prow {
            let lr = a.rowg2l(g);
            if dest == prow {
                let tr = out.rowg2l(i);
                for c in 0..width {
                    out.set(tr, c, a.get(lr, clo + c));
                }
            } else {
                let peer = grid.grid_rank_of(dest, pcol);
                for c in 0..width {
                    exchange.push(peer, a.get(lr, clo + c));
                }
            }
        } else if dest == prow {
            exchange.expect(grid.grid_rank_of(owner, pcol), width);
        }
    }

    let mut received = exchange.run(comm, TAG_EXTRACT_ROWS);
    for (i, &g) in rows.iter().enumerate() {
        let (owner, dest) = (a.rowg2p(g), out.rowg2p(i));
        if owner == prow || dest != prow {
            continue;
        }
        let peer = grid.grid_rank_of(owner, pcol);
        let tr = out.rowg2l(i);
        for c in 0..width {
            out.set(tr, c, received.next_from(peer));
        }
    }
    out
}

/// Columns `cols` of `a`, as a new matrix with `a`'s block sizes.
///
/// # Panics
///
/// If an index is out of range, or if the row offset of a view is not a
/// whole number of block cycles.
pub(crate) fn extract_cols<'g, A: BlockCyclic<'g>>(
    a: &A,
    cols: &[usize],
) -> DistributedMatrix<'g, A::Scalar, A::Comm> {
    let grid = a.grid();
    let mut out = DistributedMatrix::with_layout(grid, a.rows(), cols.len(), a.mb(), a.nb(), a.desc().rsrc(), 0);
    let Some(comm) = grid.comm() else {
        return out;
    };
    assert!(
        a.row_offset() % (a.mb() * grid.nprows()) == 0,
        "extract_cols needs a row offset aligned to the block cycle"
    );
    let (prow, pcol) = (grid.prow(), grid.pcol());
    let (rlo, rhi, _, _) = a.lranges();
    let height = rhi - rlo;
    debug_assert_eq!(height, out.lrows());

    let mut exchange = Exchange::new(comm);
    for (j, &g) in cols.iter().enumerate() {
        assert!(g < a.cols(), "column {g} out of range for {} columns", a.cols());
        let (owner, dest) = (a.colg2p(g), out.colg2p(j));
        if owner == pcol {
            let lc = a.colg2l(g);
            if dest == pcol {
                let tc = out.colg2l(j);
                for r in 0..height {
                    out.set(r, tc, a.get(rlo + r, lc));
                }
            } else {
                let peer = grid.grid_rank_of(prow, dest);
                for r in 0..height {
                    exchange.push(peer, a.get(rlo + r, lc));
                }
            }
        } else if dest == pcol {
            exchange.expect(grid.grid_rank_of(prow, owner), height);
        }
    }

    let mut received = exchange.run(comm, TAG_EXTRACT_COLS);
    for (j, &g) in cols.iter().enumerate() {
        let (owner, dest) = (a.colg2p(g), out.colg2p(j));
        if owner == pcol || dest != pcol {
            continue;
        }
        let peer = grid.grid_rank_of(prow, owner);
        let tc = out.colg2l(j);
        for r in 0..height {
            out.set(r, tc, received.next_from(peer));
        }
    }
    out
}
