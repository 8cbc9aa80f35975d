//! Copying blocks between arbitrary block-cyclic layouts.
//!
//! Every worker packs the entries it owns of the source block into one
//! bucket per destination owner, all buckets travel through a single
//! [`Exchange`], and each worker unpacks what it owns of the destination
//! block. Senders pack in destination column-major order so the
//! receiver can unpack every message sequentially.

use std::ops::Range;

use crate::comm::{Communicator, Exchange, TAG_REDISTRIBUTE};
use crate::matrix::{BlockCyclic, BlockCyclicMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Identity,
    Transposed,
}

/// Copy `a[ia..ia+m, ja..ja+n]` into `b[ib..ib+m, jb..jb+n]`.
///
/// Collective over `ctx`, which must span both grids: either both grids
/// descend from `ctx`, or `a` and `b` share a grid whose own
/// communicator is `ctx`. Workers of `ctx` outside either grid still
/// have to call. Nothing happens for an empty block.
#[allow(clippy::too_many_arguments)]
pub fn copy<'a, 'b, A, B>(
    m: usize,
    n: usize,
    a: &A,
    ia: usize,
    ja: usize,
    b: &mut B,
    ib: usize,
    jb: usize,
    ctx: &A::Comm,
) where
    A: BlockCyclic<'a>,
    B: BlockCyclicMut<'b, Scalar = A::Scalar, Comm = A::Comm>,
    A::Comm: 'a + 'b,
{
    redistribute(Layout::Identity, m, n, a, ia, ja, b, ib, jb, ctx);
}

/// Copy the transpose of `a[ia..ia+m, ja..ja+n]` into
/// `b[ib..ib+n, jb..jb+m]`. Same collective rules as [`copy`].
#[allow(clippy::too_many_arguments)]
pub fn copy_transposed<'a, 'b, A, B>(
    m: usize,
    n: usize,
    a: &A,
    ia: usize,
    ja: usize,
    b: &mut B,
    ib: usize,
    jb: usize,
    ctx: &A::Comm,
) where
    A: BlockCyclic<'a>,
    B: BlockCyclicMut<'b, Scalar = A::Scalar, Comm = A::Comm>,
    A::Comm: 'a + 'b,
{
    redistribute(Layout::Transposed, m, n, a, ia, ja, b, ib, jb, ctx);
}

/// Local rows of `a` whose global index lies in `lo..lo+len`.
fn row_span<'g, A: BlockCyclic<'g>>(a: &A, lo: usize, len: usize) -> Range<usize> {
    let (map, prow, off) = (a.row_map(), a.grid().prow(), a.row_offset());
    map.local_len(off + lo, prow)..map.local_len(off + lo + len, prow)
}

/// Local columns of `a` whose global index lies in `lo..lo+len`.
fn col_span<'g, A: BlockCyclic<'g>>(a: &A, lo: usize, len: usize) -> Range<usize> {
    let (map, pcol, off) = (a.col_map(), a.grid().pcol(), a.col_offset());
    map.local_len(off + lo, pcol)..map.local_len(off + lo + len, pcol)
}

#[allow(clippy::too_many_arguments)]
fn redistribute<'a, 'b, A, B>(
    layout: Layout,
    m: usize,
    n: usize,
    a: &A,
    ia: usize,
    ja: usize,
    b: &mut B,
    ib: usize,
    jb: usize,
    ctx: &A::Comm,
) where
    A: BlockCyclic<'a>,
    B: BlockCyclicMut<'b, Scalar = A::Scalar, Comm = A::Comm>,
    A::Comm: 'a + 'b,
{
    if m == 0 || n == 0 {
        return;
    }
    let (bm, bn) = match layout {
        Layout::Identity => (m, n),
        Layout::Transposed => (n, m),
    };
    debug_assert!(
        !a.active() || (ia + m <= a.rows() && ja + n <= a.cols()),
        "source block {m}x{n} at ({ia}, {ja}) exceeds {}x{}",
        a.rows(),
        a.cols()
    );
    debug_assert!(
        !b.active() || (ib + bm <= b.rows() && jb + bn <= b.cols()),
        "destination block {bm}x{bn} at ({ib}, {jb}) exceeds {}x{}",
        b.rows(),
        b.cols()
    );
    let (agrid, bgrid) = (a.grid(), b.grid());
    assert!(
        std::ptr::eq(agrid, bgrid)
            || (ctx.context() == agrid.ctxt_all() && ctx.context() == bgrid.ctxt_all()),
        "redistribution context does not span both grids"
    );
    tracing::trace!(m, n, ia, ja, ib, jb, ?layout, "redistribute");

    let mut exchange = Exchange::new(ctx);
    if a.active() {
        let rows = row_span(a, ia, m);
        let cols = col_span(a, ja, n);
        let grows: Vec<usize> = rows.clone().map(|l| a.rowl2g(l) - ia).collect();
        match layout {
            Layout::Identity => {
                for lc in cols {
                    let c = a.coll2g(lc) - ja;
                    let dest_pcol = b.colg2p(jb + c);
                    for (lr, &r) in rows.clone().zip(&grows) {
                        let peer = bgrid.rank_in(ctx, b.rowg2p(ib + r), dest_pcol);
                        exchange.push(peer, a.get(lr, lc));
                    }
                }
            }
            Layout::Transposed => {
                let gcols: Vec<usize> = cols.clone().map(|l| a.coll2g(l) - ja).collect();
                for (lr, &r) in rows.zip(&grows) {
                    let dest_pcol = b.colg2p(jb + r);
                    for (lc, &c) in cols.clone().zip(&gcols) {
                        let peer = bgrid.rank_in(ctx, b.rowg2p(ib + c), dest_pcol);
                        exchange.push(peer, a.get(lr, lc));
                    }
                }
            }
        }
    }

    let mut sources = Vec::new();
    let (brows, bcols) = if b.active() {
        (row_span(b, ib, bm), col_span(b, jb, bn))
    } else {
        (0..0, 0..0)
    };
    let bgrows: Vec<usize> = brows.clone().map(|l| b.rowl2g(l) - ib).collect();
    for lc in bcols.clone() {
        let c = b.coll2g(lc) - jb;
        for &r in &bgrows {
            let (ar, ac) = match layout {
                Layout::Identity => (r, c),
                Layout::Transposed => (c, r),
            };
            let peer = agrid.rank_in(ctx, a.rowg2p(ia + ar), a.colg2p(ja + ac));
            exchange.expect(peer, 1);
            sources.push(peer);
        }
    }

    let mut received = exchange.run(ctx, TAG_REDISTRIBUTE);
    let mut sources = sources.into_iter();
    for lc in bcols {
        for lr in brows.clone() {
            if let Some(peer) = sources.next() {
                b.set(lr, lc, received.next_from(peer));
            }
        }
    }
}
