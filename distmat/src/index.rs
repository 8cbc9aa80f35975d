//! Block-cyclic index arithmetic along one dimension.
//!
//! A dimension of extent `n` is cut into blocks of `block` consecutive
//! indices that are dealt round-robin to `nprocs` processes, starting at
//! process `src`. All indices are 0-based.

use crate::config::DEFAULT_BLOCK_SIZE;

const DEFAULT_BLOCK_SHIFT: u32 = DEFAULT_BLOCK_SIZE.trailing_zeros();

/// Mapping between global indices, owning processes and local indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMap {
    block: usize,
    nprocs: usize,
    src: usize,
}

impl BlockMap {
    pub fn new(block: usize, nprocs: usize, src: usize) -> Self {
        assert!(block > 0, "block size must be positive");
        assert!(nprocs > 0, "process count must be positive");
        assert!(src < nprocs, "source process {src} out of range 0..{nprocs}");
        Self { block, nprocs, src }
    }

    pub fn block(&self) -> usize {
        self.block
    }

    pub fn nprocs(&self) -> usize {
        self.nprocs
    }

    pub fn src(&self) -> usize {
        self.src
    }

    /// `(x / block, x % block)`
    #[inline]
    fn split(&self, x: usize) -> (usize, usize) {
        if self.block == DEFAULT_BLOCK_SIZE {
            (x >> DEFAULT_BLOCK_SHIFT, x & (DEFAULT_BLOCK_SIZE - 1))
        } else {
            (x / self.block, x % self.block)
        }
    }

    /// Distance of process `p` from the source process.
    #[inline]
    fn dist(&self, p: usize) -> usize {
        (self.nprocs + p - self.src) % self.nprocs
    }

    /// Process owning global index `g`.
    #[inline]
    pub fn owner_of(&self, g: usize) -> usize {
        (self.src + self.split(g).0) % self.nprocs
    }

    /// Local position of global index `g` on its owner.
    #[inline]
    pub fn global_to_local(&self, g: usize) -> usize {
        let (blk, off) = self.split(g);
        self.block * (blk / self.nprocs) + off
    }

    /// Global index of local position `l` on process `p`.
    #[inline]
    pub fn local_to_global(&self, l: usize, p: usize) -> usize {
        let (blk, off) = self.split(l);
        self.nprocs * self.block * blk + off + self.dist(p) * self.block
    }

    /// Number of indices in `0..n` owned by process `p`.
    pub fn local_len(&self, n: usize, p: usize) -> usize {
        let (nblocks, rem) = self.split(n);
        let dist = self.dist(p);
        let extra = nblocks % self.nprocs;
        let mut len = (nblocks / self.nprocs) * self.block;
        if dist < extra {
            len += self.block;
        } else if dist == extra {
            len += rem;
        }
        len
    }
}
