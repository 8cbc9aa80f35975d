//! Two-dimensional process grids.

use crate::comm::Communicator;
use crate::config::DistConfig;
use crate::descriptor::INACTIVE_CONTEXT;
use crate::error::{Error, Result};

/// An `nprows x npcols` arrangement of workers taken from a spanning
/// communicator. Grid rank `prow + pcol * nprows` is played by the
/// spanning rank `members[prow + pcol * nprows]`; spanning ranks not
/// listed are inactive on this grid.
///
/// Construction is collective over the spanning communicator. A grid is
/// immutable afterwards and is shared by reference between all matrices
/// distributed on it.
#[derive(Debug)]
pub struct ProcessGrid<C: Communicator> {
    comm_all: C,
    comm: Option<C>,
    nprows: usize,
    npcols: usize,
    coords: Option<(usize, usize)>,
    members: Vec<usize>,
    config: DistConfig,
}

impl<C: Communicator> ProcessGrid<C> {
    /// Grid over the first `nprows * npcols` ranks of `comm`.
    pub fn new(comm: &C, nprows: usize, npcols: usize) -> Result<Self> {
        Self::with_config(comm, nprows, npcols, DistConfig::default())
    }

    pub fn with_config(comm: &C, nprows: usize, npcols: usize, config: DistConfig) -> Result<Self> {
        let members = (0..nprows.saturating_mul(npcols)).collect();
        Self::with_members(comm, nprows, npcols, members, config)
    }

    /// The most nearly square grid using every rank of `comm`:
    /// `npcols = floor(sqrt(P))`, `nprows = P / npcols`.
    pub fn square(comm: &C) -> Result<Self> {
        Self::square_with_config(comm, DistConfig::default())
    }

    pub fn square_with_config(comm: &C, config: DistConfig) -> Result<Self> {
        let procs = comm.size();
        let npcols = ((procs as f64).sqrt().floor() as usize).max(1);
        Self::with_config(comm, procs / npcols, npcols, config)
    }

    /// Grid whose column-major positions are played by `members`
    /// (ranks of `comm`).
    pub fn with_members(
        comm: &C,
        nprows: usize,
        npcols: usize,
        members: Vec<usize>,
        config: DistConfig,
    ) -> Result<Self> {
        if nprows == 0 || npcols == 0 {
            return Err(Error::config(format!("grid extents must be positive, got {nprows}x{npcols}")));
        }
        let procs = nprows * npcols;
        if procs > comm.size() {
            return Err(Error::config(format!(
                "a {nprows}x{npcols} grid needs {procs} workers, only {} available",
                comm.size()
            )));
        }
        if members.len() != procs {
            return Err(Error::config(format!(
                "{} members given for a grid of {procs} positions",
                members.len()
            )));
        }
        let mut seen = vec![false; comm.size()];
        for &m in &members {
            if m >= comm.size() || std::mem::replace(&mut seen[m], true) {
                return Err(Error::config(format!("invalid or repeated grid member {m}")));
            }
        }
        config.validate()?;

        let grid_comm = comm.split(&members);
        let coords = grid_comm.as_ref().map(|c| (c.rank() % nprows, c.rank() / nprows));
        tracing::debug!(
            nprows,
            npcols,
            rank = comm.rank(),
            ?coords,
            "process grid created"
        );
        Ok(Self {
            comm_all: comm.clone(),
            comm: grid_comm,
            nprows,
            npcols,
            coords,
            members,
            config,
        })
    }

    /// The grid with rows and columns swapped: the worker at `(p, q)`
    /// here sits at `(q, p)` there. Collective over `comm_all()`.
    pub fn transposed(&self) -> Result<Self> {
        let mut members = vec![0; self.members.len()];
        for q in 0..self.npcols {
            for p in 0..self.nprows {
                members[q + p * self.npcols] = self.members[p + q * self.nprows];
            }
        }
        Self::with_members(&self.comm_all, self.npcols, self.nprows, members, self.config.clone())
    }

    pub fn nprows(&self) -> usize {
        self.nprows
    }

    pub fn npcols(&self) -> usize {
        self.npcols
    }

    /// Number of workers on the grid.
    pub fn npactives(&self) -> usize {
        self.nprows * self.npcols
    }

    pub fn active(&self) -> bool {
        self.coords.is_some()
    }

    pub fn coords(&self) -> Option<(usize, usize)> {
        self.coords
    }

    /// # Panics
    ///
    /// On a worker that is not part of the grid.
    pub fn prow(&self) -> usize {
        match self.coords {
            Some((prow, _)) => prow,
            None => panic!("prow() called on a worker outside the process grid"),
        }
    }

    /// # Panics
    ///
    /// On a worker that is not part of the grid.
    pub fn pcol(&self) -> usize {
        match self.coords {
            Some((_, pcol)) => pcol,
            None => panic!("pcol() called on a worker outside the process grid"),
        }
    }

    /// Rank of this worker in the spanning communicator.
    pub fn rank(&self) -> usize {
        self.comm_all.rank()
    }

    /// Whether this worker sits at grid position `(0, 0)`.
    pub fn is_master(&self) -> bool {
        self.coords == Some((0, 0))
    }

    /// Communicator over the grid's workers, `None` when inactive.
    pub fn comm(&self) -> Option<&C> {
        self.comm.as_ref()
    }

    pub fn comm_all(&self) -> &C {
        &self.comm_all
    }

    /// Context id of the grid, `-1` when inactive.
    pub fn ctxt(&self) -> i32 {
        self.comm.as_ref().map_or(INACTIVE_CONTEXT, |c| c.context())
    }

    pub fn ctxt_all(&self) -> i32 {
        self.comm_all.context()
    }

    pub fn config(&self) -> &DistConfig {
        &self.config
    }

    /// Rank of position `(prow, pcol)` in the grid communicator.
    pub fn grid_rank_of(&self, prow: usize, pcol: usize) -> usize {
        prow + pcol * self.nprows
    }

    /// Rank of position `(prow, pcol)` in the spanning communicator.
    pub fn all_rank_of(&self, prow: usize, pcol: usize) -> usize {
        self.members[self.grid_rank_of(prow, pcol)]
    }

    /// Rank of position `(prow, pcol)` in `ctx`, which must be either the
    /// spanning communicator or this grid's own.
    pub(crate) fn rank_in(&self, ctx: &C, prow: usize, pcol: usize) -> usize {
        if ctx.context() == self.ctxt_all() {
            self.all_rank_of(prow, pcol)
        } else {
            debug_assert!(
                !self.active() || ctx.context() == self.ctxt(),
                "context {} spans neither this grid nor its parent",
                ctx.context()
            );
            self.grid_rank_of(prow, pcol)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::ThreadUniverse;

    #[test]
    fn test_square_factorization() {
        let shapes = ThreadUniverse::run(6, |comm| {
            let grid = ProcessGrid::square(&comm).unwrap();
            (grid.nprows(), grid.npcols(), grid.coords())
        });
        assert_eq!(shapes[0], (3, 2, Some((0, 0))));
        assert_eq!(shapes[4], (3, 2, Some((1, 1))));
    }

    #[test]
    fn test_inactive_workers() {
        let out = ThreadUniverse::run(5, |comm| {
            let grid = ProcessGrid::new(&comm, 2, 2).unwrap();
            (grid.active(), grid.ctxt(), grid.is_master())
        });
        assert!(out[..4].iter().all(|(active, ctxt, _)| *active && *ctxt > 0));
        assert_eq!(out[4], (false, INACTIVE_CONTEXT, false));
        assert!(out[0].2);
    }

    #[test]
    fn test_infeasible_grid() {
        let errs = ThreadUniverse::run(2, |comm| {
            let too_big = ProcessGrid::new(&comm, 2, 2).is_err();
            let empty = ProcessGrid::new(&comm, 0, 2).is_err();
            let repeated =
                ProcessGrid::with_members(&comm, 1, 2, vec![1, 1], DistConfig::new()).is_err();
            too_big && empty && repeated
        });
        assert!(errs.into_iter().all(|e| e));
    }

    #[test]
    fn test_transposed_swaps_coordinates() {
        let out = ThreadUniverse::run(6, |comm| {
            let grid = ProcessGrid::new(&comm, 2, 3).unwrap();
            let grid_t = grid.transposed().unwrap();
            (grid.coords(), grid_t.coords(), grid_t.nprows(), grid_t.npcols())
        });
        for (coords, coords_t, nprows_t, npcols_t) in out {
            let (p, q) = coords.unwrap();
            assert_eq!(coords_t, Some((q, p)));
            assert_eq!((nprows_t, npcols_t), (3, 2));
        }
    }
}
