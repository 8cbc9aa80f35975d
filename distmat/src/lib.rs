//! # distmat: distributed block-cyclic dense matrices
//!
//! Dense matrices spread over a 2D process grid in the block-cyclic
//! layout used by ScaLAPACK, together with the operations hierarchical
//! solvers need from them:
//!
//! - index maps between global and local coordinates ([`index`]),
//! - redistribution between arbitrary layouts and grids ([`redistribute`]),
//! - extraction of arbitrary row/column index lists,
//! - replicated-kernel LU, LQ, QR orthogonalisation and interpolative
//!   decompositions ([`decomp`]),
//! - distributed BLAS wrappers ([`pblas`]) and a mat-vec boundary for
//!   low-rank engines ([`lowrank`]).
//!
//! Workers talk through the [`Communicator`] trait; [`ThreadUniverse`]
//! runs a group of workers as threads of one process.
//!
//! ```
//! use distmat::{BlockCyclic, BlockCyclicMut, DistributedMatrix, ProcessGrid, ThreadUniverse};
//!
//! let norms = ThreadUniverse::run(4, |comm| {
//!     let grid = ProcessGrid::new(&comm, 2, 2).unwrap();
//!     let mut a = DistributedMatrix::<f64, _>::with_blocks(&grid, 4, 4, 2, 2);
//!     a.eye();
//!     a.shift(2.0);
//!     a.norm_inf()
//! });
//! assert!(norms.iter().all(|&n| n == 3.0));
//! ```

pub mod comm;
pub mod config;
pub mod decomp;
pub mod descriptor;
pub mod error;
mod extract;
pub mod grid;
pub mod index;
pub mod kernels;
pub mod lowrank;
pub mod matrix;
pub mod pblas;
pub mod redistribute;
pub mod scalar;
pub mod utils;

pub use comm::{Communicator, Exchange, ThreadComm, ThreadUniverse};
#[cfg(feature = "mpi")]
pub use comm::MpiComm;
pub use config::{DistConfig, FailurePolicy, DEFAULT_BLOCK_SIZE};
pub use decomp::Interpolative;
pub use descriptor::Descriptor;
pub use error::{Error, Result};
pub use grid::ProcessGrid;
pub use index::BlockMap;
pub use lowrank::{ContiguousLayout, DistributedMatVec, LowRankEngine, MatVec, Op};
pub use matrix::{BlockCyclic, BlockCyclicMut, DistributedMatrix, DistributedMatrixView, DistributedMatrixViewMut};
pub use redistribute::{copy, copy_transposed};
pub use scalar::Scalar;

pub use mdarray::DTensor;
