//! Single-worker dense kernels on `DTensor<T, 2>`.
//!
//! The distributed decompositions replicate their operand on every grid
//! worker and run one of these kernels identically everywhere.

pub mod blas;
pub mod householder;
pub mod lu;
pub mod qr;
pub mod rrqr;

pub use blas::{gemm, matmul, transpose, trsm};
pub use lu::{getrf, getrs};
pub use qr::{geqrf, lq, orgqr};
pub use rrqr::{geqp3, PivotedQr};

/// Whether an operand is used as is or transposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trans {
    N,
    T,
}

impl Trans {
    pub fn flip(self) -> Self {
        match self {
            Trans::N => Trans::T,
            Trans::T => Trans::N,
        }
    }
}

/// Side of the triangular operand in `trsm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpLo {
    Upper,
    Lower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diag {
    NonUnit,
    Unit,
}
