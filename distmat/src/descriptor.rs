//! Nine-integer array descriptor of a block-cyclic matrix.

use crate::error::{Error, Result};

/// Descriptor kind for dense block-cyclic matrices.
pub const BLOCK_CYCLIC_2D: i32 = 1;

/// Context value recorded by workers outside the process grid.
pub const INACTIVE_CONTEXT: i32 = -1;

const KIND: usize = 0;
const CTXT: usize = 1;
const M: usize = 2;
const N: usize = 3;
const MB: usize = 4;
const NB: usize = 5;
const RSRC: usize = 6;
const CSRC: usize = 7;
const LLD: usize = 8;

/// `[kind, ctxt, M, N, MB, NB, RSRC, CSRC, LLD]`, laid out exactly as the
/// ScaLAPACK array descriptor so it can be handed to foreign kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Descriptor([i32; 9]);

fn to_i32(value: usize, what: &str) -> i32 {
    match i32::try_from(value) {
        Ok(v) => v,
        Err(_) => panic!("descriptor field {what} = {value} does not fit in i32"),
    }
}

impl Descriptor {
    /// Fill a descriptor without checking it.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        m: usize,
        n: usize,
        mb: usize,
        nb: usize,
        rsrc: usize,
        csrc: usize,
        ctxt: i32,
        lld: usize,
    ) -> Self {
        Self([
            BLOCK_CYCLIC_2D,
            ctxt,
            to_i32(m, "M"),
            to_i32(n, "N"),
            to_i32(mb, "MB"),
            to_i32(nb, "NB"),
            to_i32(rsrc, "RSRC"),
            to_i32(csrc, "CSRC"),
            to_i32(lld, "LLD"),
        ])
    }

    pub fn from_array(raw: [i32; 9]) -> Self {
        Self(raw)
    }

    pub fn as_array(&self) -> &[i32; 9] {
        &self.0
    }

    /// Check the fields against a grid of `nprows x npcols` where this
    /// worker stores `lrows` local rows.
    pub fn validate(&self, nprows: usize, npcols: usize, lrows: usize) -> Result<()> {
        let raw = &self.0;
        if raw[KIND] != BLOCK_CYCLIC_2D {
            return Err(Error::config(format!("unsupported descriptor kind {}", raw[KIND])));
        }
        if raw[M] < 0 || raw[N] < 0 {
            return Err(Error::config(format!("negative extent {}x{}", raw[M], raw[N])));
        }
        if raw[MB] < 1 || raw[NB] < 1 {
            return Err(Error::config(format!(
                "block sizes must be positive, got {}x{}",
                raw[MB], raw[NB]
            )));
        }
        if raw[RSRC] < 0 || raw[RSRC] as usize >= nprows {
            return Err(Error::config(format!("RSRC {} outside grid of {nprows} rows", raw[RSRC])));
        }
        if raw[CSRC] < 0 || raw[CSRC] as usize >= npcols {
            return Err(Error::config(format!("CSRC {} outside grid of {npcols} columns", raw[CSRC])));
        }
        if (raw[LLD] as i64) < lrows.max(1) as i64 {
            return Err(Error::config(format!(
                "LLD {} smaller than max(1, {lrows})",
                raw[LLD]
            )));
        }
        Ok(())
    }

    pub fn context(&self) -> i32 {
        self.0[CTXT]
    }

    pub fn rows(&self) -> usize {
        self.0[M] as usize
    }

    pub fn cols(&self) -> usize {
        self.0[N] as usize
    }

    pub fn mb(&self) -> usize {
        self.0[MB] as usize
    }

    pub fn nb(&self) -> usize {
        self.0[NB] as usize
    }

    pub fn rsrc(&self) -> usize {
        self.0[RSRC] as usize
    }

    pub fn csrc(&self) -> usize {
        self.0[CSRC] as usize
    }

    pub fn lld(&self) -> usize {
        self.0[LLD] as usize
    }
}
