//! Error type shared by every fallible operation in the crate.

/// Errors returned by grid construction, decompositions and printing.
///
/// Misuse of the distributed protocol itself (mismatched message sizes,
/// reading a non-owned entry, `prow()` on an inactive worker) is an
/// invariant violation and panics instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("numerical failure in {routine} (info = {info})")]
    NumericalFailure { routine: &'static str, info: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }
}
