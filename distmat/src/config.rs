//! Runtime configuration carried by a process grid.

use std::str::FromStr;

use crate::error::{Error, Result};

/// Block size used when a matrix is created without explicit blocking.
pub const DEFAULT_BLOCK_SIZE: usize = 32;

const BLOCK_SIZE_VAR: &str = "DISTMAT_BLOCK_SIZE";
const FAILURE_POLICY_VAR: &str = "DISTMAT_ON_NUMERICAL_FAILURE";

/// What a decomposition does when its local kernel reports failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log the failure and terminate the process.
    #[default]
    Abort,
    /// Log the failure and return [`Error::NumericalFailure`].
    Propagate,
}

impl FailurePolicy {
    /// Apply the policy to a failure. Only returns under `Propagate`.
    pub(crate) fn handle<T>(self, err: Error) -> Result<T> {
        match self {
            FailurePolicy::Abort => {
                tracing::error!(error = %err, "numerical failure, aborting");
                std::process::exit(1);
            }
            FailurePolicy::Propagate => {
                tracing::warn!(error = %err, "numerical failure");
                Err(err)
            }
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(FailurePolicy::Abort),
            "propagate" => Ok(FailurePolicy::Propagate),
            other => Err(Error::config(format!(
                "unknown failure policy {other:?}, expected \"abort\" or \"propagate\""
            ))),
        }
    }
}

/// Configuration for distributed matrices created on a grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistConfig {
    /// Default row block size.
    pub mb: usize,
    /// Default column block size.
    pub nb: usize,
    pub failure_policy: FailurePolicy,
}

impl DistConfig {
    pub fn new() -> Self {
        Self {
            mb: DEFAULT_BLOCK_SIZE,
            nb: DEFAULT_BLOCK_SIZE,
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn with_block_size(mut self, mb: usize, nb: usize) -> Self {
        self.mb = mb;
        self.nb = nb;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.mb == 0 || self.nb == 0 {
            return Err(Error::config(format!(
                "block sizes must be positive, got {}x{}",
                self.mb, self.nb
            )));
        }
        Ok(())
    }

    /// Defaults overridden by `DISTMAT_BLOCK_SIZE` and
    /// `DISTMAT_ON_NUMERICAL_FAILURE` when they are set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::new();
        if let Some(raw) = lookup(BLOCK_SIZE_VAR) {
            let block: usize = raw.trim().parse().map_err(|_| {
                Error::config(format!("{BLOCK_SIZE_VAR}={raw:?} is not a block size"))
            })?;
            config = config.with_block_size(block, block);
        }
        if let Some(raw) = lookup(FAILURE_POLICY_VAR) {
            config = config.with_failure_policy(raw.parse()?);
        }
        config.validate()?;
        tracing::debug!(mb = config.mb, nb = config.nb, policy = ?config.failure_policy, "loaded configuration");
        Ok(config)
    }
}

impl Default for DistConfig {
    fn default() -> Self {
        Self::new()
    }
}
