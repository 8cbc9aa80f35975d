//! Shared helpers for the integration tests.
#![allow(dead_code)]

use std::sync::Once;

use distmat::{DTensor, ThreadComm, ThreadUniverse};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Install a test-writer subscriber once per test binary, respecting
/// `RUST_LOG` (default `info`).
///
/// Installed globally rather than per thread: every worker runs on its
/// own thread.
pub fn init_tracing() {
    INIT.call_once(|| {
        let fmt_layer = fmt::layer().with_target(true).with_test_writer();
        let filter_layer = EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env_lossy();
        let _ = tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .try_init();
    });
}

/// Run `body` on `workers` in-process workers with tracing enabled.
pub fn run<R, F>(workers: usize, body: F) -> Vec<R>
where
    R: Send,
    F: Fn(ThreadComm) -> R + Sync,
{
    init_tracing();
    ThreadUniverse::run(workers, body)
}

// ===== Dense helpers =====

/// Deterministic `m x n` test matrix with distinct entries.
pub fn numbered(m: usize, n: usize) -> DTensor<f64, 2> {
    DTensor::<f64, 2>::from_fn([m, n], |idx| (idx[0] * 100 + idx[1]) as f64)
}

pub fn gaussian(m: usize, n: usize, seed: u64) -> DTensor<f64, 2> {
    let mut rng = StdRng::seed_from_u64(seed);
    DTensor::<f64, 2>::from_fn([m, n], |_| StandardNormal.sample(&mut rng))
}

/// `m x n` matrix of exact rank `rank` (product of two Gaussian factors).
pub fn low_rank(m: usize, n: usize, rank: usize, seed: u64) -> DTensor<f64, 2> {
    let u = gaussian(m, rank, seed);
    let v = gaussian(rank, n, seed + 1);
    distmat::kernels::matmul(&u, &v)
}

/// Well-conditioned square matrix: Gaussian plus `n` on the diagonal.
pub fn diagonally_dominant(n: usize, seed: u64) -> DTensor<f64, 2> {
    let g = gaussian(n, n, seed);
    DTensor::<f64, 2>::from_fn([n, n], |idx| {
        let shift = if idx[0] == idx[1] { n as f64 } else { 0.0 };
        g[[idx[0], idx[1]]] + shift
    })
}

pub fn max_abs_diff(a: &DTensor<f64, 2>, b: &DTensor<f64, 2>) -> f64 {
    distmat::utils::max_abs_diff(a, b)
}

/// Exact equality of two dense matrices.
pub fn assert_dense_eq(a: &DTensor<f64, 2>, b: &DTensor<f64, 2>) {
    assert_eq!(*a.shape(), *b.shape(), "shape mismatch");
    let (m, n) = *a.shape();
    for i in 0..m {
        for j in 0..n {
            assert_eq!(a[[i, j]], b[[i, j]], "entry ({i}, {j}) differs");
        }
    }
}
