//! Distributed matrix core: fill routines, norms, gather/scatter, views
//! and printing.

mod common;

use approx::assert_abs_diff_eq;
use distmat::*;
use mdarray::tensor;

#[test]
fn test_eye_shift_2x2_grid() {
    let results = common::run(4, |comm| {
        let grid = ProcessGrid::new(&comm, 2, 2).unwrap();
        let mut a = DistributedMatrix::<f64, _>::with_blocks(&grid, 4, 4, 2, 2);
        a.eye();
        a.shift(2.0);
        (a.lrows(), a.lcols(), a.all_gather(), a.norm_inf(), a.norm1())
    });
    for (lrows, lcols, dense, ninf, n1) in results {
        assert_eq!((lrows, lcols), (2, 2));
        for i in 0..4 {
            for j in 0..4 {
                let expected = if i == j { 3.0 } else { 0.0 };
                assert_eq!(dense[[i, j]], expected);
            }
        }
        assert_eq!(ninf, 3.0);
        assert_eq!(n1, 3.0);
    }
}

#[test]
fn test_local_block_layout() {
    // 5x5 on 2x2 with block 2: rows {0,1,4} on prow 0, {2,3} on prow 1
    let shapes = common::run(4, |comm| {
        let grid = ProcessGrid::new(&comm, 2, 2).unwrap();
        let a = DistributedMatrix::<f64, _>::with_blocks(&grid, 5, 5, 2, 2);
        let rows: Vec<usize> = (0..a.lrows()).map(|l| a.rowl2g(l)).collect();
        (grid.coords(), a.lrows(), a.lcols(), rows, a.desc().lld())
    });
    for (coords, lrows, lcols, rows, lld) in shapes {
        let (prow, pcol) = coords.unwrap();
        assert_eq!(lrows, if prow == 0 { 3 } else { 2 });
        assert_eq!(lcols, if pcol == 0 { 3 } else { 2 });
        assert_eq!(lld, lrows);
        if prow == 0 {
            assert_eq!(rows, vec![0, 1, 4]);
        } else {
            assert_eq!(rows, vec![2, 3]);
        }
    }
}

#[test]
fn test_scatter_gather_round_trip() {
    let dense = common::numbered(7, 5);
    let gathered = common::run(6, |comm| {
        let grid = ProcessGrid::new(&comm, 3, 2).unwrap();
        let mut a = DistributedMatrix::<f64, _>::with_blocks(&grid, 7, 5, 2, 3);
        a.scatter(grid.is_master().then_some(&dense));
        (a.gather(), a.global_entry_sum())
    });
    common::assert_dense_eq(gathered[0].0.as_ref().unwrap(), &dense);
    assert!(gathered[1..].iter().all(|(g, _)| g.is_none()));
    let total: f64 = gathered.iter().map(|(_, s)| s).sum();
    let expected: f64 = (0..7).flat_map(|i| (0..5).map(move |j| (i * 100 + j) as f64)).sum();
    assert_abs_diff_eq!(total, expected);
}

trait EntrySum {
    fn global_entry_sum(&self) -> f64;
}

impl<'g> EntrySum for DistributedMatrix<'g, f64, ThreadComm> {
    fn global_entry_sum(&self) -> f64 {
        self.data().iter().sum()
    }
}

#[test]
fn test_inactive_workers() {
    let results = common::run(3, |comm| {
        let grid = ProcessGrid::new(&comm, 1, 2).unwrap();
        let mut a = DistributedMatrix::<f64, _>::with_blocks(&grid, 4, 3, 2, 2);
        a.fill(1.0);
        (grid.active(), grid.ctxt(), a.lrows() * a.lcols(), a.norm(), a.all_gather())
    });
    assert!(!results[2].0);
    assert_eq!(results[2].1, -1);
    assert_eq!(results[2].2, 0);
    assert_eq!(results[2].3, -1.0);
    assert_abs_diff_eq!(results[0].3, 12f64.sqrt(), epsilon = 1e-14);
    // all_gather also reaches workers outside the grid
    assert_eq!(results[2].4[[3, 2]], 1.0);
}

#[test]
fn test_global_access_and_all_global() {
    let values = common::run(4, |comm| {
        let grid = ProcessGrid::new(&comm, 2, 2).unwrap();
        let mut a = DistributedMatrix::<f64, _>::with_blocks(&grid, 6, 6, 2, 2);
        a.set_global(3, 4, 7.5);
        let owned = a.is_local(3, 4);
        if owned {
            *a.global_mut(3, 4) += 1.0;
        }
        (owned, a.all_global(3, 4), a.total_nonzeros(), a.nonzeros())
    });
    assert_eq!(values.iter().filter(|v| v.0).count(), 1);
    // row 3 -> prow 1, col 4 -> pcol 0 -> grid rank 1
    assert!(values[1].0);
    // dense storage counts every stored entry, not just the one set above
    assert_eq!(values.iter().map(|v| v.3).collect::<Vec<_>>(), vec![16, 8, 8, 4]);
    for (_, v, total, _) in &values {
        assert_eq!(*v, 8.5);
        assert_eq!(*total, 36);
    }
}

#[test]
fn test_norms_match_dense() {
    let dense: DTensor<f64, 2> = tensor![[1.0, -2.0, 3.0], [-4.0, 5.0, -6.0]];
    let norms = common::run(4, |comm| {
        let grid = ProcessGrid::new(&comm, 2, 2).unwrap();
        let mut a = DistributedMatrix::<f64, _>::with_blocks(&grid, 2, 3, 1, 1);
        a.scatter(grid.is_master().then_some(&dense));
        (a.norm1(), a.norm_inf(), a.norm_frobenius())
    });
    for (n1, ninf, nf) in norms {
        assert_eq!(n1, 9.0);
        assert_eq!(ninf, 15.0);
        assert_abs_diff_eq!(nf, 91f64.sqrt(), epsilon = 1e-14);
    }
}

#[test]
fn test_random_is_reproducible() {
    let run = || {
        common::run(4, |comm| {
            let grid = ProcessGrid::new(&comm, 2, 2).unwrap();
            let mut a = DistributedMatrix::<f64, _>::with_blocks(&grid, 8, 8, 2, 2);
            a.random();
            a.all_gather()
        })
    };
    let first = run();
    let second = run();
    common::assert_dense_eq(&first[0], &second[3]);
    assert!(common::max_abs_diff(&first[0], &DTensor::<f64, 2>::from_fn([8, 8], |_| 0.0)) > 0.0);
}

#[test]
fn test_add_scale_and_resize() {
    let results = common::run(4, |comm| {
        let grid = ProcessGrid::new(&comm, 2, 2).unwrap();
        let mut a = DistributedMatrix::<f64, _>::with_blocks(&grid, 5, 4, 2, 2);
        let mut b = a.clone();
        a.eye();
        b.fill(2.0);
        a.scaled_add(0.5, &b);
        a.scale(2.0);
        a.resize(6, 3);
        a.all_gather()
    });
    let d = &results[0];
    assert_eq!(*d.shape(), (6, 3));
    assert_eq!(d[[0, 0]], 4.0);
    assert_eq!(d[[4, 1]], 2.0);
    assert_eq!(d[[5, 2]], 0.0);
}

#[test]
fn test_views_restrict_updates() {
    let results = common::run(4, |comm| {
        let grid = ProcessGrid::new(&comm, 2, 2).unwrap();
        let mut a = DistributedMatrix::<f64, _>::with_blocks(&grid, 6, 6, 2, 2);
        a.view_mut(3, 2, 1, 3).fill(5.0);
        let v = a.view(3, 2, 1, 3);
        (a.all_gather(), v.norm_frobenius(), v.to_matrix().all_gather())
    });
    let (full, vnorm, sub) = &results[0];
    for i in 0..6 {
        for j in 0..6 {
            let inside = (1..4).contains(&i) && (3..5).contains(&j);
            assert_eq!(full[[i, j]], if inside { 5.0 } else { 0.0 });
        }
    }
    assert_abs_diff_eq!(*vnorm, 150f64.sqrt(), epsilon = 1e-12);
    assert_eq!(*sub.shape(), (3, 2));
    for i in 0..3 {
        for j in 0..2 {
            assert_eq!(sub[[i, j]], 5.0);
        }
    }
}

#[test]
fn test_hconcat_checks_rows() {
    let errs = common::run(1, |comm| {
        let grid = ProcessGrid::new(&comm, 1, 1).unwrap();
        let mut a = DistributedMatrix::<f64, _>::new(&grid, 3, 2);
        let b = DistributedMatrix::<f64, _>::new(&grid, 4, 2);
        matches!(a.hconcat(&b), Err(Error::Configuration(_)))
    });
    assert!(errs[0]);
}

#[test]
fn test_from_dense_only_on_single_worker_grid() {
    let dense: DTensor<f64, 2> = tensor![[1.0, 2.0], [3.0, 4.0]];
    let results = common::run(2, |comm| {
        let one = ProcessGrid::new(&comm, 1, 1).unwrap();
        let two = ProcessGrid::new(&comm, 2, 1).unwrap();
        let ok = DistributedMatrix::from_dense(&one, &dense).map(|a| a.all_gather());
        let err = DistributedMatrix::from_dense(&two, &dense).is_err();
        (ok.ok(), err)
    });
    common::assert_dense_eq(results[1].0.as_ref().unwrap(), &dense);
    assert!(results[0].1);
}

#[test]
fn test_print_format() {
    let outputs = common::run(4, |comm| {
        let grid = ProcessGrid::new(&comm, 2, 2).unwrap();
        let mut a = DistributedMatrix::<f64, _>::with_blocks(&grid, 2, 3, 1, 1);
        a.eye();
        let mut out = Vec::new();
        a.write_to("A", &mut out, Some(3)).unwrap();
        String::from_utf8(out).unwrap()
    });
    assert_eq!(outputs[0], "A = [  % 2x3\n  1   0   0 \n  0   1   0 \n];\n");
    assert!(outputs[1..].iter().all(|o| o.is_empty()));
}

#[test]
fn test_print_to_file() {
    let dir = std::env::temp_dir().join(format!("distmat-print-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("a.m");
    common::run(2, |comm| {
        let grid = ProcessGrid::new(&comm, 1, 2).unwrap();
        let mut a = DistributedMatrix::<f64, _>::with_blocks(&grid, 2, 2, 1, 1);
        a.fill(2.5);
        a.print_to_file("B", &path, None).unwrap();
    });
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("B = [  % 2x2\n"));
    assert!(text.contains("2.5 2.5 \n"));
    assert!(text.ends_with("];\n"));
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_memory_accounting() {
    let mem = common::run(4, |comm| {
        let grid = ProcessGrid::new(&comm, 2, 2).unwrap();
        let a = DistributedMatrix::<f32, _>::with_blocks(&grid, 4, 4, 2, 2);
        let v = a.view(2, 2, 1, 1);
        (a.memory(), a.total_memory(), v.nonzeros(), v.total_nonzeros())
    });
    for (local, total, view_local, view_total) in mem {
        assert_eq!(local, 16);
        assert_eq!(total, 64);
        assert_eq!(view_local, 1);
        assert_eq!(view_total, 4);
    }
}

#[test]
fn test_into_dense_without_local_rows() {
    // one row on a 2x2 grid: process row 1 owns columns but no rows
    let blocks = common::run(4, |comm| {
        let grid = ProcessGrid::new(&comm, 2, 2).unwrap();
        let mut a = DistributedMatrix::<f64, _>::with_blocks(&grid, 1, 4, 1, 1);
        a.fill(2.0);
        let lcols = a.lcols();
        (lcols, a.into_dense())
    });
    for (rank, (lcols, block)) in blocks.iter().enumerate() {
        assert_eq!(*lcols, 2);
        let lrows = if rank % 2 == 0 { 1 } else { 0 };
        assert_eq!(*block.shape(), (lrows, 2));
        if lrows == 1 {
            assert_eq!(block[[0, 0]], 2.0);
            assert_eq!(block[[0, 1]], 2.0);
        }
    }
}

#[test]
fn test_view_over_caller_buffer() {
    let dense = common::numbered(5, 4);
    let results = common::run(4, |comm| {
        let grid = ProcessGrid::new(&comm, 2, 2).unwrap();
        let mut owner = DistributedMatrix::<f64, _>::with_blocks(&grid, 5, 4, 2, 2);
        owner.scatter(grid.is_master().then_some(&dense));
        let mut buffer = owner.data().to_vec();
        let mut wrapped = DistributedMatrixViewMut::from_local_slice(&grid, 5, 4, 2, 2, &mut buffer);
        wrapped.scale(2.0);
        let gathered = wrapped.as_view().subview(3, 2, 2, 1).to_matrix().all_gather();
        (gathered, buffer[0])
    });
    let (sub, first) = &results[0];
    assert_eq!(*first, 0.0);
    for i in 0..3 {
        for j in 0..2 {
            assert_eq!(sub[[i, j]], 2.0 * dense[[i + 2, j + 1]]);
        }
    }
}
