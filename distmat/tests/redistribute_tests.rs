//! Redistribution between layouts and grids.

mod common;

use distmat::pblas::vconcat;
use distmat::*;

#[test]
fn test_copy_between_block_sizes_is_identity() {
    let dense = common::numbered(9, 7);
    let results = common::run(4, |comm| {
        let grid = ProcessGrid::new(&comm, 2, 2).unwrap();
        let mut a = DistributedMatrix::<f64, _>::with_blocks(&grid, 9, 7, 2, 3);
        a.scatter(grid.is_master().then_some(&dense));
        let mut b = DistributedMatrix::<f64, _>::with_layout(&grid, 9, 7, 4, 1, 1, 1);
        copy(9, 7, &a, 0, 0, &mut b, 0, 0, grid.comm().unwrap());
        let mut back = DistributedMatrix::<f64, _>::with_blocks(&grid, 9, 7, 2, 3);
        copy(9, 7, &b, 0, 0, &mut back, 0, 0, grid.comm().unwrap());
        (b.all_gather(), back.data().to_vec(), a.data().to_vec())
    });
    for (b, back, a) in results {
        common::assert_dense_eq(&b, &dense);
        assert_eq!(back, a);
    }
}

#[test]
fn test_copy_sub_block_with_offsets() {
    let dense = common::numbered(6, 6);
    let results = common::run(4, |comm| {
        let grid = ProcessGrid::new(&comm, 2, 2).unwrap();
        let mut a = DistributedMatrix::<f64, _>::with_blocks(&grid, 6, 6, 2, 2);
        a.scatter(grid.is_master().then_some(&dense));
        let mut b = DistributedMatrix::<f64, _>::with_blocks(&grid, 4, 5, 3, 3);
        copy(2, 3, &a, 3, 1, &mut b, 1, 2, grid.comm().unwrap());
        b.all_gather()
    });
    let b = &results[0];
    for i in 0..4 {
        for j in 0..5 {
            let expected = if (1..3).contains(&i) && (2..5).contains(&j) {
                dense[[i + 2, j - 1]]
            } else {
                0.0
            };
            assert_eq!(b[[i, j]], expected, "({i}, {j})");
        }
    }
}

#[test]
fn test_copy_across_grids() {
    let dense = common::numbered(5, 8);
    let results = common::run(5, |comm| {
        let big = ProcessGrid::new(&comm, 2, 2).unwrap();
        let small = ProcessGrid::with_members(&comm, 1, 2, vec![4, 1], DistConfig::default()).unwrap();
        let mut a = DistributedMatrix::<f64, _>::with_blocks(&big, 5, 8, 2, 2);
        a.scatter(big.is_master().then_some(&dense));
        let mut b = DistributedMatrix::<f64, _>::with_blocks(&small, 5, 8, 3, 3);
        copy(5, 8, &a, 0, 0, &mut b, 0, 0, &comm);
        let via_ctor = DistributedMatrix::<f64, _>::from_matrix(&small, &a);
        (b.all_gather(), via_ctor.all_gather(), small.active(), b.lcols())
    });
    for (b, c, _, _) in &results {
        common::assert_dense_eq(b, &dense);
        common::assert_dense_eq(c, &dense);
    }
    // worker 4 is (0, 0) of the small grid and owns columns 0..3 and 6..8
    assert!(results[4].2);
    assert_eq!(results[4].3, 5);
    assert_eq!(results[0].3, 0);
}

#[test]
fn test_transpose() {
    let dense = common::numbered(5, 3);
    let results = common::run(4, |comm| {
        let grid = ProcessGrid::new(&comm, 2, 2).unwrap();
        let mut a = DistributedMatrix::<f64, _>::with_blocks(&grid, 5, 3, 2, 1);
        a.scatter(grid.is_master().then_some(&dense));
        let t = a.transpose();
        (t.mb(), t.nb(), t.all_gather())
    });
    for (mb, nb, t) in results {
        assert_eq!((mb, nb), (1, 2));
        assert_eq!(*t.shape(), (3, 5));
        for i in 0..3 {
            for j in 0..5 {
                assert_eq!(t[[i, j]], dense[[j, i]]);
            }
        }
    }
}

#[test]
fn test_vconcat() {
    let top = common::numbered(3, 4);
    let bottom = common::gaussian(4, 5, 7);
    let results = common::run(4, |comm| {
        let grid = ProcessGrid::new(&comm, 2, 2).unwrap();
        let mut a = DistributedMatrix::<f64, _>::with_blocks(&grid, 3, 4, 2, 2);
        a.scatter(grid.is_master().then_some(&top));
        let mut b = DistributedMatrix::<f64, _>::with_blocks(&grid, 4, 5, 2, 2);
        b.scatter(grid.is_master().then_some(&bottom));
        let c = vconcat(4, 3, 2, &a, &b, &grid, grid.comm().unwrap());
        c.all_gather()
    });
    let c = &results[0];
    assert_eq!(*c.shape(), (5, 4));
    for j in 0..4 {
        for i in 0..3 {
            assert_eq!(c[[i, j]], top[[i, j]]);
        }
        for i in 0..2 {
            assert_eq!(c[[3 + i, j]], bottom[[i, j]]);
        }
    }
}

#[test]
fn test_hconcat_appends_columns() {
    let left = common::numbered(4, 3);
    let right = common::gaussian(4, 2, 11);
    let results = common::run(4, |comm| {
        let grid = ProcessGrid::new(&comm, 2, 2).unwrap();
        let mut a = DistributedMatrix::<f64, _>::with_blocks(&grid, 4, 3, 2, 2);
        a.scatter(grid.is_master().then_some(&left));
        let mut b = DistributedMatrix::<f64, _>::with_blocks(&grid, 4, 2, 2, 2);
        b.scatter(grid.is_master().then_some(&right));
        a.hconcat(&b).unwrap();
        let split_back = a.extract_cols(&[3, 4]);
        (a.all_gather(), split_back.all_gather())
    });
    let (joined, back) = &results[2];
    assert_eq!(*joined.shape(), (4, 5));
    for i in 0..4 {
        for j in 0..3 {
            assert_eq!(joined[[i, j]], left[[i, j]]);
        }
    }
    common::assert_dense_eq(back, &right);
}
