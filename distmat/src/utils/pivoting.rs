//! Permutation utilities

/// Invert a permutation vector
///
/// Given `p`, returns `inv` with `inv[p[i]] = i`.
pub fn invert_permutation(permutation: &[usize]) -> Vec<usize> {
    let mut inv = vec![0; permutation.len()];
    for (i, &p) in permutation.iter().enumerate() {
        inv[p] = i;
    }
    inv
}

/// Turn LAPACK-style interchanges into a permutation vector.
///
/// Step `i` swaps positions `i` and `ipiv[i]`; `forward` applies the
/// steps in increasing order, otherwise in decreasing order. Entry `i`
/// of the result is the original index that ends up at position `i`.
pub fn permutation_from_interchanges(ipiv: &[usize], forward: bool) -> Vec<usize> {
    let mut perm: Vec<usize> = (0..ipiv.len()).collect();
    if forward {
        for (i, &p) in ipiv.iter().enumerate() {
            perm.swap(i, p);
        }
    } else {
        for (i, &p) in ipiv.iter().enumerate().rev() {
            perm.swap(i, p);
        }
    }
    perm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invert_permutation() {
        assert_eq!(invert_permutation(&[2, 0, 1]), vec![1, 2, 0]);
    }

    #[test]
    fn test_interchanges() {
        // swap 0<->2, then 1<->2
        let ipiv = [2, 2, 2];
        assert_eq!(permutation_from_interchanges(&ipiv, true), vec![2, 0, 1]);
        assert_eq!(permutation_from_interchanges(&ipiv, false), vec![1, 2, 0]);
    }

    #[test]
    fn test_backward_inverts_forward() {
        let ipiv = [3, 1, 3, 3];
        let fwd = permutation_from_interchanges(&ipiv, true);
        let bwd = permutation_from_interchanges(&ipiv, false);
        assert_eq!(bwd, invert_permutation(&fwd));
    }
}
