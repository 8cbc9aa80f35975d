//! Small helpers shared by the kernels and the tests.

pub mod norms;
pub mod pivoting;
pub mod validation;

pub use norms::{norm_2, norm_frobenius, norm_max};
pub use pivoting::{invert_permutation, permutation_from_interchanges};
pub use validation::{is_orthogonal, max_abs_diff};
