//! Element types a distributed matrix can hold.

use std::fmt::{Debug, Display};
use std::ops::{AddAssign, DivAssign, MulAssign, SubAssign};

/// Real floating-point element type.
///
/// Everything the block-cyclic layer and the local kernels need beyond
/// [`num_traits::Float`]: compound assignment, formatting and the bounds
/// required to move values between workers.
pub trait Scalar:
    num_traits::Float
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
    + Debug
    + Display
    + Default
    + Send
    + Sync
    + serde::Serialize
    + serde::de::DeserializeOwned
    + 'static
{
    /// Convert an `f64` literal or sample into this precision.
    fn cast(x: f64) -> Self;

    /// Widen to `f64`, used for printing and tolerance checks.
    fn widen(self) -> f64;

    /// Size of one element in bytes.
    fn bytes() -> usize {
        std::mem::size_of::<Self>()
    }
}

impl Scalar for f64 {
    #[inline]
    fn cast(x: f64) -> f64 {
        x
    }

    #[inline]
    fn widen(self) -> f64 {
        self
    }
}

impl Scalar for f32 {
    #[inline]
    fn cast(x: f64) -> f32 {
        x as f32
    }

    #[inline]
    fn widen(self) -> f64 {
        self as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cast_round_trip() {
        assert_eq!(<f64 as Scalar>::cast(1.5), 1.5);
        assert_eq!(<f32 as Scalar>::cast(0.25).widen(), 0.25);
        assert_eq!(<f32 as Scalar>::bytes(), 4);
    }
}
