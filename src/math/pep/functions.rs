//! Standard function classes and their interpolation conditions.
//!
//! Each condition is written in the `<= 0` form consumed by the compiler
//! and is emitted for every ordered pair of distinct recorded triplets.

pub mod convex;
pub mod convex_indicator;
pub mod smooth;
pub mod smooth_convex;
pub mod smooth_strongly_convex;

pub use convex::ConvexFunction;
pub use convex_indicator::ConvexIndicatorFunction;
pub use smooth::SmoothFunction;
pub use smooth_convex::SmoothConvexFunction;
pub use smooth_strongly_convex::SmoothStronglyConvexFunction;

use crate::error::{Error, Result};

use super::function::Triplet;

/// Ordered pairs `(i, j)` of recorded triplets with `i != j`.
pub(crate) fn ordered_pairs(triplets: &[Triplet]) -> impl Iterator<Item = (&Triplet, &Triplet)> {
    triplets.iter().enumerate().flat_map(move |(i, ti)| {
        triplets
            .iter()
            .enumerate()
            .filter(move |(j, _)| *j != i)
            .map(move |(_, tj)| (ti, tj))
    })
}

pub(crate) fn check_positive(name: &str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(Error::InvalidParameter(format!(
            "{} must be positive and finite, got {}",
            name, value
        )))
    }
}
