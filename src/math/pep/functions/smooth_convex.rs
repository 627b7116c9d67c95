use crate::error::Result;
use crate::math::pep::expression::Expression;
use crate::math::pep::function::{FunctionClass, Triplet};

use super::check_positive;
use super::smooth_strongly_convex::smooth_strongly_convex_constraints;

/// `L`-smooth convex functions.
///
/// Interpolation: `f_j - f_i + <g_j, x_i - x_j> + |g_i - g_j|² / 2L <= 0`.
#[derive(Debug, Clone, Copy)]
pub struct SmoothConvexFunction {
    l: f64,
}

impl SmoothConvexFunction {
    pub fn new(l: f64) -> Result<Self> {
        Ok(Self {
            l: check_positive("smoothness constant", l)?,
        })
    }

    pub fn l(&self) -> f64 {
        self.l
    }
}

impl FunctionClass for SmoothConvexFunction {
    fn name(&self) -> &'static str {
        "smooth convex"
    }

    fn is_differentiable(&self) -> bool {
        true
    }

    fn interpolation_constraints(&self, triplets: &[Triplet]) -> Vec<Expression> {
        smooth_strongly_convex_constraints(triplets, 0.0, self.l)
    }
}
