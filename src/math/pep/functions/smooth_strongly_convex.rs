use crate::error::{Error, Result};
use crate::math::pep::expression::Expression;
use crate::math::pep::function::{FunctionClass, Triplet};

use super::{check_positive, ordered_pairs};

/// `L`-smooth `mu`-strongly convex functions, `0 <= mu < L`.
///
/// Interpolation, for all `i != j`:
///
/// ```text
/// f_j - f_i + <g_j, x_i - x_j> + |g_i - g_j|² / 2L
///     + mu / (2 (1 - mu / L)) |x_i - x_j - (g_i - g_j) / L|² <= 0
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SmoothStronglyConvexFunction {
    mu: f64,
    l: f64,
}

impl SmoothStronglyConvexFunction {
    pub fn new(mu: f64, l: f64) -> Result<Self> {
        let l = check_positive("smoothness constant", l)?;
        if !(mu.is_finite() && mu >= 0.0 && mu < l) {
            return Err(Error::InvalidParameter(format!(
                "strong convexity parameter must satisfy 0 <= mu < L, got mu = {} and L = {}",
                mu, l
            )));
        }
        Ok(Self { mu, l })
    }

    pub fn mu(&self) -> f64 {
        self.mu
    }

    pub fn l(&self) -> f64 {
        self.l
    }
}

impl FunctionClass for SmoothStronglyConvexFunction {
    fn name(&self) -> &'static str {
        "smooth strongly convex"
    }

    fn is_differentiable(&self) -> bool {
        true
    }

    fn interpolation_constraints(&self, triplets: &[Triplet]) -> Vec<Expression> {
        smooth_strongly_convex_constraints(triplets, self.mu, self.l)
    }
}

pub(super) fn smooth_strongly_convex_constraints(
    triplets: &[Triplet],
    mu: f64,
    l: f64,
) -> Vec<Expression> {
    ordered_pairs(triplets)
        .map(|(ti, tj)| {
            let dx = &ti.point - &tj.point;
            let dg = &ti.gradient - &tj.gradient;
            let mut constraint =
                &tj.value - &ti.value + &tj.gradient * &dx + dg.norm_squared() / (2.0 * l);
            if mu != 0.0 {
                let shifted = dx - dg / l;
                constraint = constraint + shifted.norm_squared() * (mu / (2.0 * (1.0 - mu / l)));
            }
            constraint
        })
        .collect()
}
