use crate::error::Result;
use crate::math::pep::expression::Expression;
use crate::math::pep::function::{FunctionClass, Triplet};

use super::{check_positive, ordered_pairs};

/// `L`-smooth, possibly non-convex, functions.
///
/// Interpolation, for all `i != j`:
///
/// ```text
/// f_j - f_i + <g_i + g_j, x_i - x_j> / 2 + |g_i - g_j|² / 4L - L |x_i - x_j|² / 4 <= 0
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SmoothFunction {
    l: f64,
}

impl SmoothFunction {
    pub fn new(l: f64) -> Result<Self> {
        Ok(Self {
            l: check_positive("smoothness constant", l)?,
        })
    }

    pub fn l(&self) -> f64 {
        self.l
    }
}

impl FunctionClass for SmoothFunction {
    fn name(&self) -> &'static str {
        "smooth"
    }

    fn is_differentiable(&self) -> bool {
        true
    }

    fn interpolation_constraints(&self, triplets: &[Triplet]) -> Vec<Expression> {
        let l = self.l;
        ordered_pairs(triplets)
            .map(|(ti, tj)| {
                let dx = &ti.point - &tj.point;
                let dg = &ti.gradient - &tj.gradient;
                &tj.value - &ti.value + (&ti.gradient + &tj.gradient) * &dx * 0.5
                    + dg.norm_squared() / (4.0 * l)
                    - dx.norm_squared() * (l / 4.0)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::pep::basis::Basis;
    use crate::math::pep::expression::Term;
    use crate::math::pep::function::Function;
    use crate::math::pep::point::Point;

    #[test]
    fn test_pairs_are_not_symmetric_copies() {
        let basis = Basis::new();
        let f = Function::leaf(&basis, Box::new(SmoothFunction::new(1.0).unwrap()), false);
        let x0 = Point::leaf(&basis);
        let x1 = Point::leaf(&basis);
        f.oracle(&x0);
        f.oracle(&x1);

        let constraints = f.interpolation_constraints();
        assert_eq!(constraints.len(), 2);
        // Only the function values differ between the two orientations.
        let forward = constraints[0].terms();
        let backward = constraints[1].terms();
        assert_eq!(forward[&Term::Value(1)], 1.0);
        assert_eq!(backward[&Term::Value(1)], -1.0);
        assert_eq!(forward[&Term::Product(0, 0)], -0.25);
        assert_eq!(backward[&Term::Product(0, 0)], -0.25);
        assert_eq!(forward[&Term::Product(2, 2)], backward[&Term::Product(2, 2)]);
    }
}
