use crate::math::pep::expression::Expression;
use crate::math::pep::function::{FunctionClass, Triplet};

use super::ordered_pairs;

/// Closed proper convex functions.
///
/// Interpolation: `f_j - f_i + <g_j, x_i - x_j> <= 0` for all `i != j`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvexFunction;

impl ConvexFunction {
    pub fn new() -> Self {
        Self
    }
}

impl FunctionClass for ConvexFunction {
    fn name(&self) -> &'static str {
        "convex"
    }

    fn interpolation_constraints(&self, triplets: &[Triplet]) -> Vec<Expression> {
        ordered_pairs(triplets)
            .map(|(ti, tj)| &tj.value - &ti.value + &tj.gradient * (&ti.point - &tj.point))
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
    fn test_one_constraint_per_ordered_pair() {
        let basis = Basis::new();
        let f = Function::leaf(&basis, Box::new(ConvexFunction::new()), false);
        for _ in 0..3 {
            f.oracle(&Point::leaf(&basis));
        }
        assert_eq!(f.interpolation_constraints().len(), 6);
    }

    #[test]
    fn test_constraint_coefficients() {
        let basis = Basis::new();
        let f = Function::leaf(&basis, Box::new(ConvexFunction::new()), false);
        let x0 = Point::leaf(&basis);
        f.oracle(&x0);
        let x2 = Point::leaf(&basis);
        f.oracle(&x2);

        // f1 - f0 + <g3, x0 - x2>
        let constraints = f.interpolation_constraints();
        let first = constraints[0].terms();
        assert_eq!(first[&Term::Value(1)], 1.0);
        assert_eq!(first[&Term::Value(0)], -1.0);
        assert_eq!(first[&Term::Product(0, 3)], 1.0);
        assert_eq!(first[&Term::Product(2, 3)], -1.0);
        assert_eq!(first.len(), 4);
    }

    #[test]
    fn test_single_call_has_no_constraints() {
        let basis = Basis::new();
        let f = Function::leaf(&basis, Box::new(ConvexFunction), true);
        f.oracle(&Point::leaf(&basis));
        assert!(f.interpolation_constraints().is_empty());
    }
}
