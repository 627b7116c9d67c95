use crate::error::{Error, Result};
use crate::math::pep::expression::Expression;
use crate::math::pep::function::{FunctionClass, Triplet};

use super::ordered_pairs;

/// Indicator functions of closed convex sets of bounded `diameter`.
///
/// The value is `0` on the set, so querying never mints a function value.
/// Interpolation: `<g_j, x_i - x_j> <= 0` for all `i != j`, and
/// `|x_i - x_j|² <= diameter²` for all `i < j` when the diameter is finite.
#[derive(Debug, Clone, Copy)]
pub struct ConvexIndicatorFunction {
    diameter: f64,
}

impl ConvexIndicatorFunction {
    /// `f64::INFINITY` describes an unbounded set.
    pub fn new(diameter: f64) -> Result<Self> {
        if diameter.is_nan() || diameter < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "diameter must be non-negative, got {}",
                diameter
            )));
        }
        Ok(Self { diameter })
    }

    pub fn diameter(&self) -> f64 {
        self.diameter
    }
}

impl Default for ConvexIndicatorFunction {
    fn default() -> Self {
        Self {
            diameter: f64::INFINITY,
        }
    }
}

impl FunctionClass for ConvexIndicatorFunction {
    fn name(&self) -> &'static str {
        "convex indicator"
    }

    fn constant_value(&self) -> Option<f64> {
        Some(0.0)
    }

    fn interpolation_constraints(&self, triplets: &[Triplet]) -> Vec<Expression> {
        let mut constraints: Vec<Expression> = ordered_pairs(triplets)
            .map(|(ti, tj)| &tj.gradient * (&ti.point - &tj.point))
            .collect();

        if self.diameter.is_finite() {
            let bound = self.diameter * self.diameter;
            for (i, ti) in triplets.iter().enumerate() {
                for tj in &triplets[i + 1..] {
                    constraints.push((&ti.point - &tj.point).norm_squared() - bound);
                }
            }
        }
        constraints
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::pep::basis::Basis;
    use crate::math::pep::function::Function;
    use crate::math::pep::point::Point;

    fn record(diameter: f64, calls: usize) -> Function {
        let basis = Basis::new();
        let class = ConvexIndicatorFunction::new(diameter).unwrap();
        let f = Function::leaf(&basis, Box::new(class), false);
        for _ in 0..calls {
            f.oracle(&Point::leaf(&basis));
        }
        f
    }

    #[test]
    fn test_unbounded_set_has_no_diameter_constraints() {
        assert_eq!(record(f64::INFINITY, 3).interpolation_constraints().len(), 6);
    }

    #[test]
    fn test_finite_diameter_adds_unordered_pairs() {
        let f = record(2.0, 3);
        let constraints = f.interpolation_constraints();
        assert_eq!(constraints.len(), 6 + 3);
        assert_eq!(constraints[6].constant_term(), -4.0);
    }

    #[test]
    fn test_values_are_constant_zero() {
        let f = record(1.0, 2);
        assert!(f.triplets().iter().all(|t| t.value.terms().is_empty()));
        assert_eq!(f.basis().value_count(), 0);
    }

    #[test]
    fn test_rejects_negative_diameter() {
        assert!(ConvexIndicatorFunction::new(-1.0).is_err());
        assert!(ConvexIndicatorFunction::new(f64::NAN).is_err());
        assert_eq!(ConvexIndicatorFunction::default().diameter(), f64::INFINITY);
    }
}
