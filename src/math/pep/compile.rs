use ndarray::{Array1, Array2};

use crate::error::{Error, Result};
use crate::math::sdp::{LinearRow, SdpProblem, SymmetricEntry};

use super::basis::Basis;
use super::expression::{Expression, Term};

/// Affine form `fᵀF + <W, G> + c` over the function-value vector `F` and the
/// Gram matrix `G`.
///
/// `gram` is upper triangular: the weight of `Term::Product(i, j)` with
/// `i <= j` sits at `(i, j)` and multiplies the single entry `G_ij`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearForm {
    pub values: Array1<f64>,
    pub gram: Array2<f64>,
    pub constant: f64,
}

impl LinearForm {
    pub fn zeros(value_dim: usize, gram_dim: usize) -> Self {
        Self {
            values: Array1::zeros(value_dim),
            gram: Array2::zeros((gram_dim, gram_dim)),
            constant: 0.0,
        }
    }

    /// Value of the form at a symmetric Gram matrix and a value vector.
    pub fn evaluate(&self, gram: &Array2<f64>, values: &Array1<f64>) -> f64 {
        self.values.dot(values) + (&self.gram * gram).sum() + self.constant
    }

    /// Whether the form is a bare constant.
    pub fn is_constant(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0) && self.gram.iter().all(|&v| v == 0.0)
    }
}

/// Lowers an expression onto the current basis dimensions.
pub fn flatten(expression: &Expression, basis: &Basis) -> Result<LinearForm> {
    if !expression.basis().is_same(basis) {
        return Err(Error::EpochMismatch {
            expected: basis.epoch(),
            found: expression.basis().epoch(),
        });
    }

    let value_dim = basis.value_count();
    let gram_dim = basis.point_count();
    let mut form = LinearForm::zeros(value_dim, gram_dim);
    for (&term, &weight) in expression.terms() {
        if !weight.is_finite() {
            return Err(Error::MalformedExpression(format!(
                "non-finite weight {} on {:?}",
                weight, term
            )));
        }
        match term {
            Term::Value(index) if index < value_dim => form.values[index] += weight,
            Term::Product(i, j) if i <= j && j < gram_dim => form.gram[[i, j]] += weight,
            Term::Constant => form.constant += weight,
            other => {
                return Err(Error::MalformedExpression(format!(
                    "{:?} is outside a basis of {} points and {} values",
                    other, gram_dim, value_dim
                )))
            }
        }
    }
    Ok(form)
}

/// A performance estimation problem lowered to linear forms.
///
/// The problem it stands for is
///
/// ```text
/// maximize    t
/// subject to  t <= metric            for every performance metric
///             form <= 0              for every initial condition and class constraint
///             G ⪰ 0
/// ```
#[derive(Debug, Clone)]
pub struct CompiledPep {
    pub gram_dim: usize,
    pub value_dim: usize,
    pub metrics: Vec<LinearForm>,
    pub conditions: Vec<LinearForm>,
    pub class_constraints: Vec<LinearForm>,
}

impl CompiledPep {
    /// Number of SDP variables: `t`, every `F_v` and every `G_ab` with `a <= b`.
    pub fn num_variables(&self) -> usize {
        1 + self.value_dim + self.gram_dim * (self.gram_dim + 1) / 2
    }

    fn value_variable(&self, v: usize) -> usize {
        1 + v
    }

    fn gram_variable(&self, a: usize, b: usize) -> usize {
        1 + self.value_dim + a * self.gram_dim - a * a.saturating_sub(1) / 2 + (b - a)
    }

    /// Lowers the problem to the solver boundary.
    ///
    /// Variables are `y = [t, F_0..F_{V-1}, G_ab (a <= b)]`. The PSD block
    /// is `Σ G_ab E_ab ⪰ 0`. Each metric becomes the row
    /// `c + fᵀF + <W, G> - t >= 0` and each constraint the row
    /// `-(c + fᵀF + <W, G>) >= 0`. Constraints without variables that hold
    /// trivially are dropped.
    pub fn to_sdp(&self) -> SdpProblem {
        let mut objective = Array1::zeros(self.num_variables());
        objective[0] = 1.0;
        let mut problem = SdpProblem::new(objective, self.gram_dim);

        for a in 0..self.gram_dim {
            for b in a..self.gram_dim {
                problem.psd_coefficients[self.gram_variable(a, b)] =
                    vec![SymmetricEntry::new(a, b, -1.0)];
            }
        }

        for metric in &self.metrics {
            let mut coefficients = vec![(0, 1.0)];
            coefficients.extend(self.coefficients(metric).map(|(i, w)| (i, -w)));
            problem.rows.push(LinearRow {
                constant: metric.constant,
                coefficients,
            });
        }

        for constraint in self.conditions.iter().chain(&self.class_constraints) {
            if constraint.is_constant() && constraint.constant <= 0.0 {
                continue;
            }
            problem.rows.push(LinearRow {
                constant: -constraint.constant,
                coefficients: self.coefficients(constraint).collect(),
            });
        }
        problem
    }

    fn coefficients<'a>(&'a self, form: &'a LinearForm) -> impl Iterator<Item = (usize, f64)> + 'a {
        let values = form
            .values
            .iter()
            .enumerate()
            .filter(|(_, &w)| w != 0.0)
            .map(move |(v, &w)| (self.value_variable(v), w));
        let gram = form
            .gram
            .indexed_iter()
            .filter(|((a, b), &w)| a <= b && w != 0.0)
            .map(move |((a, b), &w)| (self.gram_variable(a, b), w));
        values.chain(gram)
    }

    /// Symmetric Gram matrix read back from a solver point.
    pub fn gram_from_solution(&self, y: &Array1<f64>) -> Array2<f64> {
        let mut gram = Array2::zeros((self.gram_dim, self.gram_dim));
        for a in 0..self.gram_dim {
            for b in a..self.gram_dim {
                let value = y[self.gram_variable(a, b)];
                gram[[a, b]] = value;
                gram[[b, a]] = value;
            }
        }
        gram
    }

    pub fn values_from_solution(&self, y: &Array1<f64>) -> Array1<f64> {
        Array1::from_shape_fn(self.value_dim, |v| y[self.value_variable(v)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::pep::point::Point;
    use ndarray::array;

    #[test]
    fn test_flatten_places_terms() {
        let basis = Basis::new();
        let x = Point::leaf(&basis);
        let y = Point::leaf(&basis);
        let f = Expression::leaf(&basis);
        let expression = (&x - &y).norm_squared() * 2.0 + &f * 3.0 - 1.0;

        let form = flatten(&expression, &basis).unwrap();
        assert_eq!(form.values, array![3.0]);
        assert_eq!(form.gram, array![[2.0, -4.0], [0.0, 2.0]]);
        assert_eq!(form.constant, -1.0);
    }

    #[test]
    fn test_flatten_rejects_foreign_expression() {
        let basis = Basis::new();
        let other = Basis::new();
        let f = Expression::leaf(&other);
        match flatten(&f, &basis) {
            Err(Error::EpochMismatch { expected, found }) => {
                assert_eq!(expected, basis.epoch());
                assert_eq!(found, other.epoch());
            }
            result => panic!("expected EpochMismatch, got {:?}", result),
        }
    }

    #[test]
    fn test_flatten_rejects_unknown_indices() {
        let basis = Basis::new();
        Point::leaf(&basis);
        let bad_value = Expression::from_terms(&basis, vec![(Term::Value(0), 1.0)]);
        let bad_point = Expression::from_terms(&basis, vec![(Term::Product(0, 1), 1.0)]);
        assert!(matches!(
            flatten(&bad_value, &basis),
            Err(Error::MalformedExpression(_))
        ));
        assert!(matches!(
            flatten(&bad_point, &basis),
            Err(Error::MalformedExpression(_))
        ));
    }

    #[test]
    fn test_flatten_rejects_non_finite_weights() {
        let basis = Basis::new();
        let f = Expression::leaf(&basis);
        assert!(matches!(
            flatten(&(f * f64::NAN), &basis),
            Err(Error::MalformedExpression(_))
        ));
    }

    #[test]
    fn test_gram_variables_are_dense_and_ordered() {
        let compiled = CompiledPep {
            gram_dim: 3,
            value_dim: 2,
            metrics: Vec::new(),
            conditions: Vec::new(),
            class_constraints: Vec::new(),
        };
        let indices: Vec<usize> = (0..3)
            .flat_map(|a| (a..3).map(move |b| (a, b)))
            .map(|(a, b)| compiled.gram_variable(a, b))
            .collect();
        assert_eq!(indices, vec![3, 4, 5, 6, 7, 8]);
        assert_eq!(compiled.num_variables(), 9);
    }

    #[test]
    fn test_to_sdp_rows() {
        let basis = Basis::new();
        let x = Point::leaf(&basis);
        let f = Expression::leaf(&basis);
        let metric = flatten(&(&f + 2.0), &basis).unwrap();
        let condition = flatten(&(x.norm_squared() - 1.0), &basis).unwrap();
        let trivial = flatten(&Expression::constant(&basis, -3.0), &basis).unwrap();
        let compiled = CompiledPep {
            gram_dim: 1,
            value_dim: 1,
            metrics: vec![metric],
            conditions: vec![condition, trivial],
            class_constraints: Vec::new(),
        };

        let problem = compiled.to_sdp();
        assert_eq!(problem.num_variables(), 3);
        assert_eq!(problem.objective, array![1.0, 0.0, 0.0]);
        assert_eq!(problem.psd_coefficients[2], vec![SymmetricEntry::new(0, 0, -1.0)]);
        assert_eq!(problem.rows.len(), 2);
        assert_eq!(problem.rows[0].constant, 2.0);
        assert_eq!(problem.rows[0].coefficients, vec![(0, 1.0), (1, -1.0)]);
        assert_eq!(problem.rows[1].constant, 1.0);
        assert_eq!(problem.rows[1].coefficients, vec![(2, 1.0)]);
        assert!(problem.validate().is_ok());
    }

    #[test]
    fn test_solution_read_back() {
        let compiled = CompiledPep {
            gram_dim: 2,
            value_dim: 1,
            metrics: Vec::new(),
            conditions: Vec::new(),
            class_constraints: Vec::new(),
        };
        let y = array![0.5, 7.0, 1.0, 2.0, 3.0];
        assert_eq!(compiled.gram_from_solution(&y), array![[1.0, 2.0], [2.0, 3.0]]);
        assert_eq!(compiled.values_from_solution(&y), array![7.0]);
    }

    #[test]
    fn test_evaluate_matches_symbolic_form() {
        let basis = Basis::new();
        let x = Point::leaf(&basis);
        let y = Point::leaf(&basis);
        let form = flatten(&(&x * &y * 2.0 + x.norm_squared()), &basis).unwrap();
        let gram = array![[1.0, 0.5], [0.5, 4.0]];
        assert_eq!(form.evaluate(&gram, &Array1::zeros(0)), 2.0);
    }
}
