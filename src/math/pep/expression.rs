use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::rc::Rc;

use super::basis::Basis;

/// Key of the canonical decomposition of an [`Expression`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Term {
    /// A leaf function value, by value index.
    Value(usize),
    /// Inner product of two leaf points, stored with the smaller index first.
    Product(usize, usize),
    /// The constant `1`.
    Constant,
}

impl Term {
    /// Product term with its indices in canonical order.
    pub fn product(i: usize, j: usize) -> Self {
        if i <= j {
            Term::Product(i, j)
        } else {
            Term::Product(j, i)
        }
    }

    fn canonical(self) -> Self {
        match self {
            Term::Product(i, j) => Term::product(i, j),
            other => other,
        }
    }
}

struct ExpressionInner {
    leaf: Option<usize>,
    terms: BTreeMap<Term, f64>,
}

/// An abstract scalar: a weighted sum of leaf function values, inner
/// products of leaf points and a constant.
///
/// The term map is canonical. Product keys are ordered, repeated keys
/// accumulate and zero weights are dropped, so two expressions built from
/// the same linear combination hold the same map.
#[derive(Clone)]
pub struct Expression {
    basis: Basis,
    inner: Rc<ExpressionInner>,
}

impl Expression {
    pub(crate) fn leaf(basis: &Basis) -> Self {
        let index = basis.next_value();
        let mut terms = BTreeMap::new();
        terms.insert(Term::Value(index), 1.0);
        Self {
            basis: basis.clone(),
            inner: Rc::new(ExpressionInner {
                leaf: Some(index),
                terms,
            }),
        }
    }

    pub fn constant(basis: &Basis, value: f64) -> Self {
        let mut terms = BTreeMap::new();
        terms.insert(Term::Constant, value);
        Self::from_canonical(basis, terms)
    }

    pub fn zero(basis: &Basis) -> Self {
        Self::from_canonical(basis, BTreeMap::new())
    }

    /// Builds an expression from raw weighted terms.
    ///
    /// Terms are canonicalized and accumulated but not checked against the
    /// basis: an index that was never minted is reported when the problem
    /// is compiled.
    pub fn from_terms<I>(basis: &Basis, terms: I) -> Self
    where
        I: IntoIterator<Item = (Term, f64)>,
    {
        let mut map = BTreeMap::new();
        for (term, weight) in terms {
            *map.entry(term.canonical()).or_insert(0.0) += weight;
        }
        Self::from_canonical(basis, map)
    }

    pub(crate) fn from_canonical(basis: &Basis, mut terms: BTreeMap<Term, f64>) -> Self {
        terms.retain(|_, weight| *weight != 0.0);
        Self {
            basis: basis.clone(),
            inner: Rc::new(ExpressionInner { leaf: None, terms }),
        }
    }

    pub fn basis(&self) -> &Basis {
        &self.basis
    }

    pub fn is_leaf(&self) -> bool {
        self.inner.leaf.is_some()
    }

    /// Index in the function-value vector, `None` for composites.
    pub fn leaf_index(&self) -> Option<usize> {
        self.inner.leaf
    }

    pub fn terms(&self) -> &BTreeMap<Term, f64> {
        &self.inner.terms
    }

    pub fn constant_term(&self) -> f64 {
        self.terms().get(&Term::Constant).copied().unwrap_or(0.0)
    }

    /// `self <= rhs`, written in the `<= 0` form the compiler expects.
    pub fn leq(&self, rhs: &Expression) -> Expression {
        self - rhs
    }

    /// `self >= rhs`, written in the `<= 0` form the compiler expects.
    pub fn geq(&self, rhs: &Expression) -> Expression {
        rhs - self
    }

    /// Value in the last certificate, if one is available.
    pub fn eval(&self) -> Option<f64> {
        let certificate = self.basis.certificate()?;
        let mut total = 0.0;
        for (term, &weight) in self.terms() {
            let value = match *term {
                Term::Value(index) => certificate.value(index)?,
                Term::Product(i, j) => certificate.point(i)?.dot(&certificate.point(j)?),
                Term::Constant => 1.0,
            };
            total += weight * value;
        }
        Some(total)
    }

    fn combine(&self, other: &Expression, sign: f64) -> Expression {
        self.basis.assert_same(&other.basis, "expressions");
        let mut terms = self.terms().clone();
        for (&term, &weight) in other.terms() {
            *terms.entry(term).or_insert(0.0) += sign * weight;
        }
        Expression::from_canonical(&self.basis, terms)
    }

    fn scale(&self, factor: f64) -> Expression {
        let terms = self
            .terms()
            .iter()
            .map(|(&term, &weight)| (term, factor * weight))
            .collect();
        Expression::from_canonical(&self.basis, terms)
    }

    fn shift(&self, offset: f64) -> Expression {
        let mut terms = self.terms().clone();
        *terms.entry(Term::Constant).or_insert(0.0) += offset;
        Expression::from_canonical(&self.basis, terms)
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.leaf {
            Some(index) => write!(f, "Expression::Leaf({})", index),
            None => f
                .debug_tuple("Expression::Composite")
                .field(&self.inner.terms)
                .finish(),
        }
    }
}

macro_rules! impl_expression_binop {
    ($trait:ident, $method:ident, $sign:expr) => {
        impl $trait<Expression> for Expression {
            type Output = Expression;
            fn $method(self, rhs: Expression) -> Expression {
                self.combine(&rhs, $sign)
            }
        }

        impl $trait<&Expression> for Expression {
            type Output = Expression;
            fn $method(self, rhs: &Expression) -> Expression {
                self.combine(rhs, $sign)
            }
        }

        impl $trait<Expression> for &Expression {
            type Output = Expression;
            fn $method(self, rhs: Expression) -> Expression {
                self.combine(&rhs, $sign)
            }
        }

        impl $trait<&Expression> for &Expression {
            type Output = Expression;
            fn $method(self, rhs: &Expression) -> Expression {
                self.combine(rhs, $sign)
            }
        }

        impl $trait<f64> for Expression {
            type Output = Expression;
            fn $method(self, rhs: f64) -> Expression {
                self.shift($sign * rhs)
            }
        }

        impl $trait<f64> for &Expression {
            type Output = Expression;
            fn $method(self, rhs: f64) -> Expression {
                self.shift($sign * rhs)
            }
        }
    };
}

impl_expression_binop!(Add, add, 1.0);
impl_expression_binop!(Sub, sub, -1.0);

impl Mul<f64> for Expression {
    type Output = Expression;
    fn mul(self, rhs: f64) -> Expression {
        self.scale(rhs)
    }
}

impl Mul<f64> for &Expression {
    type Output = Expression;
    fn mul(self, rhs: f64) -> Expression {
        self.scale(rhs)
    }
}

impl Mul<Expression> for f64 {
    type Output = Expression;
    fn mul(self, rhs: Expression) -> Expression {
        rhs.scale(self)
    }
}

impl Mul<&Expression> for f64 {
    type Output = Expression;
    fn mul(self, rhs: &Expression) -> Expression {
        rhs.scale(self)
    }
}

impl Div<f64> for Expression {
    type Output = Expression;
    fn div(self, rhs: f64) -> Expression {
        self.scale(1.0 / rhs)
    }
}

impl Div<f64> for &Expression {
    type Output = Expression;
    fn div(self, rhs: f64) -> Expression {
        self.scale(1.0 / rhs)
    }
}

impl Neg for Expression {
    type Output = Expression;
    fn neg(self) -> Expression {
        self.scale(-1.0)
    }
}

impl Neg for &Expression {
    type Output = Expression;
    fn neg(self) -> Expression {
        self.scale(-1.0)
    }
}
