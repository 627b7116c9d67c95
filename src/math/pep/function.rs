use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::rc::Rc;

use crate::error::{Error, Result};

use super::basis::Basis;
use super::expression::Expression;
use super::point::Point;

/// One recorded oracle call: a point, a (sub)gradient there and the value.
#[derive(Debug, Clone)]
pub struct Triplet {
    pub point: Point,
    pub gradient: Point,
    pub value: Expression,
}

/// A class of functions characterized by interpolation conditions.
///
/// Implementations turn the oracle calls recorded on one function into
/// inequalities, each meaning `expression <= 0`, that hold for every set of
/// triplets interpolable by a member of the class.
pub trait FunctionClass: fmt::Debug {
    /// Short human-readable name used in logs.
    fn name(&self) -> &'static str;

    /// Interpolation inequalities over all recorded triplets.
    fn interpolation_constraints(&self, triplets: &[Triplet]) -> Vec<Expression>;

    /// Differentiable classes have a single gradient per point, so repeated
    /// queries at the same point always reuse it.
    fn is_differentiable(&self) -> bool {
        false
    }

    /// Value of the function wherever it is queried, for classes such as
    /// indicators whose value is known in advance.
    fn constant_value(&self) -> Option<f64> {
        None
    }
}

struct LeafFunction {
    index: usize,
    class: Box<dyn FunctionClass>,
    reuse_gradient: bool,
    triplets: RefCell<Vec<Triplet>>,
}

enum FunctionKind {
    Leaf(LeafFunction),
    Composite(Vec<(Function, f64)>),
}

struct FunctionInner {
    basis: Basis,
    kind: FunctionKind,
}

/// Handle to a function of a performance estimation problem.
///
/// Leaf functions are declared through the problem and belong to a
/// [`FunctionClass`]. Sums and scalar multiples of functions are composite:
/// their oracles combine the oracles of their leaves, and only leaves
/// contribute interpolation constraints.
#[derive(Clone)]
pub struct Function {
    inner: Rc<FunctionInner>,
}

impl Function {
    pub(crate) fn leaf(basis: &Basis, class: Box<dyn FunctionClass>, reuse_gradient: bool) -> Self {
        let reuse_gradient = reuse_gradient || class.is_differentiable();
        Self {
            inner: Rc::new(FunctionInner {
                basis: basis.clone(),
                kind: FunctionKind::Leaf(LeafFunction {
                    index: basis.next_function(),
                    class,
                    reuse_gradient,
                    triplets: RefCell::new(Vec::new()),
                }),
            }),
        }
    }

    pub fn basis(&self) -> &Basis {
        &self.inner.basis
    }

    /// Index of a leaf function, `None` for composites.
    pub fn index(&self) -> Option<usize> {
        match &self.inner.kind {
            FunctionKind::Leaf(leaf) => Some(leaf.index),
            FunctionKind::Composite(_) => None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.index().is_some()
    }

    pub fn name(&self) -> &'static str {
        match &self.inner.kind {
            FunctionKind::Leaf(leaf) => leaf.class.name(),
            FunctionKind::Composite(_) => "composite",
        }
    }

    pub fn reuses_gradient(&self) -> bool {
        match &self.inner.kind {
            FunctionKind::Leaf(leaf) => leaf.reuse_gradient,
            FunctionKind::Composite(terms) => terms.iter().all(|(f, _)| f.reuses_gradient()),
        }
    }

    /// Weights of a composite over leaf function indices; a leaf maps to itself.
    pub fn decomposition(&self) -> BTreeMap<usize, f64> {
        self.weighted_leaves()
            .into_iter()
            .filter_map(|(f, weight)| f.index().map(|index| (index, weight)))
            .collect()
    }

    /// Oracle calls recorded on a leaf function, in call order.
    pub fn triplets(&self) -> Vec<Triplet> {
        match &self.inner.kind {
            FunctionKind::Leaf(leaf) => leaf.triplets.borrow().clone(),
            FunctionKind::Composite(_) => Vec::new(),
        }
    }

    /// Interpolation inequalities of a leaf over its recorded calls.
    /// Composite functions contribute none.
    pub fn interpolation_constraints(&self) -> Vec<Expression> {
        match &self.inner.kind {
            FunctionKind::Leaf(leaf) => leaf
                .class
                .interpolation_constraints(&leaf.triplets.borrow()),
            FunctionKind::Composite(_) => Vec::new(),
        }
    }

    /// Returns a (sub)gradient and the value of the function at `point`.
    ///
    /// The value at an already queried point is always reused. The gradient
    /// is reused only when the function reuses gradients; otherwise a fresh
    /// subgradient leaf is minted.
    pub fn oracle(&self, point: &Point) -> (Point, Expression) {
        self.basis().assert_same(point.basis(), "point");
        match &self.inner.kind {
            FunctionKind::Leaf(leaf) => {
                let recorded = leaf
                    .triplets
                    .borrow()
                    .iter()
                    .find(|triplet| triplet.point.is_same(point))
                    .cloned();
                let (gradient, value) = match recorded {
                    Some(triplet) if leaf.reuse_gradient => {
                        return (triplet.gradient, triplet.value);
                    }
                    Some(triplet) => (Point::leaf(self.basis()), triplet.value),
                    None => (Point::leaf(self.basis()), self.fresh_value(leaf)),
                };
                leaf.triplets.borrow_mut().push(Triplet {
                    point: point.clone(),
                    gradient: gradient.clone(),
                    value: value.clone(),
                });
                (gradient, value)
            }
            FunctionKind::Composite(terms) => {
                let mut gradient = Point::zero(self.basis());
                let mut value = Expression::zero(self.basis());
                for (f, weight) in terms {
                    let (g, v) = f.oracle(point);
                    gradient = gradient + g * *weight;
                    value = value + v * *weight;
                }
                (gradient, value)
            }
        }
    }

    pub fn gradient(&self, point: &Point) -> Point {
        self.oracle(point).0
    }

    pub fn subgradient(&self, point: &Point) -> Point {
        self.gradient(point)
    }

    /// Value at `point`, without minting a new gradient if the point is known.
    pub fn value(&self, point: &Point) -> Expression {
        match &self.inner.kind {
            FunctionKind::Leaf(leaf) => {
                let recorded = leaf
                    .triplets
                    .borrow()
                    .iter()
                    .find(|triplet| triplet.point.is_same(point))
                    .map(|triplet| triplet.value.clone());
                match recorded {
                    Some(value) => value,
                    None => self.oracle(point).1,
                }
            }
            FunctionKind::Composite(terms) => terms.iter().fold(
                Expression::zero(self.basis()),
                |acc, (f, weight)| acc + f.value(point) * *weight,
            ),
        }
    }

    /// Records `gradient` as a (sub)gradient at `point` and returns the value there.
    ///
    /// A composite splits the gradient over its leaves: every leaf but the
    /// last free one is queried through its oracle, and the last free leaf
    /// absorbs the remainder. A leaf is not free when it reuses gradients
    /// and already has one at `point`; such a leaf rejects the call with
    /// [`Error::OverdeterminedGradient`].
    pub fn add_point(&self, point: &Point, gradient: &Point) -> Result<Expression> {
        let basis = self.basis();
        basis.assert_same(point.basis(), "point");
        basis.assert_same(gradient.basis(), "gradient");
        match &self.inner.kind {
            FunctionKind::Leaf(leaf) => {
                if self.has_fixed_gradient(point) {
                    return Err(Error::OverdeterminedGradient);
                }
                let recorded = leaf
                    .triplets
                    .borrow()
                    .iter()
                    .find(|triplet| triplet.point.is_same(point))
                    .map(|triplet| triplet.value.clone());
                let value = recorded.unwrap_or_else(|| self.fresh_value(leaf));
                leaf.triplets.borrow_mut().push(Triplet {
                    point: point.clone(),
                    gradient: gradient.clone(),
                    value: value.clone(),
                });
                Ok(value)
            }
            FunctionKind::Composite(terms) => {
                let absorber = terms
                    .iter()
                    .rposition(|(f, _)| !f.has_fixed_gradient(point))
                    .ok_or(Error::OverdeterminedGradient)?;

                let mut remainder = gradient.clone();
                let mut value = Expression::zero(basis);
                for (k, (f, weight)) in terms.iter().enumerate() {
                    if k == absorber {
                        continue;
                    }
                    let (g, v) = f.oracle(point);
                    remainder = remainder - g * *weight;
                    value = value + v * *weight;
                }

                let (f, weight) = &terms[absorber];
                let v = f.add_point(point, &(remainder / *weight))?;
                Ok(value + v * *weight)
            }
        }
    }

    /// Mints a new point at which the function has a zero (sub)gradient.
    pub fn stationary_point(&self) -> Result<Point> {
        let point = Point::leaf(self.basis());
        self.add_point(&point, &Point::zero(self.basis()))?;
        Ok(point)
    }

    fn has_fixed_gradient(&self, point: &Point) -> bool {
        match &self.inner.kind {
            FunctionKind::Leaf(leaf) => {
                leaf.reuse_gradient
                    && leaf
                        .triplets
                        .borrow()
                        .iter()
                        .any(|triplet| triplet.point.is_same(point))
            }
            FunctionKind::Composite(_) => false,
        }
    }

    fn fresh_value(&self, leaf: &LeafFunction) -> Expression {
        match leaf.class.constant_value() {
            Some(value) => Expression::constant(self.basis(), value),
            None => Expression::leaf(self.basis()),
        }
    }

    fn weighted_leaves(&self) -> Vec<(Function, f64)> {
        match &self.inner.kind {
            FunctionKind::Leaf(_) => vec![(self.clone(), 1.0)],
            FunctionKind::Composite(terms) => terms.clone(),
        }
    }

    fn combine(&self, other: &Function, sign: f64) -> Function {
        self.basis().assert_same(other.basis(), "functions");
        let mut merged: BTreeMap<usize, (Function, f64)> = BTreeMap::new();
        let weighted = self
            .weighted_leaves()
            .into_iter()
            .chain(
                other
                    .weighted_leaves()
                    .into_iter()
                    .map(|(f, weight)| (f, sign * weight)),
            );
        for (f, weight) in weighted {
            if let Some(index) = f.index() {
                merged.entry(index).or_insert((f, 0.0)).1 += weight;
            }
        }
        Function::composite(self.basis(), merged.into_values().collect())
    }

    fn scale(&self, factor: f64) -> Function {
        let terms = self
            .weighted_leaves()
            .into_iter()
            .map(|(f, weight)| (f, factor * weight))
            .collect();
        Function::composite(self.basis(), terms)
    }

    fn composite(basis: &Basis, mut terms: Vec<(Function, f64)>) -> Function {
        terms.retain(|(_, weight)| *weight != 0.0);
        Function {
            inner: Rc::new(FunctionInner {
                basis: basis.clone(),
                kind: FunctionKind::Composite(terms),
            }),
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.kind {
            FunctionKind::Leaf(leaf) => f
                .debug_struct("Function::Leaf")
                .field("index", &leaf.index)
                .field("class", &leaf.class)
                .field("reuse_gradient", &leaf.reuse_gradient)
                .field("calls", &leaf.triplets.borrow().len())
                .finish(),
            FunctionKind::Composite(_) => f
                .debug_tuple("Function::Composite")
                .field(&self.decomposition())
                .finish(),
        }
    }
}

macro_rules! impl_function_binop {
    ($trait:ident, $method:ident, $sign:expr) => {
        impl $trait<Function> for Function {
            type Output = Function;
            fn $method(self, rhs: Function) -> Function {
                self.combine(&rhs, $sign)
            }
        }

        impl $trait<&Function> for Function {
            type Output = Function;
            fn $method(self, rhs: &Function) -> Function {
                self.combine(rhs, $sign)
            }
        }

        impl $trait<Function> for &Function {
            type Output = Function;
            fn $method(self, rhs: Function) -> Function {
                self.combine(&rhs, $sign)
            }
        }

        impl $trait<&Function> for &Function {
            type Output = Function;
            fn $method(self, rhs: &Function) -> Function {
                self.combine(rhs, $sign)
            }
        }
    };
}

impl_function_binop!(Add, add, 1.0);
impl_function_binop!(Sub, sub, -1.0);

impl Mul<f64> for Function {
    type Output = Function;
    fn mul(self, rhs: f64) -> Function {
        self.scale(rhs)
    }
}

impl Mul<f64> for &Function {
    type Output = Function;
    fn mul(self, rhs: f64) -> Function {
        self.scale(rhs)
    }
}

impl Mul<Function> for f64 {
    type Output = Function;
    fn mul(self, rhs: Function) -> Function {
        rhs.scale(self)
    }
}

impl Div<f64> for Function {
    type Output = Function;
    fn div(self, rhs: f64) -> Function {
        self.scale(1.0 / rhs)
    }
}

impl Div<f64> for &Function {
    type Output = Function;
    fn div(self, rhs: f64) -> Function {
        self.scale(1.0 / rhs)
    }
}

impl Neg for Function {
    type Output = Function;
    fn neg(self) -> Function {
        self.scale(-1.0)
    }
}

impl Neg for &Function {
    type Output = Function;
    fn neg(self) -> Function {
        self.scale(-1.0)
    }
}
