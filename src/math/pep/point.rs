use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::rc::Rc;

use ndarray::Array1;

use super::basis::Basis;
use super::expression::{Expression, Term};

struct PointInner {
    leaf: Option<usize>,
    decomposition: BTreeMap<usize, f64>,
}

/// An abstract vector of the problem's ambient space.
///
/// A point is either a leaf, which opens a new dimension of the basis, or a
/// composite linear combination of leaves. Composites are always stored
/// flat: the decomposition maps leaf indices to coefficients and never
/// refers to another composite.
///
/// Clones share identity. Oracle caching compares points by identity
/// (see [`Point::is_same`]), never by value.
#[derive(Clone)]
pub struct Point {
    basis: Basis,
    inner: Rc<PointInner>,
}

impl Point {
    pub(crate) fn leaf(basis: &Basis) -> Self {
        let index = basis.next_point();
        let mut decomposition = BTreeMap::new();
        decomposition.insert(index, 1.0);
        Self {
            basis: basis.clone(),
            inner: Rc::new(PointInner {
                leaf: Some(index),
                decomposition,
            }),
        }
    }

    /// The origin. It does not consume a basis index.
    pub fn zero(basis: &Basis) -> Self {
        Self::from_decomposition(basis, BTreeMap::new())
    }

    fn from_decomposition(basis: &Basis, mut decomposition: BTreeMap<usize, f64>) -> Self {
        decomposition.retain(|_, weight| *weight != 0.0);
        Self {
            basis: basis.clone(),
            inner: Rc::new(PointInner {
                leaf: None,
                decomposition,
            }),
        }
    }

    pub fn basis(&self) -> &Basis {
        &self.basis
    }

    pub fn is_leaf(&self) -> bool {
        self.inner.leaf.is_some()
    }

    /// Index of the leaf in the Gram matrix, `None` for composites.
    pub fn leaf_index(&self) -> Option<usize> {
        self.inner.leaf
    }

    /// Coefficients of this point over leaf indices.
    pub fn decomposition(&self) -> &BTreeMap<usize, f64> {
        &self.inner.decomposition
    }

    /// Whether both handles denote the very same symbolic point.
    pub fn is_same(&self, other: &Point) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Inner product, expanded bilinearly over leaf pairs.
    pub fn dot(&self, other: &Point) -> Expression {
        self.basis.assert_same(&other.basis, "points");
        let mut terms = BTreeMap::new();
        for (&i, &a) in self.decomposition() {
            for (&j, &b) in other.decomposition() {
                *terms.entry(Term::product(i, j)).or_insert(0.0) += a * b;
            }
        }
        Expression::from_canonical(&self.basis, terms)
    }

    pub fn norm_squared(&self) -> Expression {
        self.dot(self)
    }

    /// Coordinates of the point in the last certificate, if one is available.
    pub fn eval(&self) -> Option<Array1<f64>> {
        let certificate = self.basis.certificate()?;
        let mut value = Array1::zeros(certificate.dimension());
        for (&index, &weight) in self.decomposition() {
            value.scaled_add(weight, &certificate.point(index)?);
        }
        Some(value)
    }

    fn combine(&self, other: &Point, sign: f64) -> Point {
        self.basis.assert_same(&other.basis, "points");
        let mut decomposition = self.decomposition().clone();
        for (&index, &weight) in other.decomposition() {
            *decomposition.entry(index).or_insert(0.0) += sign * weight;
        }
        Point::from_decomposition(&self.basis, decomposition)
    }

    fn scale(&self, factor: f64) -> Point {
        let decomposition = self
            .decomposition()
            .iter()
            .map(|(&index, &weight)| (index, factor * weight))
            .collect();
        Point::from_decomposition(&self.basis, decomposition)
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.leaf {
            Some(index) => write!(f, "Point::Leaf({})", index),
            None => f
                .debug_tuple("Point::Composite")
                .field(&self.inner.decomposition)
                .finish(),
        }
    }
}

macro_rules! impl_point_binop {
    ($trait:ident, $method:ident, $sign:expr) => {
        impl $trait<Point> for Point {
            type Output = Point;
            fn $method(self, rhs: Point) -> Point {
                self.combine(&rhs, $sign)
            }
        }

        impl $trait<&Point> for Point {
            type Output = Point;
            fn $method(self, rhs: &Point) -> Point {
                self.combine(rhs, $sign)
            }
        }

        impl $trait<Point> for &Point {
            type Output = Point;
            fn $method(self, rhs: Point) -> Point {
                self.combine(&rhs, $sign)
            }
        }

        impl $trait<&Point> for &Point {
            type Output = Point;
            fn $method(self, rhs: &Point) -> Point {
                self.combine(rhs, $sign)
            }
        }
    };
}

impl_point_binop!(Add, add, 1.0);
impl_point_binop!(Sub, sub, -1.0);

macro_rules! impl_point_inner_product {
    ($lhs:ty, $rhs:ty) => {
        impl Mul<$rhs> for $lhs {
            type Output = Expression;
            fn mul(self, rhs: $rhs) -> Expression {
                self.dot(&rhs)
            }
        }
    };
}

impl_point_inner_product!(Point, Point);
impl_point_inner_product!(Point, &Point);
impl_point_inner_product!(&Point, Point);
impl_point_inner_product!(&Point, &Point);

impl Mul<f64> for Point {
    type Output = Point;
    fn mul(self, rhs: f64) -> Point {
        self.scale(rhs)
    }
}

impl Mul<f64> for &Point {
    type Output = Point;
    fn mul(self, rhs: f64) -> Point {
        self.scale(rhs)
    }
}

impl Mul<Point> for f64 {
    type Output = Point;
    fn mul(self, rhs: Point) -> Point {
        rhs.scale(self)
    }
}

impl Mul<&Point> for f64 {
    type Output = Point;
    fn mul(self, rhs: &Point) -> Point {
        rhs.scale(self)
    }
}

impl Div<f64> for Point {
    type Output = Point;
    fn div(self, rhs: f64) -> Point {
        self.scale(1.0 / rhs)
    }
}

impl Div<f64> for &Point {
    type Output = Point;
    fn div(self, rhs: f64) -> Point {
        self.scale(1.0 / rhs)
    }
}

impl Neg for Point {
    type Output = Point;
    fn neg(self) -> Point {
        self.scale(-1.0)
    }
}

impl Neg for &Point {
    type Output = Point;
    fn neg(self) -> Point {
        self.scale(-1.0)
    }
}
