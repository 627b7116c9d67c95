//! Primitive algorithmic steps whose outputs are defined implicitly.

use crate::error::Result;

use super::expression::Expression;
use super::function::Function;
use super::point::Point;

/// `x = x0 - gamma * gx` with `gx ∈ ∂f(x)`.
///
/// The subgradient is a fresh leaf recorded on `f` at `x`. Returns
/// `(x, gx, f(x))`.
pub fn proximal_step(x0: &Point, f: &Function, gamma: f64) -> Result<(Point, Point, Expression)> {
    let gx = Point::leaf(x0.basis());
    let x = x0 - &gx * gamma;
    let fx = f.add_point(&x, &gx)?;
    Ok((x, gx, fx))
}

/// Mirror step `∇h(x) = ∇h(x0) - gamma * gx0`.
///
/// `x` is a fresh leaf at which `mirror` receives the subgradient
/// `sx = sx0 - gamma * gx0`. Returns `(x, sx, h(x))`.
pub fn bregman_gradient_step(
    gx0: &Point,
    sx0: &Point,
    mirror: &Function,
    gamma: f64,
) -> Result<(Point, Point, Expression)> {
    let sx = sx0 - gx0 * gamma;
    let x = Point::leaf(sx0.basis());
    let hx = mirror.add_point(&x, &sx)?;
    Ok((x, sx, hx))
}
