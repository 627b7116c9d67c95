//! Performance estimation problems.
//!
//! Worst-case guarantees of first-order methods are computed by writing the
//! method symbolically over abstract [`Point`]s and [`Expression`]s, then
//! compiling the resulting problem into a semidefinite program over the
//! Gram matrix of the leaf points and the vector of leaf function values.
//!
//! ```no_run
//! use pepkit::math::pep::{functions::SmoothConvexFunction, Pep, SolveConfig};
//!
//! # fn main() -> pepkit::Result<()> {
//! let mut problem = Pep::new();
//! let f = problem.declare_function(SmoothConvexFunction::new(1.0)?, true);
//! let xs = f.stationary_point()?;
//! let fs = f.value(&xs);
//! let x0 = problem.set_initial_point();
//!
//! let x1 = &x0 - f.gradient(&x0);
//! problem.set_initial_condition((&x0 - &xs).norm_squared() - 1.0);
//! problem.set_performance_metric(f.value(&x1) - fs);
//!
//! let tau = problem.solve(&SolveConfig::default())?;
//! assert!((tau - 1.0 / 6.0).abs() < 1e-4);
//! # Ok(())
//! # }
//! ```

pub mod basis;
pub mod certificate;
pub mod compile;
pub mod expression;
pub mod function;
pub mod functions;
pub mod point;
pub mod problem;
pub mod steps;


pub use basis::Basis;
pub use certificate::Certificate;
pub use compile::{CompiledPep, LinearForm};
pub use expression::{Expression, Term};
pub use function::{Function, FunctionClass, Triplet};
pub use point::Point;
pub use problem::{Pep, SolveConfig};
pub use steps::{bregman_gradient_step, proximal_step};
