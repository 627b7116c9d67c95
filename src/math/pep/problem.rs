use std::rc::Rc;

use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::math::sdp::{InteriorPointSolver, SdpSolver, SolverConfig, SolverStatus};

use super::basis::Basis;
use super::certificate::{self, Certificate};
use super::compile::{flatten, CompiledPep, LinearForm};
use super::expression::Expression;
use super::function::{Function, FunctionClass};
use super::point::Point;

/// Configuration of [`Pep::solve`].
#[derive(Debug, Clone)]
pub struct SolveConfig {
    pub solver: SolverConfig,
    /// Most negative Gram eigenvalue accepted as solver noise.
    pub psd_tolerance: f64,
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            solver: SolverConfig::default(),
            psd_tolerance: 1e-4,
        }
    }
}

/// A performance estimation problem.
///
/// Functions and initial points are declared here, the algorithm is then
/// written with the returned handles, and [`Pep::solve`] computes the worst
/// case of the smallest performance metric over every instance satisfying
/// the initial conditions.
#[derive(Debug)]
pub struct Pep {
    basis: Basis,
    functions: Vec<Function>,
    initial_points: Vec<Point>,
    initial_conditions: Vec<Expression>,
    performance_metrics: Vec<Expression>,
}

impl Pep {
    /// Creates an empty problem with its own basis.
    pub fn new() -> Self {
        Self {
            basis: Basis::new(),
            functions: Vec::new(),
            initial_points: Vec::new(),
            initial_conditions: Vec::new(),
            performance_metrics: Vec::new(),
        }
    }

    pub fn basis(&self) -> &Basis {
        &self.basis
    }

    /// Declares a leaf function of the given class.
    ///
    /// With `reuse_gradient`, repeated oracle calls at the same point return
    /// the same subgradient. Differentiable classes always reuse.
    pub fn declare_function<C>(&mut self, class: C, reuse_gradient: bool) -> Function
    where
        C: FunctionClass + 'static,
    {
        let function = Function::leaf(&self.basis, Box::new(class), reuse_gradient);
        self.functions.push(function.clone());
        function
    }

    /// Mints a new leaf point, typically a starting iterate.
    pub fn set_initial_point(&mut self) -> Point {
        let point = Point::leaf(&self.basis);
        self.initial_points.push(point.clone());
        point
    }

    /// Adds a constraint `condition <= 0` on the problem instances.
    pub fn set_initial_condition(&mut self, condition: Expression) {
        self.initial_conditions.push(condition);
    }

    /// Adds a performance metric. With several metrics the problem
    /// maximizes their minimum.
    pub fn set_performance_metric(&mut self, metric: Expression) {
        self.performance_metrics.push(metric);
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn initial_points(&self) -> &[Point] {
        &self.initial_points
    }

    pub fn initial_conditions(&self) -> &[Expression] {
        &self.initial_conditions
    }

    pub fn performance_metrics(&self) -> &[Expression] {
        &self.performance_metrics
    }

    /// The certificate of the last successful solve.
    pub fn certificate(&self) -> Option<Rc<Certificate>> {
        self.basis.certificate()
    }

    /// Lowers every metric, condition and interpolation constraint onto the
    /// current basis.
    pub fn compile(&self) -> Result<CompiledPep> {
        if self.performance_metrics.is_empty() {
            return Err(Error::NoPerformanceMetric);
        }

        let gram_dim = self.basis.point_count();
        let value_dim = self.basis.value_count();
        info!(
            "Setting up the problem: Gram matrix {}x{}, {} function value(s)",
            gram_dim, gram_dim, value_dim
        );

        let metrics = self.flatten_all(&self.performance_metrics)?;
        info!(
            "Performance measure is the minimum of {} element(s)",
            metrics.len()
        );
        let conditions = self.flatten_all(&self.initial_conditions)?;
        info!("Initial conditions: {} constraint(s)", conditions.len());

        let mut class_constraints = Vec::new();
        for function in &self.functions {
            let constraints = function.interpolation_constraints();
            debug!(
                "Function {} ({}): {} interpolation constraint(s)",
                function.index().unwrap_or_default(),
                function.name(),
                constraints.len()
            );
            class_constraints.extend(self.flatten_all(&constraints)?);
        }
        info!(
            "Interpolation conditions for {} function(s): {} constraint(s)",
            self.functions.len(),
            class_constraints.len()
        );

        Ok(CompiledPep {
            gram_dim,
            value_dim,
            metrics,
            conditions,
            class_constraints,
        })
    }

    fn flatten_all(&self, expressions: &[Expression]) -> Result<Vec<LinearForm>> {
        expressions
            .iter()
            .map(|expression| flatten(expression, &self.basis))
            .collect()
    }

    /// Solves the problem with the built-in interior-point backend and
    /// returns the worst-case value.
    pub fn solve(&self, config: &SolveConfig) -> Result<f64> {
        let solver = InteriorPointSolver::new(config.solver.clone());
        self.solve_with(&solver, config)
    }

    /// Solves the problem with any SDP backend.
    ///
    /// On success the certificate is attached to the basis, so that
    /// [`Point::eval`] and [`Expression::eval`] return concrete values.
    /// On failure no certificate is available.
    pub fn solve_with(&self, solver: &dyn SdpSolver, config: &SolveConfig) -> Result<f64> {
        self.basis.set_certificate(None);
        let compiled = self.compile()?;
        let problem = compiled.to_sdp();
        info!(
            "Compiled into an SDP with {} variables and {} scalar constraint(s)",
            problem.num_variables(),
            problem.rows.len()
        );

        let solution = solver.solve(&problem)?;
        if !solution.status.is_success() {
            return Err(Error::SolverFailed {
                status: solution.status,
            });
        }
        if solution.status == SolverStatus::OptimalInaccurate {
            warn!(
                "Solver reached only the loose tolerance (primal {:.2e}, dual {:.2e}, gap {:.2e})",
                solution.primal_residual, solution.dual_residual, solution.gap
            );
        }
        info!(
            "Solver status: {} after {} iteration(s), worst-case value {:.8}",
            solution.status, solution.iterations, solution.objective
        );

        let gram = compiled.gram_from_solution(&solution.y);
        let values = compiled.values_from_solution(&solution.y);
        let certificate = certificate::reconstruct(gram, values, config.psd_tolerance)?;
        self.basis.set_certificate(Some(Rc::new(certificate)));
        Ok(solution.objective)
    }
}

impl Default for Pep {
    fn default() -> Self {
        Self::new()
    }
}
