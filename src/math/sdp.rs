//! Semidefinite programs in linear-matrix-inequality form and the solver
//! interface used to discharge them.

pub mod interior_point;

use std::fmt;

use ndarray::Array1;

use crate::error::{Error, Result};

pub use interior_point::InteriorPointSolver;

/// Entry of a sparse symmetric matrix. Off-diagonal entries stand for both
/// `(row, col)` and `(col, row)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymmetricEntry {
    pub row: usize,
    pub col: usize,
    pub value: f64,
}

impl SymmetricEntry {
    pub fn new(row: usize, col: usize, value: f64) -> Self {
        Self { row, col, value }
    }
}

/// Scalar constraint `constant - Σ coefficient · y[index] >= 0`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinearRow {
    pub constant: f64,
    pub coefficients: Vec<(usize, f64)>,
}

/// A semidefinite program over a free variable vector `y`:
///
/// ```text
/// maximize    bᵀy
/// subject to  C - Σ y_i A_i ⪰ 0          (one PSD block of size psd_dim)
///             c_k - Σ a_ki y_i >= 0      (one row per linear constraint)
/// ```
#[derive(Debug, Clone)]
pub struct SdpProblem {
    /// `b`, one entry per variable.
    pub objective: Array1<f64>,
    pub psd_dim: usize,
    /// `C`.
    pub psd_constant: Vec<SymmetricEntry>,
    /// `A_i` for every variable; empty when a variable does not touch the PSD block.
    pub psd_coefficients: Vec<Vec<SymmetricEntry>>,
    pub rows: Vec<LinearRow>,
}

impl SdpProblem {
    /// An empty program with `num_variables` unconstrained variables.
    pub fn new(objective: Array1<f64>, psd_dim: usize) -> Self {
        let num_variables = objective.len();
        Self {
            objective,
            psd_dim,
            psd_constant: Vec::new(),
            psd_coefficients: vec![Vec::new(); num_variables],
            rows: Vec::new(),
        }
    }

    pub fn num_variables(&self) -> usize {
        self.objective.len()
    }

    /// Checks dimensions, indices and finiteness of the data.
    pub fn validate(&self) -> Result<()> {
        let m = self.num_variables();
        if self.psd_coefficients.len() != m {
            return Err(Error::InvalidParameter(format!(
                "expected PSD coefficients for {} variables, got {}",
                m,
                self.psd_coefficients.len()
            )));
        }
        if self.objective.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidParameter(
                "objective has non-finite entries".to_string(),
            ));
        }

        let entries = self
            .psd_constant
            .iter()
            .chain(self.psd_coefficients.iter().flatten());
        for entry in entries {
            if entry.row >= self.psd_dim || entry.col >= self.psd_dim {
                return Err(Error::InvalidParameter(format!(
                    "PSD entry ({}, {}) outside a block of size {}",
                    entry.row, entry.col, self.psd_dim
                )));
            }
            if !entry.value.is_finite() {
                return Err(Error::InvalidParameter(
                    "PSD block has non-finite entries".to_string(),
                ));
            }
        }

        for (k, row) in self.rows.iter().enumerate() {
            if !row.constant.is_finite() {
                return Err(Error::InvalidParameter(format!(
                    "row {} has a non-finite constant",
                    k
                )));
            }
            for &(index, value) in &row.coefficients {
                if index >= m || !value.is_finite() {
                    return Err(Error::InvalidParameter(format!(
                        "row {} has an invalid coefficient ({}, {})",
                        k, index, value
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Termination status of an SDP solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    Optimal,
    /// Converged to the loose tolerance only.
    OptimalInaccurate,
    Infeasible,
    Unbounded,
    MaxIterations,
    NumericalFailure,
}

impl SolverStatus {
    /// Whether the returned point may be used as a solution.
    pub fn is_success(&self) -> bool {
        matches!(self, SolverStatus::Optimal | SolverStatus::OptimalInaccurate)
    }
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolverStatus::Optimal => "optimal",
            SolverStatus::OptimalInaccurate => "optimal (inaccurate)",
            SolverStatus::Infeasible => "infeasible",
            SolverStatus::Unbounded => "unbounded",
            SolverStatus::MaxIterations => "maximum iterations reached",
            SolverStatus::NumericalFailure => "numerical failure",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct SdpSolution {
    pub status: SolverStatus,
    /// `bᵀy` at the returned point.
    pub objective: f64,
    pub y: Array1<f64>,
    pub iterations: usize,
    pub primal_residual: f64,
    pub dual_residual: f64,
    pub gap: f64,
}

/// A backend able to solve an [`SdpProblem`].
///
/// Unsuccessful terminations are reported through
/// [`SdpSolution::status`]; `Err` is reserved for malformed input.
pub trait SdpSolver {
    fn solve(&self, problem: &SdpProblem) -> Result<SdpSolution>;
}

/// Configuration of the interior-point backend.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub max_iterations: usize,
    /// Relative residual and gap required for [`SolverStatus::Optimal`].
    pub tolerance: f64,
    /// Relative residual and gap accepted as [`SolverStatus::OptimalInaccurate`].
    pub loose_tolerance: f64,
    pub infeasibility_tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-8,
            loose_tolerance: 1e-5,
            infeasibility_tolerance: 1e-8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_validate_accepts_well_formed_problem() {
        let mut problem = SdpProblem::new(array![1.0, 0.0], 2);
        problem.psd_coefficients[1].push(SymmetricEntry::new(0, 1, -1.0));
        problem.rows.push(LinearRow {
            constant: 1.0,
            coefficients: vec![(0, 1.0)],
        });
        assert!(problem.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_entries() {
        let mut problem = SdpProblem::new(array![1.0], 2);
        problem.psd_coefficients[0].push(SymmetricEntry::new(0, 2, 1.0));
        assert!(matches!(problem.validate(), Err(Error::InvalidParameter(_))));

        let mut problem = SdpProblem::new(array![1.0], 0);
        problem.rows.push(LinearRow {
            constant: 0.0,
            coefficients: vec![(3, 1.0)],
        });
        assert!(problem.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_finite_data() {
        let mut problem = SdpProblem::new(array![1.0], 0);
        problem.rows.push(LinearRow {
            constant: f64::NAN,
            coefficients: vec![(0, 1.0)],
        });
        assert!(problem.validate().is_err());
    }

    #[test]
    fn test_status_success_and_display() {
        assert!(SolverStatus::Optimal.is_success());
        assert!(SolverStatus::OptimalInaccurate.is_success());
        assert!(!SolverStatus::Unbounded.is_success());
        assert_eq!(SolverStatus::Infeasible.to_string(), "infeasible");
    }
}
