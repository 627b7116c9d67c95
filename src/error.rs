use thiserror::Error;

use crate::math::sdp::SolverStatus;

/// Errors raised while building, compiling or solving a performance estimation problem.
#[derive(Debug, Error)]
pub enum Error {
    /// An expression refers to a term that does not exist in the problem's basis.
    #[error("malformed expression: {0}")]
    MalformedExpression(String),

    /// A point or expression was minted by another problem instance.
    #[error("basis epoch mismatch: expected epoch {expected}, found {found}")]
    EpochMismatch { expected: u64, found: u64 },

    /// The solved Gram matrix is too far from the PSD cone to be a rounding artefact.
    #[error(
        "Gram matrix is not positive semidefinite: minimum eigenvalue {min_eigenvalue:.3e} is below -{tolerance:.1e}"
    )]
    NonPsdGram { min_eigenvalue: f64, tolerance: f64 },

    /// The SDP backend did not reach an optimal solution.
    #[error("SDP solver finished with status {status}")]
    SolverFailed { status: SolverStatus },

    #[error("no performance metric was set")]
    NoPerformanceMetric,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Every constituent of a composite function already has a gradient at the point.
    #[error("cannot record a gradient at a point where every constituent function is already fixed")]
    OverdeterminedGradient,

    #[error("linear algebra failure: {0}")]
    LinearAlgebra(String),
}

pub type Result<T> = std::result::Result<T, Error>;
