pub mod pep;
pub mod sdp;

pub use pep::{
    bregman_gradient_step, proximal_step, Basis, Certificate, CompiledPep, Expression, Function,
    FunctionClass, LinearForm, Pep, Point, SolveConfig, Term, Triplet,
};

pub use sdp::{
    InteriorPointSolver, LinearRow, SdpProblem, SdpSolution, SdpSolver, SolverConfig,
    SolverStatus, SymmetricEntry,
};
