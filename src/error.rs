use symbolic_evaluation::ThreadPoolBuildError;
use thiserror::Error;

use crate::{program::MalformedProgramError, solver::SolverError, value::EvalError};

/// Errors of the analysis as a whole. Per-path problems such as faults or
/// exceeded loop bounds are not errors, they end up in the report.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    MalformedProgram(#[from] MalformedProgramError),

    #[error("Solver failure: {0}")]
    Solver(#[from] SolverError),

    #[error("Could not start the worker pool: {0}")]
    WorkerPool(#[from] ThreadPoolBuildError),

    #[error("Evaluation under a model failed: {0}")]
    Eval(#[from] EvalError),
}

pub type Result<T> = std::result::Result<T, Error>;
