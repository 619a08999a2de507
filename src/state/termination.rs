use std::fmt;

use serde::Serialize;

use crate::{
    bytecode::{BlockId, Location},
    report::InfeasibleBranch,
    value::{BinOp, Value},
};

/// How a path ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Returned { value: Option<Value> },
    DivisionByZero { at: Location, divisor: Value },
    Overflow { at: Location, op: BinOp, expr: Value },
    LoopBoundExceeded { header: BlockId, bound: usize },
    /// The watchdog stopped the path.
    Cancelled,
}

impl Outcome {
    pub fn is_fault(&self) -> bool {
        matches!(self, Outcome::DivisionByZero { .. } | Outcome::Overflow { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Outcome::Returned { value: Some(v) } => write!(f, "returns {}", v),
            Outcome::Returned { value: None } => write!(f, "returns"),
            Outcome::DivisionByZero { at, divisor } => write!(f, "division by zero at {}: {} == 0", at, divisor),
            Outcome::Overflow { at, op, expr } => write!(f, "{} overflows at {}: {}", op.symbol(), at, expr),
            Outcome::LoopBoundExceeded { header, bound } => {
                write!(f, "loop at bb{} exceeds the bound of {} iterations", header, bound)
            }
            Outcome::Cancelled => write!(f, "exploration cancelled"),
        }
    }
}

/// The termination status of an evaluation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TerminationStatus {
    /// Still running
    None,
    Finished(Outcome),
    /// Pruned: the branch it was about to take is infeasible.
    Unsat(InfeasibleBranch),
}

impl TerminationStatus {
    /// Return true iff the current evaluation state is final.
    pub fn is_final(&self) -> bool {
        !matches!(self, TerminationStatus::None)
    }
}

impl fmt::Display for TerminationStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TerminationStatus::None => write!(f, "Still running"),
            TerminationStatus::Finished(outcome) => write!(f, "{}", outcome),
            TerminationStatus::Unsat(branch) => write!(f, "Unsatisfiable: {}", branch),
        }
    }
}
