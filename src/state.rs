//! Evaluation states.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use symbolic_evaluation::traits::Transition;

use crate::{
  bytecode::{BlockId, Location},
  config::Config,
  constraint::PathCondition,
  dynamic,
  program::Function,
  solver::ConstraintSolver,
  value::Value,
  watchdog::Watchdog,
};

mod local;
mod termination;

pub use local::LocalMemory;
pub use termination::{Outcome, TerminationStatus};

/// What every path of one exploration shares, read-only.
#[derive(Clone, Copy)]
pub struct Environment<'a> {
  pub function: &'a Function,
  pub solver: &'a dyn ConstraintSolver,
  pub config: &'a Config,
  pub watchdog: &'a Watchdog,
}

/// An assumption a path made to get where it is.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
  /// Took the then (`taken`) or else side of the branch closing `block`.
  Branch { block: BlockId, taken: bool },
  /// Continued past a division assuming a non-zero divisor.
  NonZeroDivisor { at: Location },
  /// Continued past an arithmetic operation assuming it does not overflow.
  NoOverflow { at: Location },
}

impl fmt::Display for Decision {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Decision::Branch { block, taken: true } => write!(f, "bb{}:then", block),
      Decision::Branch { block, taken: false } => write!(f, "bb{}:else", block),
      Decision::NonZeroDivisor { at } => write!(f, "{}:divisor != 0", at),
      Decision::NoOverflow { at } => write!(f, "{}:no overflow", at),
    }
  }
}

/// A path crossing a probe.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProbeHit {
  pub label: String,
  pub block: BlockId,
  /// Symbolic values of the program variables at the probe.
  pub values: BTreeMap<String, Value>,
  pub path_condition: PathCondition,
}

/// The state of one path.
#[derive(Clone)]
pub struct EvalState<'a> {
  pub(crate) env: Environment<'a>,
  /// Current block.
  pub(crate) block: BlockId,
  /// Index of the next operation of the current block.
  pub(crate) op: usize,
  pub locals: LocalMemory,
  pub pc: PathCondition,
  pub decisions: Vec<Decision>,
  /// Back-edge traversals per loop header.
  pub back_edges: BTreeMap<BlockId, usize>,
  pub probes: Vec<ProbeHit>,
  pub visited: BTreeSet<BlockId>,
  /// Some query on this path came back unknown.
  pub uncertain: bool,
  pub ts: TerminationStatus,
}

impl<'a> EvalState<'a> {
  /// The state at function entry, parameters bound to fresh input symbols.
  pub fn new(env: Environment<'a>) -> Self {
    let locals = LocalMemory::from_params(env.function.params());
    Self {
      env,
      block: env.function.entry(),
      op: 0,
      locals,
      pc: PathCondition::new(),
      decisions: Vec::new(),
      back_edges: BTreeMap::new(),
      probes: Vec::new(),
      visited: BTreeSet::new(),
      uncertain: false,
      ts: TerminationStatus::None,
    }
  }

  pub fn location(&self) -> Location {
    Location { block: self.block, op: self.op }
  }

  pub fn termination_status(&self) -> &TerminationStatus {
    &self.ts
  }

  /// Terminate the path with `outcome`.
  pub(crate) fn finish(mut self, outcome: Outcome) -> Self {
    self.ts = TerminationStatus::Finished(outcome);
    self
  }
}

impl<'a> Transition for EvalState<'a> {
  type IntoIter = Vec<EvalState<'a>>;

  fn suc(self) -> Vec<EvalState<'a>> {
    debug_assert!(!self.is_final());
    dynamic::step(self)
  }

  fn is_final(&self) -> bool {
    self.ts.is_final()
  }
}

impl<'a> fmt::Debug for EvalState<'a> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_struct("EvalState")
      .field("function", &self.env.function.name())
      .field("location", &self.location())
      .field("pc", &self.pc.to_string())
      .field("ts", &self.ts)
      .finish()
  }
}

impl<'a> fmt::Display for EvalState<'a> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    writeln!(f, "at {} under {}", self.location(), self.pc)?;
    write!(f, "{}", self.locals)
  }
}
