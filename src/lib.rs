//! Symbolic execution of small integer programs.
//!
//! A [`Function`] is a control-flow graph of basic blocks over fixed-width
//! integer variables, built either from raw blocks or from a statement tree
//! ([`ast::FunctionDef`]). An [`Explorer`] runs it on symbolic inputs, forking
//! at every branch whose condition can go both ways, and reports one
//! [`PathResult`] per path: how it ended (a return, a division by zero, an
//! overflow, an exceeded loop bound, or cancellation), under which path
//! condition, and with an example input.
//!
//! ```no_run
//! use symbolic_c::{fixtures, Config, Explorer};
//!
//! let function = fixtures::b_algebra().build()?;
//! let report = Explorer::new(Config::default()).explore(&function)?;
//! for fault in report.faults() {
//!     println!("{}", fault);
//! }
//! # Ok::<(), symbolic_c::Error>(())
//! ```

pub mod ast;
pub mod bytecode;
pub mod config;
pub mod constraint;
pub mod context;
pub mod dynamic;
pub mod error;
pub mod evaluation;
pub mod fixtures;
pub mod lower;
pub mod program;
pub mod report;
pub mod solver;
pub mod state;
pub mod ty;
pub mod value;
pub mod watchdog;

pub use config::{Config, SearchStrategy};
pub use error::{Error, Result};
pub use evaluation::Explorer;
pub use program::{Function, MalformedProgramError};
pub use report::{PathResult, ProbeValues, Reachability, Report, ValueSet, Verdict};
pub use solver::{ConstraintSolver, SatResult, Z3Solver};
pub use state::{Decision, Outcome};
pub use ty::Type;
pub use value::{Assignment, Value};
pub use watchdog::Watchdog;
