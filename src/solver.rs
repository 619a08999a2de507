//! Constraint solving.
//!
//! [`ConstraintSolver`] is the seam between the engine and a decision
//! procedure. The shipped backend, [`Z3Solver`], lowers [`Value`] trees to
//! bit-vector terms of the exact widths of their types, so wrap-around,
//! signedness and division semantics agree with [`Value::evaluate`].

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace};
use z3::{
    ast::{Ast, Bool, BV},
    Context, Model, Params, Solver,
};

use crate::{
    context::with_context,
    ty::Type,
    value::{Assignment, BinOp, CmpOp, LogicOp, Node, Value},
};

/// The answer to a satisfiability query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum SatResult {
    Sat,
    Unsat,
    /// The solver gave up, usually on a timeout.
    Unknown,
}

/// A query result, with a model when the constraint is satisfiable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Solution {
    pub result: SatResult,
    pub model: Option<Assignment>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SolverError {
    #[error("Expected a {expected} term, found {expr}")]
    Sort { expected: &'static str, expr: String },

    #[error("The solver reported sat without a model")]
    MissingModel,

    #[error("The model has no value for {symbol}")]
    MissingValue { symbol: String },
}

/// A decision procedure for boolean [`Value`]s.
///
/// Implementations must be pure: the answer depends on the query only.
pub trait ConstraintSolver: Send + Sync {
    /// Decide `constraint` within `timeout`, producing a model if it is
    /// satisfiable and `want_model` is set.
    fn solve(&self, constraint: &Value, timeout: Duration, want_model: bool) -> Result<Solution, SolverError>;

    fn check(&self, constraint: &Value, timeout: Duration) -> Result<SatResult, SolverError> {
        Ok(self.solve(constraint, timeout, false)?.result)
    }

    /// An input assignment satisfying `constraint`, if the solver finds one.
    fn find_example(&self, constraint: &Value, timeout: Duration) -> Result<Option<Assignment>, SolverError> {
        let solution = self.solve(constraint, timeout, true)?;
        Ok(match solution.result {
            SatResult::Sat => solution.model,
            _ => None,
        })
    }
}

/// Z3 over fixed-width bit-vectors. Each query runs on a fresh solver in the
/// Z3 context of the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct Z3Solver;

impl Z3Solver {
    pub fn new() -> Self {
        Self
    }
}

impl ConstraintSolver for Z3Solver {
    fn solve(&self, constraint: &Value, timeout: Duration, want_model: bool) -> Result<Solution, SolverError> {
        // constant conditions need no solver
        if let Some(b) = constraint.as_bool() {
            let result = if b { SatResult::Sat } else { SatResult::Unsat };
            let model = if b && want_model { Some(Assignment::new()) } else { None };
            return Ok(Solution { result, model });
        }
        with_context(|ctx| {
            let formula = lower_bool(ctx, constraint)?;
            let solver = Solver::new(ctx);
            let mut params = Params::new(ctx);
            params.set_u32("timeout", timeout_millis(timeout));
            solver.set_params(&params);
            solver.assert(&formula);
            let result = match solver.check() {
                z3::SatResult::Sat => SatResult::Sat,
                z3::SatResult::Unsat => SatResult::Unsat,
                z3::SatResult::Unknown => {
                    debug!(%constraint, timeout_ms = timeout_millis(timeout), "solver returned unknown");
                    SatResult::Unknown
                }
            };
            trace!(%constraint, ?result, "query");
            let model = match (result, want_model) {
                (SatResult::Sat, true) => {
                    let model = solver.get_model().ok_or(SolverError::MissingModel)?;
                    Some(read_model(ctx, &model, constraint)?)
                }
                _ => None,
            };
            Ok(Solution { result, model })
        })
    }
}

fn timeout_millis(timeout: Duration) -> u32 {
    // zero would disable the timeout altogether
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX).max(1)
}

// Values of every input symbol of `constraint` under `model`.
fn read_model(ctx: &Context, model: &Model, constraint: &Value) -> Result<Assignment, SolverError> {
    let mut assignment = Assignment::new();
    for (symbol, ty) in constraint.symbols() {
        let value = match ty {
            Type::Bool => model
                .eval(&Bool::new_const(ctx, symbol.as_str()), true)
                .and_then(|b| b.as_bool())
                .map(|b| b as i128),
            ty => model
                .eval(&BV::new_const(ctx, symbol.as_str(), ty.bits()), true)
                .and_then(|bv| bv.as_u64())
                .map(|raw| ty.from_bits(raw)),
        };
        match value {
            Some(v) => assignment.insert(symbol, v),
            None => return Err(SolverError::MissingValue { symbol }),
        }
    }
    Ok(assignment)
}

enum Term<'ctx> {
    Bool(Bool<'ctx>),
    BV(BV<'ctx>),
}

fn lower_bool<'ctx>(ctx: &'ctx Context, v: &Value) -> Result<Bool<'ctx>, SolverError> {
    match lower(ctx, v)? {
        Term::Bool(b) => Ok(b),
        Term::BV(_) => Err(SolverError::Sort {
            expected: "boolean",
            expr: v.to_string(),
        }),
    }
}

fn lower_bv<'ctx>(ctx: &'ctx Context, v: &Value) -> Result<BV<'ctx>, SolverError> {
    match lower(ctx, v)? {
        Term::BV(bv) => Ok(bv),
        Term::Bool(_) => Err(SolverError::Sort {
            expected: "bit-vector",
            expr: v.to_string(),
        }),
    }
}

fn lower<'ctx>(ctx: &'ctx Context, v: &Value) -> Result<Term<'ctx>, SolverError> {
    Ok(match v.node() {
        Node::Int { value, ty } => Term::BV(BV::from_u64(ctx, ty.to_bits(*value), ty.bits())),
        Node::Bool(b) => Term::Bool(Bool::from_bool(ctx, *b)),
        Node::Symbol { name, ty: Type::Bool } => Term::Bool(Bool::new_const(ctx, name.as_str())),
        Node::Symbol { name, ty } => Term::BV(BV::new_const(ctx, name.as_str(), ty.bits())),
        Node::Binary { op, lhs, rhs } => {
            let (a, b) = (lower_bv(ctx, lhs)?, lower_bv(ctx, rhs)?);
            Term::BV(arith(*op, lhs.ty().is_signed(), &a, &b))
        }
        Node::Compare { op, lhs, rhs } => {
            let (a, b) = (lower_bv(ctx, lhs)?, lower_bv(ctx, rhs)?);
            let signed = lhs.ty().is_signed();
            Term::Bool(match op {
                CmpOp::Eq => a._eq(&b),
                CmpOp::Ne => a._eq(&b).not(),
                CmpOp::Lt if signed => a.bvslt(&b),
                CmpOp::Lt => a.bvult(&b),
                CmpOp::Le if signed => a.bvsle(&b),
                CmpOp::Le => a.bvule(&b),
                CmpOp::Gt if signed => a.bvsgt(&b),
                CmpOp::Gt => a.bvugt(&b),
                CmpOp::Ge if signed => a.bvsge(&b),
                CmpOp::Ge => a.bvuge(&b),
            })
        }
        Node::Not(x) => Term::Bool(lower_bool(ctx, x)?.not()),
        Node::Logic { op, lhs, rhs } => {
            let (a, b) = (lower_bool(ctx, lhs)?, lower_bool(ctx, rhs)?);
            Term::Bool(match op {
                LogicOp::And => Bool::and(ctx, &[&a, &b]),
                LogicOp::Or => Bool::or(ctx, &[&a, &b]),
            })
        }
        Node::Overflows { op, lhs, rhs } => {
            let ty = lhs.ty();
            let (a, b) = (lower_bv(ctx, lhs)?, lower_bv(ctx, rhs)?);
            Term::Bool(overflows(*op, ty, &a, &b))
        }
    })
}

fn arith<'ctx>(op: BinOp, signed: bool, a: &BV<'ctx>, b: &BV<'ctx>) -> BV<'ctx> {
    match op {
        BinOp::Add => a.bvadd(b),
        BinOp::Sub => a.bvsub(b),
        BinOp::Mul => a.bvmul(b),
        BinOp::Div if signed => a.bvsdiv(b),
        BinOp::Div => a.bvudiv(b),
        BinOp::Rem if signed => a.bvsrem(b),
        BinOp::Rem => a.bvurem(b),
        BinOp::BitAnd => a.bvand(b),
        BinOp::BitOr => a.bvor(b),
        BinOp::BitXor => a.bvxor(b),
    }
}

// Compute at twice the width, where the exact result of any of the checked
// operators fits, and test whether truncating it loses information.
fn overflows<'ctx>(op: BinOp, ty: Type, a: &BV<'ctx>, b: &BV<'ctx>) -> Bool<'ctx> {
    let bits = ty.bits();
    let widen = |x: &BV<'ctx>| if ty.is_signed() { x.sign_ext(bits) } else { x.zero_ext(bits) };
    let wide = arith(op, ty.is_signed(), &widen(a), &widen(b));
    let truncated = wide.extract(bits - 1, 0);
    widen(&truncated)._eq(&wide).not()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn x() -> Value {
        Value::symbol("x_0", Type::I32)
    }

    fn c(v: i128) -> Value {
        Value::int(v, Type::I32)
    }

    #[test]
    fn decides_simple_constraints() {
        let solver = Z3Solver::new();
        assert_eq!(solver.check(&x().lt(c(4)), TIMEOUT), Ok(SatResult::Sat));
        assert_eq!(solver.check(&x().lt(c(4)).and(x().gt(c(4))), TIMEOUT), Ok(SatResult::Unsat));
        assert_eq!(solver.check(&Value::bool(false), TIMEOUT), Ok(SatResult::Unsat));
    }

    #[test]
    fn example_satisfies_constraint() {
        let solver = Z3Solver::new();
        let constraint = x().ge(c(4)).and(x().le(c(4)));
        let example = solver.find_example(&constraint, TIMEOUT).unwrap().unwrap();
        assert_eq!(example.get("x_0"), Some(4));
        assert_eq!(constraint.evaluate_bool(&example), Ok(true));
    }

    #[test]
    fn wrap_around_matches_concrete_evaluation() {
        // 2 * (x + 4) == 0 also holds for x = 2^31 - 4
        let solver = Z3Solver::new();
        let divisor = c(2) * (x() + c(4));
        let constraint = divisor.clone()._eq(c(0)).and(x().neq(c(-4)));
        let example = solver.find_example(&constraint, TIMEOUT).unwrap().unwrap();
        assert_eq!(example.get("x_0"), Some((1 << 31) - 4));
        assert_eq!(divisor.evaluate_int(&example), Ok(0));
    }

    #[test]
    fn unsigned_comparison_is_unsigned() {
        let solver = Z3Solver::new();
        let u = Value::symbol("u_0", Type::U8);
        let constraint = u.clone().gt(Value::int(200, Type::U8));
        let example = solver.find_example(&constraint, TIMEOUT).unwrap().unwrap();
        assert!(example.get("u_0").unwrap() > 200);
    }

    #[test]
    fn overflow_predicate_agrees_with_evaluation() {
        let solver = Z3Solver::new();
        let ovf = Value::overflows(BinOp::Mul, x(), c(3));
        let example = solver.find_example(&ovf, TIMEOUT).unwrap().unwrap();
        assert_eq!(ovf.evaluate_bool(&example), Ok(true));
        let small = x().lt(c(1000)).and(x().gt(c(-1000)));
        assert_eq!(solver.check(&small.and(ovf), TIMEOUT), Ok(SatResult::Unsat));
    }

    #[test]
    fn boolean_inputs() {
        let solver = Z3Solver::new();
        let p = Value::symbol("p_0", Type::Bool);
        let example = solver.find_example(&!p, TIMEOUT).unwrap().unwrap();
        assert_eq!(example.get("p_0"), Some(0));
    }
}
