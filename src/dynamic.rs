//! Operation semantics.
//!
//! [`step`] runs a state from its current position to the next point where
//! the path forks or ends: a branch, a jump, a return, or an operation that
//! may fault. Forks come out in exploration order, then before else and
//! fault records before the path that continues past the fault.

use tracing::{debug, trace, warn};

use crate::{
    bytecode::{BlockId, Operation, Terminator},
    report::InfeasibleBranch,
    solver::SatResult,
    state::{Decision, EvalState, Outcome, ProbeHit, TerminationStatus},
    value::{BinOp, LogicOp, Value},
};

/// Result of a feasibility query on a path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Feasibility {
    Sat,
    Unsat,
    Unknown,
    /// The watchdog tripped before the query was made.
    Cancelled,
}

impl Feasibility {
    fn is_feasible(self) -> bool {
        matches!(self, Feasibility::Sat | Feasibility::Unknown)
    }
}

// Is `pc && constraint` satisfiable?
fn query(s: &EvalState, constraint: &Value) -> Feasibility {
    let env = s.env;
    if env.watchdog.should_stop() {
        return Feasibility::Cancelled;
    }
    let timeout = env.watchdog.clamp(env.config.solver_timeout);
    match env.solver.check(&s.pc.and(constraint), timeout) {
        Ok(SatResult::Sat) => Feasibility::Sat,
        Ok(SatResult::Unsat) => Feasibility::Unsat,
        Ok(SatResult::Unknown) => Feasibility::Unknown,
        Err(err) => {
            // a failing backend cannot prove anything, keep the path
            warn!(%err, location = %s.location(), "solver query failed");
            Feasibility::Unknown
        }
    }
}

fn cancel(s: EvalState) -> EvalState {
    debug!(location = %s.location(), "path cancelled");
    s.finish(Outcome::Cancelled)
}

// Split `s` on a fault condition. Fault records go to `out`; the state that
// continues under the assumption that the fault does not happen is returned.
fn assume_absent<'a>(
    mut s: EvalState<'a>,
    fault: Value,
    outcome: Outcome,
    decision: Decision,
    out: &mut Vec<EvalState<'a>>,
) -> Option<EvalState<'a>> {
    match fault.as_bool() {
        Some(false) => return Some(s),
        Some(true) => {
            debug!(location = %s.location(), %outcome, "fault on every input");
            out.push(s.finish(outcome));
            return None;
        }
        None => {}
    }
    match query(&s, &fault) {
        Feasibility::Cancelled => {
            out.push(cancel(s));
            return None;
        }
        r if r.is_feasible() => {
            debug!(location = %s.location(), %outcome, "fault found");
            let mut faulty = s.clone();
            faulty.pc &= fault.clone();
            faulty.uncertain |= r == Feasibility::Unknown;
            out.push(faulty.finish(outcome));
        }
        _ => {}
    }
    let absent = !fault;
    match query(&s, &absent) {
        Feasibility::Cancelled => {
            out.push(cancel(s));
            None
        }
        r if r.is_feasible() => {
            s.pc &= absent;
            s.uncertain |= r == Feasibility::Unknown;
            s.decisions.push(decision);
            Some(s)
        }
        _ => {
            trace!(location = %s.location(), "fault is unavoidable");
            None
        }
    }
}

// Evaluate a binary arithmetic operation, checking its divisor and, when
// enabled, overflow.
fn binary<'a>(
    s: EvalState<'a>,
    dst: &str,
    op: BinOp,
    lhs: Value,
    rhs: Value,
    out: &mut Vec<EvalState<'a>>,
) -> Option<EvalState<'a>> {
    let at = s.location();
    let ty = lhs.ty();
    let mut s = s;
    if op.has_divisor() {
        let zero = rhs.clone()._eq(Value::int(0, ty));
        let outcome = Outcome::DivisionByZero {
            at,
            divisor: rhs.clone(),
        };
        s = assume_absent(s, zero, outcome, Decision::NonZeroDivisor { at }, out)?;
    }
    if s.env.config.check_overflow && op.can_overflow() {
        let overflow = Value::overflows(op, lhs.clone(), rhs.clone());
        let outcome = Outcome::Overflow {
            at,
            op,
            expr: Value::binary(op, lhs.clone(), rhs.clone()),
        };
        s = assume_absent(s, overflow, outcome, Decision::NoOverflow { at }, out)?;
    }
    s.locals.set(dst, Value::binary(op, lhs, rhs));
    Some(s)
}

// Move to `target`, counting back edges.
fn goto(mut s: EvalState, target: BlockId) -> EvalState {
    let function = s.env.function;
    if function.is_back_edge(s.block, target) {
        let bound = s.env.config.loop_bound;
        let count = s.back_edges.entry(target).or_insert(0);
        *count += 1;
        if *count > bound {
            debug!(header = target, bound, "loop bound exceeded");
            return s.finish(Outcome::LoopBoundExceeded { header: target, bound });
        }
    }
    s.block = target;
    s.op = 0;
    s
}

// Fork on a branch condition.
fn branch<'a>(s: EvalState<'a>, cond: Value, then_block: BlockId, else_block: BlockId) -> Vec<EvalState<'a>> {
    let block = s.block;
    let take = |mut s: EvalState<'a>, taken: bool| {
        s.decisions.push(Decision::Branch { block, taken });
        goto(s, if taken { then_block } else { else_block })
    };
    if let Some(taken) = cond.as_bool() {
        return vec![take(s, taken)];
    }

    let mut res = Vec::with_capacity(2);
    for (taken, constraint) in [(true, cond.clone()), (false, !cond)] {
        match query(&s, &constraint) {
            Feasibility::Cancelled => {
                res.push(cancel(s));
                return res;
            }
            Feasibility::Unsat => {
                debug!(block, taken, "pruned infeasible branch");
                let mut pruned = s.clone();
                pruned.ts = TerminationStatus::Unsat(InfeasibleBranch {
                    block,
                    taken,
                    decisions: s.decisions.clone(),
                });
                res.push(pruned);
            }
            r => {
                trace!(block, taken, "fork");
                let mut next = s.clone();
                next.pc &= constraint;
                next.uncertain |= r == Feasibility::Unknown;
                res.push(take(next, taken));
            }
        }
    }
    res
}

/// Advance `s` to its next fork or to its end.
pub fn step(mut s: EvalState) -> Vec<EvalState> {
    if s.op == 0 {
        s.visited.insert(s.block);
    }
    if s.env.watchdog.should_stop() {
        return vec![cancel(s)];
    }
    let function = s.env.function;
    let block = function.block(s.block);
    let mut out = Vec::new();

    while s.op < block.ops.len() {
        match &block.ops[s.op] {
            Operation::Assign { dst, src } => {
                let v = s.locals.operand(src);
                s.locals.set(dst, v);
            }
            Operation::Binary { dst, op, lhs, rhs } => {
                let (a, b) = (s.locals.operand(lhs), s.locals.operand(rhs));
                match binary(s, dst, *op, a, b, &mut out) {
                    Some(next) => s = next,
                    None => return out,
                }
                if !out.is_empty() {
                    // the path forked, resume it after the fault records
                    s.op += 1;
                    out.push(s);
                    return out;
                }
            }
            Operation::Compare { dst, op, lhs, rhs } => {
                let (a, b) = (s.locals.operand(lhs), s.locals.operand(rhs));
                s.locals.set(dst, Value::compare(*op, a, b));
            }
            Operation::Logic { dst, op, lhs, rhs } => {
                // both operands are already evaluated, no short circuit
                let (a, b) = (s.locals.operand(lhs), s.locals.operand(rhs));
                let v = match op {
                    LogicOp::And => a.and(b),
                    LogicOp::Or => a.or(b),
                };
                s.locals.set(dst, v);
            }
            Operation::Not { dst, src } => {
                let v = !s.locals.operand(src);
                s.locals.set(dst, v);
            }
            Operation::Probe { label } => {
                trace!(label = %label, block = s.block, "probe");
                let hit = ProbeHit {
                    label: label.clone(),
                    block: s.block,
                    values: s.locals.snapshot(),
                    path_condition: s.pc.clone(),
                };
                s.probes.push(hit);
            }
        }
        s.op += 1;
    }

    match &block.terminator {
        Terminator::Jump(target) => vec![goto(s, *target)],
        Terminator::Branch {
            cond,
            then_block,
            else_block,
        } => {
            let cond = s.locals.operand(cond);
            branch(s, cond, *then_block, *else_block)
        }
        Terminator::Return(value) => {
            let value = value.as_ref().map(|v| s.locals.operand(v));
            vec![s.finish(Outcome::Returned { value })]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::*,
        config::Config,
        program::Function,
        solver::Z3Solver,
        state::Environment,
        ty::Type,
        watchdog::Watchdog,
    };
    use symbolic_evaluation::traits::Transition;

    fn run(function: &Function, config: &Config, watchdog: &Watchdog) -> Vec<TerminationStatus> {
        let env = Environment {
            function,
            solver: &Z3Solver,
            config,
            watchdog,
        };
        let mut pending = vec![EvalState::new(env)];
        let mut finished = Vec::new();
        while let Some(s) = pending.pop() {
            for next in s.suc().into_iter().rev() {
                if next.is_final() {
                    finished.push(next.ts);
                } else {
                    pending.push(next);
                }
            }
        }
        finished
    }

    #[test]
    fn division_forks_into_fault_and_continuation() {
        let f = FunctionDef::new("div")
            .param("x", Type::I32)
            .param("y", Type::I32)
            .returns(Type::I32)
            .body(vec![ret(var("x") / var("y"))])
            .build()
            .unwrap();
        let statuses = run(&f, &Config::default(), &Watchdog::new());
        assert_eq!(statuses.len(), 2);
        assert!(matches!(
            statuses[0],
            TerminationStatus::Finished(Outcome::DivisionByZero { .. })
        ));
        assert!(matches!(statuses[1], TerminationStatus::Finished(Outcome::Returned { .. })));

        let rem = FunctionDef::new("rem")
            .param("x", Type::I32)
            .param("y", Type::I32)
            .returns(Type::I32)
            .body(vec![ret(var("x") % var("y"))])
            .build()
            .unwrap();
        let statuses = run(&rem, &Config::default(), &Watchdog::new());
        assert_eq!(statuses.len(), 2);
        assert!(matches!(
            statuses[0],
            TerminationStatus::Finished(Outcome::DivisionByZero { .. })
        ));
        assert!(matches!(statuses[1], TerminationStatus::Finished(Outcome::Returned { .. })));

        // a zero divisor leaves nothing to continue with
        let by_zero = FunctionDef::new("by_zero")
            .param("x", Type::I32)
            .returns(Type::I32)
            .body(vec![ret(var("x") / lit(0))])
            .build()
            .unwrap();
        let statuses = run(&by_zero, &Config::default(), &Watchdog::new());
        assert_eq!(statuses.len(), 1);
        match &statuses[0] {
            TerminationStatus::Finished(Outcome::DivisionByZero { divisor, .. }) => {
                assert_eq!(divisor.as_int(), Some(0))
            }
            other => panic!("unexpected status {}", other),
        }
    }

    #[test]
    fn constant_conditions_do_not_fork() {
        let f = FunctionDef::new("const")
            .returns(Type::I32)
            .body(vec![
                declare("a", Type::I32, lit(3)),
                if_else(var("a").lt(lit(4)), vec![ret(lit(1))], vec![ret(lit(2))]),
            ])
            .build()
            .unwrap();
        let statuses = run(&f, &Config::default(), &Watchdog::new());
        assert_eq!(
            statuses,
            vec![TerminationStatus::Finished(Outcome::Returned {
                value: Some(Value::int(1, Type::I32))
            })]
        );
    }

    #[test]
    fn overflow_is_checked_on_request() {
        let f = FunctionDef::new("inc")
            .param("x", Type::I8)
            .returns(Type::I8)
            .body(vec![ret(var("x") + lit(1))])
            .build()
            .unwrap();
        let unchecked = run(&f, &Config::default(), &Watchdog::new());
        assert_eq!(unchecked.len(), 1);
        let checked = run(&f, &Config::default().with_overflow_checks(true), &Watchdog::new());
        assert_eq!(checked.len(), 2);
        assert!(matches!(checked[0], TerminationStatus::Finished(Outcome::Overflow { .. })));
    }

    #[test]
    fn cancelled_watchdog_stops_at_entry() {
        let f = FunctionDef::new("id")
            .param("x", Type::I32)
            .returns(Type::I32)
            .body(vec![ret(var("x"))])
            .build()
            .unwrap();
        let watchdog = Watchdog::new();
        watchdog.cancel();
        assert_eq!(
            run(&f, &Config::default(), &watchdog),
            vec![TerminationStatus::Finished(Outcome::Cancelled)]
        );
    }
}
