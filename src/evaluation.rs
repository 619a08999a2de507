//! Exploration of whole functions.

use std::collections::{BTreeMap, BTreeSet};

use symbolic_evaluation::{
    evaluation::{eval, par_eval_with_workers},
    frontier::{BreadthFirst, DepthFirst},
};
use tracing::{debug, info, warn};

use crate::{
    config::{Config, SearchStrategy},
    error::Result,
    program::Function,
    report::{InfeasibleBranch, Ordering, PathResult, ProbeValues, Report, ValueSet},
    solver::{ConstraintSolver, SatResult, Z3Solver},
    state::{Environment, EvalState, Outcome, TerminationStatus},
    ty::Type,
    value::{Assignment, Value},
    watchdog::Watchdog,
};

/// What a final state turns into.
#[derive(Clone)]
enum Finished {
    Path(PathResult),
    Pruned(InfeasibleBranch),
}

/// Symbolic explorer: runs every feasible path of a function and answers
/// questions about the results.
pub struct Explorer<S = Z3Solver> {
    solver: S,
    config: Config,
    watchdog: Watchdog,
}

impl Explorer<Z3Solver> {
    pub fn new(config: Config) -> Self {
        Self::with_solver(Z3Solver::new(), config)
    }
}

impl Default for Explorer<Z3Solver> {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl<S: ConstraintSolver> Explorer<S> {
    pub fn with_solver(solver: S, config: Config) -> Self {
        Self {
            solver,
            config,
            watchdog: Watchdog::new(),
        }
    }

    /// Use `watchdog` to cancel explorations from outside.
    pub fn with_watchdog(mut self, watchdog: Watchdog) -> Self {
        self.watchdog = watchdog;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    // The shared watchdog, with a deadline when a time budget is configured.
    fn budget_watchdog(&self) -> Watchdog {
        match self.config.time_budget {
            Some(budget) => self.watchdog.clone().with_budget(budget),
            None => self.watchdog.clone(),
        }
    }

    /// Explore every path of `function`.
    pub fn explore(&self, function: &Function) -> Result<Report> {
        let watchdog = self.budget_watchdog();
        let env = Environment {
            function,
            solver: &self.solver,
            config: &self.config,
            watchdog: &watchdog,
        };
        info!(
            function = function.name(),
            workers = self.config.workers,
            loop_bound = self.config.loop_bound,
            "exploring"
        );

        let init = EvalState::new(env);
        let (finished, ordering) = if self.config.is_parallel() {
            let results = boxcar::Vec::new();
            par_eval_with_workers(self.config.workers, init, &|s: EvalState| {
                results.push(self.finish(s, &watchdog));
            })?;
            let finished: Vec<Finished> = results.iter().map(|(_, f)| f.clone()).collect();
            (finished, Ordering::Completion)
        } else {
            let mut finished = Vec::new();
            let report = |s: EvalState| finished.push(self.finish(s, &watchdog));
            match self.config.search {
                SearchStrategy::DepthFirst => eval::<_, DepthFirst<_>, _>(init, report),
                SearchStrategy::BreadthFirst => eval::<_, BreadthFirst<_>, _>(init, report),
            }
            (finished, Ordering::Exploration)
        };

        let mut report = Report {
            function: function.name().to_string(),
            ordering,
            paths: Vec::new(),
            infeasible: Vec::new(),
        };
        for f in finished {
            match f {
                Finished::Path(p) => report.paths.push(p),
                Finished::Pruned(b) => report.infeasible.push(b),
            }
        }
        let summary = report.summary();
        info!(
            function = function.name(),
            reachable = summary.reachable,
            faults = summary.faults,
            inconclusive = summary.inconclusive,
            unreachable_branches = summary.unreachable_branches,
            "explored"
        );
        Ok(report)
    }

    // Turn a final state into its record.
    fn finish(&self, s: EvalState, watchdog: &Watchdog) -> Finished {
        let outcome = match s.ts {
            TerminationStatus::Finished(outcome) => outcome,
            TerminationStatus::Unsat(branch) => return Finished::Pruned(branch),
            TerminationStatus::None => {
                // the drivers only hand over final states
                warn!("unfinished state reported");
                Outcome::Cancelled
            }
        };
        let example = match outcome {
            Outcome::Cancelled => None,
            _ if !self.config.generate_examples || watchdog.should_stop() => None,
            _ => {
                let timeout = watchdog.clamp(self.config.solver_timeout);
                match self.solver.find_example(&s.pc.as_value(), timeout) {
                    Ok(example) => example,
                    Err(err) => {
                        warn!(%err, "no example for path");
                        None
                    }
                }
            }
        };
        Finished::Path(PathResult {
            decisions: s.decisions,
            outcome,
            path_condition: s.pc,
            example,
            solver_uncertain: s.uncertain,
            probes: s.probes,
            visited: s.visited,
        })
    }

    /// An input satisfying `condition`.
    pub fn example(&self, condition: &Value) -> Result<Option<Assignment>> {
        let watchdog = self.budget_watchdog();
        if watchdog.should_stop() {
            return Ok(None);
        }
        let timeout = watchdog.clamp(self.config.solver_timeout);
        Ok(self.solver.find_example(condition, timeout)?)
    }

    /// The values `expr` can take under `condition`, found by asking the
    /// solver for a new value until there is none or the cap is reached.
    pub fn enumerate(&self, expr: &Value, condition: &Value) -> Result<ValueSet> {
        self.enumerate_until(expr, condition, &self.budget_watchdog())
    }

    fn enumerate_until(&self, expr: &Value, condition: &Value, watchdog: &Watchdog) -> Result<ValueSet> {
        let mut set = ValueSet::default();
        let mut query = condition.clone();
        loop {
            if watchdog.should_stop() {
                return Ok(set);
            }
            let timeout = watchdog.clamp(self.config.solver_timeout);
            let solution = self.solver.solve(&query, timeout, true)?;
            let model = match (solution.result, solution.model) {
                (SatResult::Sat, Some(model)) => model,
                (SatResult::Unsat, _) => {
                    set.complete = true;
                    return Ok(set);
                }
                _ => return Ok(set),
            };
            if set.values.len() >= self.config.max_enumerated_values {
                // one more value exists beyond the cap
                return Ok(set);
            }
            let v = expr.evaluate_int(&model)?;
            debug!(%expr, value = v, "enumerated");
            set.values.insert(v);
            let other = match expr.ty() {
                Type::Bool if v != 0 => !expr.clone(),
                Type::Bool => expr.clone(),
                ty => expr.clone().neq(Value::int(v, ty)),
            };
            query = query.and(other);
        }
    }

    /// The values variable `var` has at probe `label`, over every path
    /// crossing it.
    pub fn values_at_probe(&self, report: &Report, label: &str, var: &str) -> Result<ValueSet> {
        self.values_at_probe_until(report, label, var, &self.budget_watchdog())
    }

    fn values_at_probe_until(&self, report: &Report, label: &str, var: &str, watchdog: &Watchdog) -> Result<ValueSet> {
        let mut values = BTreeSet::new();
        let mut complete = true;
        for (_, hit) in report.probe_hits(label) {
            if let Some(v) = hit.values.get(var) {
                let set = self.enumerate_until(v, &hit.path_condition.as_value(), watchdog)?;
                complete &= set.complete;
                values.extend(set.values);
            }
        }
        if values.len() > self.config.max_enumerated_values {
            complete = false;
        }
        Ok(ValueSet { values, complete })
    }

    /// Value sets of every variable recorded at every probe of `report`,
    /// by probe label, then variable.
    pub fn probe_values(&self, report: &Report) -> Result<ProbeValues> {
        let watchdog = self.budget_watchdog();
        let mut vars: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for hit in report.paths.iter().flat_map(|p| &p.probes) {
            vars.entry(hit.label.as_str())
                .or_default()
                .extend(hit.values.keys().map(String::as_str));
        }
        let mut res = ProbeValues::new();
        for (label, names) in vars {
            let mut sets = BTreeMap::new();
            for var in names {
                sets.insert(var.to_string(), self.values_at_probe_until(report, label, var, &watchdog)?);
            }
            res.insert(label.to_string(), sets);
        }
        Ok(res)
    }
}
