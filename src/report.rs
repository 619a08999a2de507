//! Exploration results.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use itertools::Itertools;
use serde::Serialize;

use crate::{
    bytecode::BlockId,
    constraint::PathCondition,
    state::{Decision, Outcome, ProbeHit},
    value::Assignment,
};

/// The record of one finished path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PathResult {
    pub decisions: Vec<Decision>,
    pub outcome: Outcome,
    pub path_condition: PathCondition,
    /// An input driving execution down this path.
    pub example: Option<Assignment>,
    pub solver_uncertain: bool,
    pub probes: Vec<ProbeHit>,
    pub visited: BTreeSet<BlockId>,
}

/// How much a record proves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The path runs to a return on some input.
    Reachable,
    /// The path runs into a fault on some input.
    Fault,
    /// Bound exceeded, cancelled, or an unknown solver answer on the way.
    Inconclusive,
}

impl PathResult {
    pub fn verdict(&self) -> Verdict {
        match &self.outcome {
            _ if self.solver_uncertain => Verdict::Inconclusive,
            Outcome::LoopBoundExceeded { .. } | Outcome::Cancelled => Verdict::Inconclusive,
            o if o.is_fault() => Verdict::Fault,
            _ => Verdict::Reachable,
        }
    }

    /// Is the path condition proven satisfiable?
    pub fn is_certain(&self) -> bool {
        !self.solver_uncertain
    }
}

/// A branch side that no input can take.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct InfeasibleBranch {
    /// The block whose branch was pruned.
    pub block: BlockId,
    pub taken: bool,
    /// Decisions of the path up to the branch.
    pub decisions: Vec<Decision>,
}

impl fmt::Display for InfeasibleBranch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "bb{}:{} after [{}]",
            self.block,
            if self.taken { "then" } else { "else" },
            self.decisions.iter().format(", ")
        )
    }
}

/// Answer to "can execution get here?".
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "example", rename_all = "snake_case")]
pub enum Reachability {
    /// Some input gets here; an example if one was generated.
    Reachable(Option<Assignment>),
    /// No input gets here.
    Unreachable,
    Inconclusive,
}

/// Order of [`Report::paths`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Ordering {
    /// The deterministic order of the sequential driver.
    Exploration,
    /// The order in which parallel workers finished paths.
    Completion,
}

/// The values an expression can take. `complete` is set when the solver
/// proved that no other value exists.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ValueSet {
    pub values: BTreeSet<i128>,
    pub complete: bool,
}

impl fmt::Display for ValueSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{{}", self.values.iter().format(", "))?;
        if !self.complete {
            write!(f, ", ...")?;
        }
        write!(f, "}}")
    }
}

/// Value sets by probe label, then by variable.
pub type ProbeValues = BTreeMap<String, BTreeMap<String, ValueSet>>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub reachable: usize,
    pub faults: usize,
    pub inconclusive: usize,
    pub unreachable_branches: usize,
}

/// Everything learned about one function.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Report {
    pub function: String,
    pub ordering: Ordering,
    pub paths: Vec<PathResult>,
    pub infeasible: Vec<InfeasibleBranch>,
}

impl Report {
    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            unreachable_branches: self.infeasible.len(),
            ..Summary::default()
        };
        for path in &self.paths {
            match path.verdict() {
                Verdict::Reachable => summary.reachable += 1,
                Verdict::Fault => summary.faults += 1,
                Verdict::Inconclusive => summary.inconclusive += 1,
            }
        }
        summary
    }

    /// No path was cut short and every query had a definite answer, so
    /// anything never reached is unreachable.
    pub fn is_conclusive(&self) -> bool {
        self.paths.iter().all(|p| {
            p.is_certain() && !matches!(p.outcome, Outcome::LoopBoundExceeded { .. } | Outcome::Cancelled)
        })
    }

    pub fn faults(&self) -> impl Iterator<Item = &PathResult> {
        self.paths.iter().filter(|p| p.outcome.is_fault())
    }

    pub fn returns(&self) -> impl Iterator<Item = &PathResult> {
        self.paths
            .iter()
            .filter(|p| matches!(p.outcome, Outcome::Returned { .. }))
    }

    /// Every crossing of the probe `label`, with the path it happened on.
    pub fn probe_hits<'a>(&'a self, label: &'a str) -> impl Iterator<Item = (&'a PathResult, &'a ProbeHit)> + 'a {
        self.paths
            .iter()
            .flat_map(move |p| p.probes.iter().filter(move |h| h.label == label).map(move |h| (p, h)))
    }

    pub fn block_reachability(&self, block: BlockId) -> Reachability {
        self.reachability(|p| p.visited.contains(&block))
    }

    pub fn probe_reachability(&self, label: &str) -> Reachability {
        self.reachability(|p| p.probes.iter().any(|h| h.label == label))
    }

    fn reachability(&self, reaches: impl Fn(&PathResult) -> bool) -> Reachability {
        let mut hits = self.paths.iter().filter(|p| reaches(*p)).peekable();
        if hits.peek().is_none() {
            return if self.is_conclusive() {
                Reachability::Unreachable
            } else {
                Reachability::Inconclusive
            };
        }
        let certain: Vec<_> = hits.filter(|p| p.is_certain()).collect();
        if certain.is_empty() {
            return Reachability::Inconclusive;
        }
        Reachability::Reachable(certain.iter().find_map(|p| p.example.clone()))
    }
}

impl fmt::Display for PathResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}] {}", self.decisions.iter().format(", "), self.outcome)?;
        if self.solver_uncertain {
            write!(f, " (solver uncertain)")?;
        }
        writeln!(f)?;
        writeln!(f, "    path condition: {}", self.path_condition)?;
        if let Some(example) = &self.example {
            writeln!(f, "    example: {}", example)?;
        }
        for hit in &self.probes {
            writeln!(
                f,
                "    probe {:?} at bb{}: {}",
                hit.label,
                hit.block,
                hit.values.iter().map(|(x, v)| format!("{} = {}", x, v)).format(", ")
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let summary = self.summary();
        writeln!(
            f,
            "{}: {} reachable, {} faults, {} inconclusive, {} unreachable branches",
            self.function, summary.reachable, summary.faults, summary.inconclusive, summary.unreachable_branches
        )?;
        for (i, path) in self.paths.iter().enumerate() {
            let verdict = match path.verdict() {
                Verdict::Reachable => "reachable",
                Verdict::Fault => "fault",
                Verdict::Inconclusive => "inconclusive",
            };
            write!(f, "  #{} {}: {}", i, verdict, path)?;
        }
        for branch in &self.infeasible {
            writeln!(f, "  unreachable: {}", branch)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ty::Type, value::Value};

    fn path(outcome: Outcome, uncertain: bool, visited: &[BlockId]) -> PathResult {
        PathResult {
            decisions: vec![],
            outcome,
            path_condition: PathCondition::new(),
            example: Some(Assignment::new().with("x_0", 4)),
            solver_uncertain: uncertain,
            probes: vec![],
            visited: visited.iter().copied().collect(),
        }
    }

    fn returned() -> Outcome {
        Outcome::Returned {
            value: Some(Value::int(0, Type::I32)),
        }
    }

    fn report(paths: Vec<PathResult>) -> Report {
        Report {
            function: "f".into(),
            ordering: Ordering::Exploration,
            paths,
            infeasible: vec![],
        }
    }

    #[test]
    fn verdicts() {
        assert_eq!(path(returned(), false, &[]).verdict(), Verdict::Reachable);
        assert_eq!(path(returned(), true, &[]).verdict(), Verdict::Inconclusive);
        assert_eq!(
            path(Outcome::LoopBoundExceeded { header: 1, bound: 16 }, false, &[]).verdict(),
            Verdict::Inconclusive
        );
    }

    #[test]
    fn unvisited_block_is_unreachable_only_if_conclusive() {
        let r = report(vec![path(returned(), false, &[0, 1])]);
        assert_eq!(
            r.block_reachability(1),
            Reachability::Reachable(Some(Assignment::new().with("x_0", 4)))
        );
        assert_eq!(r.block_reachability(2), Reachability::Unreachable);

        let r = report(vec![
            path(returned(), false, &[0, 1]),
            path(Outcome::Cancelled, false, &[0]),
        ]);
        assert_eq!(r.block_reachability(2), Reachability::Inconclusive);
        assert!(matches!(r.block_reachability(0), Reachability::Reachable(_)));
    }

    #[test]
    fn uncertain_paths_do_not_prove_reachability() {
        let r = report(vec![path(returned(), true, &[0, 1])]);
        assert_eq!(r.block_reachability(1), Reachability::Inconclusive);
    }
}
