use std::time::Duration;

use anyhow::Result;
use symbolic_c::{
    fixtures,
    report::Ordering,
    solver::{Solution, SolverError},
    Assignment, Config, ConstraintSolver, Explorer, Outcome, Reachability, Report, SatResult, Value, Verdict,
    Watchdog,
};

fn explore(def: symbolic_c::ast::FunctionDef, config: Config) -> Result<Report> {
    let function = def.build()?;
    Ok(Explorer::new(config).explore(&function)?)
}

fn sorted_debug<T: std::fmt::Debug>(items: &[T]) -> Vec<String> {
    let mut res: Vec<_> = items.iter().map(|x| format!("{:?}", x)).collect();
    res.sort();
    res
}

#[test]
fn residual_else_is_reachable_with_x_equal_4() -> Result<()> {
    let report = explore(fixtures::s_if_stmt(), Config::default())?;
    match report.probe_reachability("else") {
        Reachability::Reachable(Some(example)) => assert_eq!(example.get("x_0"), Some(4)),
        other => panic!("expected a reachable else, got {:?}", other),
    }
    assert_eq!(report.paths.len(), 3);
    assert!(report.paths.iter().all(|p| p.verdict() == Verdict::Reachable));
    Ok(())
}

#[test]
fn exhaustive_conditions_make_else_unreachable() -> Result<()> {
    let report = explore(fixtures::b_if_stmt(), Config::default())?;
    assert_eq!(report.probe_reachability("else"), Reachability::Unreachable);
    assert_eq!(report.infeasible.len(), 1);
    assert!(!report.infeasible[0].taken);
    assert_eq!(report.paths.len(), 2);
    Ok(())
}

#[test]
fn division_by_zero_is_found_with_a_witness() -> Result<()> {
    let config = Config::default();
    let report = explore(fixtures::b_algebra(), config.clone())?;
    let faults: Vec<_> = report.faults().collect();
    assert_eq!(faults.len(), 1);
    let fault = faults[0];
    assert_eq!(fault.verdict(), Verdict::Fault);
    let divisor = match &fault.outcome {
        Outcome::DivisionByZero { divisor, .. } => divisor.clone(),
        other => panic!("unexpected outcome {}", other),
    };
    let example = fault.example.as_ref().expect("an example input");
    assert_eq!(divisor.evaluate_int(example)?, 0);

    // every input making the divisor zero, wrap-around included
    let y = Value::symbol("y_0", symbolic_c::Type::I32);
    let zeros = Explorer::new(config).enumerate(&y, &fault.path_condition.as_value())?;
    assert!(zeros.complete);
    assert_eq!(zeros.values.into_iter().collect::<Vec<_>>(), vec![-4, (1 << 31) - 4]);

    // the path past the division assumes a non-zero divisor
    assert_eq!(report.returns().count(), 1);
    assert!(matches!(report.probe_reachability("division"), Reachability::Reachable(Some(_))));
    Ok(())
}

#[test]
fn stuck_loop_hits_the_bound() -> Result<()> {
    let report = explore(fixtures::b_inf_loop(), Config::default())?;
    let bounded: Vec<_> = report
        .paths
        .iter()
        .filter(|p| matches!(p.outcome, Outcome::LoopBoundExceeded { bound: 16, .. }))
        .collect();
    assert_eq!(bounded.len(), 1);
    assert_eq!(bounded[0].verdict(), Verdict::Inconclusive);
    // n <= 0 skips the loop
    assert_eq!(report.returns().count(), 1);
    assert!(!report.is_conclusive());

    let report = explore(fixtures::b_inf_loop(), Config::default().with_loop_bound(2))?;
    assert!(report
        .paths
        .iter()
        .any(|p| matches!(p.outcome, Outcome::LoopBoundExceeded { bound: 2, .. })));
    Ok(())
}

#[test]
fn sequential_runs_are_identical() -> Result<()> {
    let config = Config::default().with_examples(false);
    for (name, def) in fixtures::all() {
        let first = explore(def.clone(), config.clone())?;
        let second = explore(def, config.clone())?;
        assert_eq!(first, second, "{}", name);
        assert_eq!(first.ordering, Ordering::Exploration);
    }
    Ok(())
}

// The path that `n` takes, and the value of `i` after the loop on it.
fn final_i(report: &Report, n: i128) -> Result<i128> {
    let input = Assignment::new().with("n_0", n);
    for path in report.returns() {
        if path.path_condition.as_value().evaluate_bool(&input)? {
            let hit = path.probes.iter().find(|h| h.label == "after_loop").expect("probe on every return");
            return Ok(hit.values["i"].evaluate_int(&input)?);
        }
    }
    panic!("no path for n = {}", n)
}

#[test]
fn strict_and_inclusive_loops_differ_by_one() -> Result<()> {
    let s = explore(fixtures::s_loop(), Config::default())?;
    let b = explore(fixtures::b_loop(), Config::default())?;
    for n in [0, 1, 5, 10] {
        let (si, bi) = (final_i(&s, n)?, final_i(&b, n)?);
        assert_eq!(si, n);
        assert_eq!(bi, si + 1);
    }
    Ok(())
}

#[test]
fn loop_exit_values_are_enumerated() -> Result<()> {
    let config = Config::default().with_loop_bound(3);
    let function = fixtures::s_loop().build()?;
    let explorer = Explorer::new(config);
    let report = explorer.explore(&function)?;
    let values = explorer.values_at_probe(&report, "after_loop", "i")?;
    assert!(values.complete);
    assert_eq!(values.values.into_iter().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    Ok(())
}

#[test]
fn parallel_finds_the_same_records() -> Result<()> {
    let sequential = Config::default().with_examples(false);
    let parallel = sequential.clone().with_workers(4);
    for (name, def) in fixtures::all() {
        let s = explore(def.clone(), sequential.clone())?;
        let p = explore(def, parallel.clone())?;
        assert_eq!(p.ordering, Ordering::Completion);
        assert_eq!(sorted_debug(&s.paths), sorted_debug(&p.paths), "{}", name);
        assert_eq!(sorted_debug(&s.infeasible), sorted_debug(&p.infeasible), "{}", name);
    }
    Ok(())
}

#[test]
fn breadth_first_finds_the_same_records() -> Result<()> {
    let config = Config::default().with_examples(false);
    let bfs = config.clone().with_search(symbolic_c::SearchStrategy::BreadthFirst);
    for def in [fixtures::b(), fixtures::s_if_stmt(), fixtures::s_loop()] {
        let d = explore(def.clone(), config.clone())?;
        let b = explore(def, bfs.clone())?;
        assert_eq!(sorted_debug(&d.paths), sorted_debug(&b.paths));
    }
    Ok(())
}

#[test]
fn cancelled_watchdog_yields_only_cancelled_records() -> Result<()> {
    let watchdog = Watchdog::new();
    watchdog.cancel();
    for workers in [1, 4] {
        let function = fixtures::b().build()?;
        let explorer = Explorer::new(Config::default().with_workers(workers)).with_watchdog(watchdog.clone());
        let report = explorer.explore(&function)?;
        assert!(!report.paths.is_empty());
        assert!(report.paths.iter().all(|p| p.outcome == Outcome::Cancelled));
        assert!(report.infeasible.is_empty());
        assert_eq!(report.probe_reachability("end"), Reachability::Inconclusive);
    }
    Ok(())
}

#[test]
fn exhausted_time_budget_cancels() -> Result<()> {
    let config = Config::default().with_time_budget(Some(Duration::ZERO));
    let report = explore(fixtures::s_loop(), config)?;
    assert!(report.paths.iter().all(|p| p.outcome == Outcome::Cancelled));
    Ok(())
}

#[test]
fn contradictory_inner_branch_is_pruned() -> Result<()> {
    let report = explore(fixtures::s2_if_stmt(), Config::default())?;
    assert_eq!(report.infeasible.len(), 1);
    assert!(report.infeasible[0].taken);
    assert!(matches!(report.probe_reachability("after_inner"), Reachability::Reachable(Some(_))));
    Ok(())
}

#[test]
fn probe_records_symbolic_values() -> Result<()> {
    let report = explore(fixtures::b2_if_stmt(), Config::default())?;
    let hits: Vec<_> = report.probe_hits("y_values").collect();
    assert_eq!(hits.len(), 1);
    let (_, hit) = hits[0];
    assert_eq!(hit.values["y"].to_string(), "(y_0 + 1)");
    assert_eq!(hit.path_condition.conjuncts()[0].to_string(), "(x_0 < 5)");
    Ok(())
}

#[test]
fn nested_if_in_loop() -> Result<()> {
    let returned = |report: &Report| -> Vec<String> {
        report
            .returns()
            .map(|p| p.outcome.to_string())
            .collect()
    };
    let s = explore(fixtures::s_nested_if_loop(), Config::default())?;
    assert_eq!(returned(&s), vec!["returns 3"]);
    let b = explore(fixtures::b_nested_if_loop(), Config::default())?;
    assert_eq!(returned(&b), vec!["returns 0"]);
    Ok(())
}

#[test]
fn nested_branch_reaches_inner_probe() -> Result<()> {
    let report = explore(fixtures::b(), Config::default())?;
    match report.probe_reachability("inner") {
        Reachability::Reachable(Some(example)) => {
            let y = example.get("y_0").expect("y_0 in example");
            // 2 * y == 6 in 32 bits
            assert!(y == 3 || y == 3 - (1 << 31));
        }
        other => panic!("unexpected {:?}", other),
    }
    Ok(())
}

#[test]
fn overflow_checks_report_faults() -> Result<()> {
    let report = explore(fixtures::s_algebra(), Config::default().with_overflow_checks(true))?;
    assert!(report.faults().any(|p| matches!(p.outcome, Outcome::Overflow { .. })));
    for fault in report.faults() {
        let example = fault.example.as_ref().expect("example");
        assert!(fault.path_condition.as_value().evaluate_bool(example)?);
    }
    let unchecked = explore(fixtures::s_algebra(), Config::default())?;
    assert_eq!(unchecked.faults().count(), 0);
    Ok(())
}

#[test]
fn reports_serialize_to_json() -> Result<()> {
    let report = explore(fixtures::b_algebra(), Config::default())?;
    let json = serde_json::to_value(&report)?;
    assert_eq!(json["function"], "b_algebra");
    assert_eq!(json["paths"][0]["outcome"]["kind"], "division_by_zero");
    Ok(())
}

#[test]
fn malformed_programs_are_rejected() {
    use symbolic_c::{ast::*, Error, MalformedProgramError};

    let undeclared = FunctionDef::new("undeclared")
        .returns(symbolic_c::Type::I32)
        .body(vec![ret(var("z"))]);
    assert!(matches!(
        undeclared.build(),
        Err(MalformedProgramError::UndeclaredVariable { .. })
    ));

    let err: Error = undeclared.build().unwrap_err().into();
    assert!(err.to_string().contains("z"));
}

/// Answers every query with `Unknown`, as on a timeout.
struct Undecided;

impl ConstraintSolver for Undecided {
    fn solve(&self, _: &Value, _: Duration, _: bool) -> std::result::Result<Solution, SolverError> {
        Ok(Solution {
            result: SatResult::Unknown,
            model: None,
        })
    }
}

/// Fails on every query.
struct Broken;

impl ConstraintSolver for Broken {
    fn solve(&self, _: &Value, _: Duration, _: bool) -> std::result::Result<Solution, SolverError> {
        Err(SolverError::MissingModel)
    }
}

fn explore_with<S: ConstraintSolver>(solver: S) -> Result<Report> {
    let function = fixtures::s_if_stmt().build()?;
    Ok(Explorer::with_solver(solver, Config::default()).explore(&function)?)
}

fn assert_all_uncertain(report: &Report) {
    // every side of every branch is kept
    assert_eq!(report.paths.len(), 3);
    assert!(report.infeasible.is_empty());
    for path in &report.paths {
        assert!(path.solver_uncertain);
        assert_eq!(path.verdict(), Verdict::Inconclusive);
        assert!(path.example.is_none());
    }
    assert_eq!(report.probe_reachability("else"), Reachability::Inconclusive);
    assert!(!report.is_conclusive());
}

#[test]
fn unknown_answers_keep_paths_as_inconclusive() -> Result<()> {
    assert_all_uncertain(&explore_with(Undecided)?);
    Ok(())
}

#[test]
fn solver_errors_keep_paths_as_inconclusive() -> Result<()> {
    assert_all_uncertain(&explore_with(Broken)?);
    Ok(())
}

#[test]
fn values_are_listed_for_every_recorded_variable() -> Result<()> {
    let function = fixtures::s_loop().build()?;
    let explorer = Explorer::new(Config::default().with_loop_bound(3));
    let report = explorer.explore(&function)?;
    let values = explorer.probe_values(&report)?;

    let after_loop = &values["after_loop"];
    assert_eq!(after_loop.keys().map(String::as_str).collect::<Vec<_>>(), vec!["i", "j", "n"]);
    assert_eq!(after_loop["i"].values.iter().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    assert!(after_loop["i"].complete);
    assert_eq!(after_loop["j"].values.iter().copied().collect::<Vec<_>>(), vec![1, 2, 4, 8]);
    assert!(after_loop["j"].complete);
    // n is only bounded from above on the path skipping the loop
    assert!(!after_loop["n"].complete);
    assert!(after_loop["n"].values.iter().all(|n| *n <= 3));
    assert!([1, 2, 3].iter().all(|n| after_loop["n"].values.contains(n)));
    Ok(())
}
