use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::Parser;
use itertools::Itertools;
use serde::Serialize;
use symbolic_c::{fixtures, Config, Explorer, ProbeValues, Report, SearchStrategy};
use tracing_subscriber::EnvFilter;

/// Symbolic execution of the built-in C fixtures
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Fixtures to explore, all of them if none is given
    fixtures: Vec<String>,
    /// Back-edge traversals allowed per loop header on one path
    #[clap(long, default_value_t = symbolic_c::config::DEFAULT_LOOP_BOUND)]
    loop_bound: usize,
    /// Timeout of a single solver query
    #[clap(long, default_value_t = 5000)]
    solver_timeout_ms: u64,
    /// Time budget for each function
    #[clap(long)]
    time_budget_ms: Option<u64>,
    /// Worker threads, more than one explores paths in parallel
    #[clap(short, long, default_value_t = 1)]
    workers: usize,
    /// Explore breadth-first instead of depth-first
    #[clap(long)]
    bfs: bool,
    /// Values listed per variable at each probe before giving up
    #[clap(long, default_value_t = symbolic_c::config::DEFAULT_MAX_ENUMERATED_VALUES)]
    max_enumerated_values: usize,
    /// Report arithmetic overflow as a fault
    #[clap(long)]
    check_overflow: bool,
    /// Do not compute example inputs
    #[clap(long)]
    no_examples: bool,
    /// Print reports as JSON
    #[clap(long)]
    json: bool,
    /// Log debug output
    #[clap(short, long)]
    verbose: bool,
    /// List the fixtures and exit
    #[clap(long)]
    list: bool,
}

impl Args {
    fn config(&self) -> Config {
        Config::new()
            .with_loop_bound(self.loop_bound)
            .with_solver_timeout(Duration::from_millis(self.solver_timeout_ms))
            .with_time_budget(self.time_budget_ms.map(Duration::from_millis))
            .with_workers(self.workers)
            .with_search(if self.bfs {
                SearchStrategy::BreadthFirst
            } else {
                SearchStrategy::DepthFirst
            })
            .with_overflow_checks(self.check_overflow)
            .with_examples(!self.no_examples)
            .with_max_enumerated_values(self.max_enumerated_values)
    }
}

/// A report with the value sets at its probes.
#[derive(Serialize)]
struct Explored {
    #[serde(flatten)]
    report: Report,
    values: ProbeValues,
}

fn print_explored(explored: &Explored) {
    println!("{}", explored.report);
    for (label, vars) in &explored.values {
        println!(
            "  values at {:?}: {}",
            label,
            vars.iter().map(|(var, set)| format!("{} = {}", var, set)).format(", ")
        );
    }
}

/// Print `data` as JSON (if `--json`) or call `display_fn` for human-readable output.
fn print_output<T: Serialize>(data: &T, json: bool, display_fn: impl FnOnce(&T)) -> anyhow::Result<()> {
    if json {
        let json = serde_json::to_string_pretty(data)?;
        println!("{json}");
    } else {
        display_fn(data);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    if args.list {
        for (name, _) in fixtures::all() {
            println!("{}", name);
        }
        return Ok(());
    }

    let selected = if args.fixtures.is_empty() {
        fixtures::all()
    } else {
        args.fixtures
            .iter()
            .map(|name| {
                fixtures::by_name(name)
                    .map(|def| (name.as_str(), def))
                    .ok_or_else(|| anyhow!("Unknown fixture {}, see --list", name))
            })
            .collect::<anyhow::Result<Vec<_>>>()?
    };

    let explorer = Explorer::new(args.config());
    let mut explored: Vec<Explored> = Vec::new();
    for (name, def) in selected {
        let function = def.build().with_context(|| format!("Building {}", name))?;
        let report = explorer
            .explore(&function)
            .with_context(|| format!("Exploring {}", name))?;
        let values = explorer
            .probe_values(&report)
            .with_context(|| format!("Enumerating probe values of {}", name))?;
        explored.push(Explored { report, values });
    }
    print_output(&explored, args.json, |explored| {
        for e in explored {
            print_explored(e);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_reach_the_config() {
        let args = Args::parse_from(["symbolic-c", "--max-enumerated-values", "3", "--workers", "4", "b"]);
        let config = args.config();
        assert_eq!(config.max_enumerated_values, 3);
        assert_eq!(config.workers, 4);
        assert_eq!(args.fixtures, vec!["b"]);

        let config = Args::parse_from(["symbolic-c"]).config();
        assert_eq!(config, Config::default());
    }
}
