//! Exploration settings.

use std::time::Duration;

use serde::Serialize;

/// Default number of back-edge traversals into one loop header per path.
pub const DEFAULT_LOOP_BOUND: usize = 16;

/// Default timeout of a single solver query.
pub const DEFAULT_SOLVER_TIMEOUT: Duration = Duration::from_secs(5);

/// Default cap on the number of values a value-set query enumerates.
pub const DEFAULT_MAX_ENUMERATED_VALUES: usize = 16;

/// Order in which the sequential driver picks pending states.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum SearchStrategy {
    /// Then-branch before else-branch, deepest state first.
    #[default]
    DepthFirst,
    BreadthFirst,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Config {
    pub loop_bound: usize,
    pub solver_timeout: Duration,
    /// Budget for the whole exploration of one function.
    pub time_budget: Option<Duration>,
    pub search: SearchStrategy,
    /// More than one worker selects the parallel driver.
    pub workers: usize,
    pub check_overflow: bool,
    /// Attach an example input to every record.
    pub generate_examples: bool,
    pub max_enumerated_values: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            loop_bound: DEFAULT_LOOP_BOUND,
            solver_timeout: DEFAULT_SOLVER_TIMEOUT,
            time_budget: None,
            search: SearchStrategy::DepthFirst,
            workers: 1,
            check_overflow: false,
            generate_examples: true,
            max_enumerated_values: DEFAULT_MAX_ENUMERATED_VALUES,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_loop_bound(mut self, loop_bound: usize) -> Self {
        self.loop_bound = loop_bound;
        self
    }

    #[must_use]
    pub fn with_solver_timeout(mut self, timeout: Duration) -> Self {
        self.solver_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_time_budget(mut self, budget: Option<Duration>) -> Self {
        self.time_budget = budget;
        self
    }

    #[must_use]
    pub fn with_search(mut self, search: SearchStrategy) -> Self {
        self.search = search;
        self
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    #[must_use]
    pub fn with_overflow_checks(mut self, check_overflow: bool) -> Self {
        self.check_overflow = check_overflow;
        self
    }

    #[must_use]
    pub fn with_examples(mut self, generate_examples: bool) -> Self {
        self.generate_examples = generate_examples;
        self
    }

    #[must_use]
    pub fn with_max_enumerated_values(mut self, max: usize) -> Self {
        self.max_enumerated_values = max;
        self
    }

    pub fn is_parallel(&self) -> bool {
        self.workers > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.loop_bound, 16);
        assert_eq!(config.solver_timeout, Duration::from_secs(5));
        assert_eq!(config.search, SearchStrategy::DepthFirst);
        assert!(config.generate_examples);
        assert!(!config.check_overflow);
        assert!(!config.is_parallel());
    }

    #[test]
    fn zero_workers_means_one() {
        assert_eq!(Config::new().with_workers(0).workers, 1);
        assert!(Config::new().with_workers(4).is_parallel());
    }
}
