//! A generic symbolic execution algorithm.

use rayon::{Scope, ThreadPoolBuildError, ThreadPoolBuilder};

use crate::traits::{Frontier, Transition};

/// Explore every state reachable from `init_state` on the current thread.
///
/// Final states are handed to `report` in the order the frontier reaches them,
/// which makes the enumeration deterministic for a deterministic transition
/// system.
pub fn eval<T, S, G>(init_state: T, mut report: G)
  where
    T: Transition,
    S: Frontier<T>,
    G: FnMut(T),
{
  if init_state.is_final() {
    report(init_state);
    return;
  }
  let mut frontier = S::new();
  frontier.insert(vec![init_state]);
  while let Some(state) = frontier.pick_next() {
    let mut pending = Vec::new();
    for s in state.suc() {
      if s.is_final() {
        report(s);
      } else {
        pending.push(s);
      }
    }
    frontier.insert(pending);
  }
}

/// Explore every state reachable from `init_state` on the current rayon pool.
///
/// Every non-final successor becomes its own task on the pool's work-stealing
/// queue. `report` is called from whichever worker finishes a path, so final
/// states arrive in completion order.
pub fn par_eval<'a, T, G>(init_state: T, report: &'a G)
  where
    T: Transition + Send + 'a,
    G: Fn(T) + Sync,
{
  rayon::scope(|scope| explore(scope, init_state, report));
}

fn explore<'scope, T, G>(scope: &Scope<'scope>, state: T, report: &'scope G)
  where
    T: Transition + Send + 'scope,
    G: Fn(T) + Sync,
{
  if state.is_final() {
    report(state);
    return;
  }
  for s in state.suc() {
    if s.is_final() {
      report(s);
    } else {
      scope.spawn(move |scope| explore(scope, s, report));
    }
  }
}

/// [`par_eval`] on a dedicated pool of `workers` threads.
pub fn par_eval_with_workers<T, G>(workers: usize, init_state: T, report: &G) -> Result<(), ThreadPoolBuildError>
  where
    T: Transition + Send,
    G: Fn(T) + Sync,
{
  let pool = ThreadPoolBuilder::new().num_threads(workers).build()?;
  pool.install(|| par_eval(init_state, report));
  Ok(())
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use super::*;
  use crate::frontier::{BreadthFirst, DepthFirst};

  /// A full binary tree of the given depth, leaves are final.
  #[derive(Debug, Clone, PartialEq, Eq)]
  struct Node {
    path: String,
    depth: usize,
  }

  impl Transition for Node {
    type IntoIter = Vec<Node>;

    fn suc(self) -> Vec<Node> {
      ["t", "e"]
        .iter()
        .map(|b| Node { path: format!("{}{}", self.path, b), depth: self.depth - 1 })
        .collect()
    }

    fn is_final(&self) -> bool {
      self.depth == 0
    }
  }

  fn leaves<S: Frontier<Node>>() -> Vec<String> {
    let mut res = Vec::new();
    eval::<_, S, _>(Node { path: String::new(), depth: 2 }, |n: Node| res.push(n.path));
    res
  }

  #[test]
  fn depth_first_explores_first_successor_first() {
    assert_eq!(leaves::<DepthFirst<Node>>(), vec!["tt", "te", "et", "ee"]);
  }

  #[test]
  fn breadth_first_reaches_same_leaves() {
    assert_eq!(leaves::<BreadthFirst<Node>>(), vec!["tt", "te", "et", "ee"]);
  }

  #[test]
  fn final_initial_state_is_reported() {
    assert_eq!(
      {
        let mut res = Vec::new();
        eval::<_, DepthFirst<Node>, _>(Node { path: "x".into(), depth: 0 }, |n: Node| res.push(n.path));
        res
      },
      vec!["x"]
    );
  }

  #[test]
  fn parallel_reports_every_leaf() {
    let found = Mutex::new(Vec::new());
    par_eval_with_workers(4, Node { path: String::new(), depth: 4 }, &|n: Node| {
      found.lock().unwrap().push(n.path)
    })
    .unwrap();
    let mut found = found.into_inner().unwrap();
    found.sort();
    let mut expected = leaves_of_depth(4);
    expected.sort();
    assert_eq!(found, expected);
  }

  fn leaves_of_depth(depth: usize) -> Vec<String> {
    let mut res = Vec::new();
    eval::<_, DepthFirst<Node>, _>(Node { path: String::new(), depth }, |n: Node| res.push(n.path));
    res
  }
}
