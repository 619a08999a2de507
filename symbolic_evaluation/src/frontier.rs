//! Search strategies.

use std::collections::VecDeque;

use crate::traits::Frontier;

/// Depth-first search.
///
/// Each path is explored for as long as possible. Siblings are explored in the
/// order they were produced, so the first successor of a fork is finished
/// before the second one is started.
#[derive(Debug, Clone)]
pub struct DepthFirst<T>(Vec<T>);

impl<T> Frontier<T> for DepthFirst<T> {
  fn new() -> Self {
    Self(Vec::new())
  }

  fn insert(&mut self, states: Vec<T>) {
    // the stack pops from the back
    self.0.extend(states.into_iter().rev());
  }

  fn pick_next(&mut self) -> Option<T> {
    self.0.pop()
  }

  fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  fn len(&self) -> usize {
    self.0.len()
  }
}

/// Breadth-first search, states are explored level by level.
#[derive(Debug, Clone)]
pub struct BreadthFirst<T>(VecDeque<T>);

impl<T> Frontier<T> for BreadthFirst<T> {
  fn new() -> Self {
    Self(VecDeque::new())
  }

  fn insert(&mut self, states: Vec<T>) {
    self.0.extend(states);
  }

  fn pick_next(&mut self) -> Option<T> {
    self.0.pop_front()
  }

  fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  fn len(&self) -> usize {
    self.0.len()
  }
}
