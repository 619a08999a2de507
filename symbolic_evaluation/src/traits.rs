//! Traits for the generic symbolic execution algorithm.

/// State transition systems.
pub trait Transition: Sized {
  type IntoIter: IntoIterator<Item=Self>;
  /// The successors of a non-final state, in the order they should be explored.
  fn suc(self) -> Self::IntoIter;
  fn is_final(&self) -> bool;
}

/// Sets of pending evaluation states.
pub trait Frontier<T> {
  /// Create an empty frontier.
  fn new() -> Self;
  /// Add the successors of one state. `states` are given in exploration
  /// order, the frontier decides where they go relative to older entries.
  fn insert(&mut self, states: Vec<T>);
  /// Remove the next state to explore.
  fn pick_next(&mut self) -> Option<T>;
  fn is_empty(&self) -> bool;
  fn len(&self) -> usize;
}
