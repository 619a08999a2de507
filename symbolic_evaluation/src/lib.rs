//! # Symbolic Evaluation
//! 
//! The crate defines a generic symbolic execution algorithm parametrized by
//! 
//! - a transition system, which defines the dynamic of the language;
//! 
//! - a frontier of pending states, which defines the search strategy
//! (depth-first or breadth-first);
//! 
//! - a `report` callback, which receives every final state.
//!
//! States are independent snapshots, so the same transition system can also
//! be explored by a pool of workers with [`evaluation::par_eval`].

pub mod traits;
pub mod frontier;
pub mod evaluation;

pub use rayon::ThreadPoolBuildError;
