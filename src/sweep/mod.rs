//! Parameter sweeps
//!
//! A [`Sweep`] declares a task dimension and any number of named ranges;
//! [`SweepEngine`] evaluates their Cartesian product into a [`Grid`] whose
//! cell order is fixed by declaration order, so grids of the same sweep
//! can be zipped positionally.

mod engine;
pub mod grid;
mod progress;
pub mod range;

pub use engine::{Dependence, ExecutionMode, Sweep, SweepEngine, SweepOptions, SweepPlan};
pub use grid::{Grid, ResultGrid, ScoreGrid};
pub use range::{RangeSpec, SweepRange, TaskSpec};
