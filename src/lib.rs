//! Relentless - cached, parallel parameter sweeps
//!
//! Builds a candidate program once per build context, runs it against
//! numbered tasks across swept parameters, and caches results per
//! committed revision.

pub mod cache;
pub mod computation;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod params;
pub mod revision;
pub mod sweep;
pub mod tester;

pub use error::{RelentlessError, RelentlessResult};
pub use params::{ParamValue, ParameterSet, Task};
pub use sweep::{Sweep, SweepEngine, SweepRange};
pub use tester::{RevisionTester, Tester, TesterOptions};
