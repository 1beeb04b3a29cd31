//! Computation abstraction
//!
//! Provides a trait for the build/run contract so that different execution
//! strategies (plain executable, external tester wrapper) can be swapped by
//! configuration.

use crate::computation::result::TrialResult;
use crate::context::BuildContext;
use crate::error::RelentlessResult;
use crate::params::{ParameterSet, Task};
use async_trait::async_trait;

/// Abstract trial-execution interface
///
/// Implementations build their artifact at most once per [`BuildContext`]
/// and run numbered trials against it.
#[async_trait]
pub trait Computation: Send + Sync {
    /// The build context this computation compiles and runs in
    fn context(&self) -> &BuildContext;

    /// Whether the build has already completed
    fn is_built(&self) -> bool;

    /// Build the artifact unless it is already built
    async fn ensure_built(&self) -> RelentlessResult<()>;

    /// Run one trial, building first if necessary.
    ///
    /// A non-zero exit is reported inside the result, not as an error.
    async fn run_trial(
        &self,
        task: Task,
        params: &ParameterSet,
        vis: bool,
    ) -> RelentlessResult<TrialResult>;

    /// Human-readable name of the computation variant
    fn kind_name(&self) -> &'static str;
}
