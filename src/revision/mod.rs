//! Source-control revisions as build contexts
//!
//! A resolver turns a symbolic reference into a stable identifier and
//! materializes an isolated checkout for it. The identifier becomes the
//! context's cache identity.

mod compare;
mod git;
mod history;

pub use compare::{likelihood_of_superiority, Comparison, ComparisonSummary, FieldComparison};
pub use git::{Commit, CommitHistory, GitResolver};
pub use history::{intensities, HistoryPoint};

use crate::context::BuildContext;
use crate::error::RelentlessResult;
use async_trait::async_trait;

/// Maps symbolic revisions to buildable contexts
#[async_trait]
pub trait BuildContextResolver: Send + Sync {
    /// Stable identifier for `reference`: the reference itself when it
    /// exists locally, otherwise its remote-tracking equivalent
    async fn resolve(&self, reference: &str) -> RelentlessResult<String>;

    /// Isolated working copy at `revision`, reused across calls
    async fn materialize(&self, revision: &str) -> RelentlessResult<BuildContext>;
}
