//! Compile-once guard
//!
//! Concurrent callers of [`BuildGate::ensure_built`] wait on a single build.
//! A failed build leaves the gate open so a later call may retry. Sweeps
//! force the build before fanning out, so workers only ever observe a gate
//! that is already closed.

use crate::error::RelentlessResult;
use std::future::Future;
use tokio::sync::OnceCell;

/// Tracks whether a build context has been built
#[derive(Debug, Default)]
pub struct BuildGate {
    built: OnceCell<()>,
}

impl BuildGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_built(&self) -> bool {
        self.built.initialized()
    }

    /// Run `build` unless a previous call already succeeded
    pub async fn ensure_built<F, Fut>(&self, build: F) -> RelentlessResult<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RelentlessResult<()>>,
    {
        self.built.get_or_try_init(build).await.map(|_| ())
    }
}
