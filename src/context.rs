//! Build context: what was built, and where
//!
//! A context is a working directory plus, optionally, the resolved revision
//! it was checked out at. Only a context with a stable identity can take part
//! in result caching; two contexts with the same identity share cache
//! entries regardless of where they live on disk.

use std::fmt;
use std::path::{Path, PathBuf};

/// Name of the build diagnostics log inside a working directory
pub const BUILD_LOG: &str = "compile.log";

/// Identity of a built artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    working_dir: PathBuf,
    src_dir: PathBuf,
    revision: Option<String>,
}

impl BuildContext {
    /// Context building in `working_dir`, with sources in the same place
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        let working_dir = working_dir.into();
        Self {
            src_dir: working_dir.clone(),
            working_dir,
            revision: None,
        }
    }

    /// Set the directory that holds auxiliary sources (tester jars, scripts)
    pub fn with_src_dir(mut self, src_dir: impl Into<PathBuf>) -> Self {
        self.src_dir = src_dir.into();
        self
    }

    /// Attach the resolved revision this context was built from
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    /// Directory the build and the trials run in
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Directory holding auxiliary sources
    pub fn src_dir(&self) -> &Path {
        &self.src_dir
    }

    /// Stable identity used in cache keys, if this context has one
    pub fn identity(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    /// Location of the build diagnostics log
    pub fn build_log_path(&self) -> PathBuf {
        self.working_dir.join(BUILD_LOG)
    }
}

impl fmt::Display for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.revision {
            Some(rev) => write!(f, "{} @ {}", self.working_dir.display(), rev),
            None => write!(f, "{}", self.working_dir.display()),
        }
    }
}
