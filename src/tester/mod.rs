//! Project-level entry points
//!
//! A project is addressed by the path of its executable, e.g.
//! `solutions/solver`: the executable name is `solver` and the project
//! directory is `solutions/`. State (result cache, profile and revision
//! checkouts) lives in a state directory inside the project directory.
//!
//! - [`Tester`] builds and runs the working tree as it is. A working tree
//!   has no stable identity, so its results are never cached.
//! - [`RevisionTester`] builds committed revisions in isolated checkouts
//!   and caches their results by commit id.

mod revision;

pub use revision::RevisionTester;

use crate::cache::{FileStore, ResultCache};
use crate::computation::{create_computation, ComputationSpec, TrialResult};
use crate::config::{Config, ProfileStore, ProjectProfile};
use crate::context::BuildContext;
use crate::error::{RelentlessError, RelentlessResult};
use crate::params::{ParameterSet, Task};
use crate::sweep::{Dependence, ResultGrid, ScoreGrid, Sweep, SweepEngine, SweepOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Construction-time choices for a tester
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TesterOptions {
    /// Explicit choices; unset fields fall back to the stored profile
    pub profile: ProjectProfile,
    /// Read the stored profile
    pub auto_profile: bool,
    /// Override `[cache] enabled`
    pub cache: Option<bool>,
}

impl Default for TesterOptions {
    fn default() -> Self {
        Self {
            profile: ProjectProfile::default(),
            auto_profile: true,
            cache: None,
        }
    }
}

/// Resolved layout and settings of one project
#[derive(Clone)]
pub struct Project {
    name: String,
    dir: PathBuf,
    state_dir: PathBuf,
    spec: ComputationSpec,
    cache: ResultCache,
    sweep: SweepOptions,
}

impl Project {
    /// Resolve the project at `path` and its profile
    pub async fn open(
        path: impl AsRef<Path>,
        config: &Config,
        options: &TesterOptions,
    ) -> RelentlessResult<Self> {
        let path = path.as_ref();
        let invalid = |reason: &str| RelentlessError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let absolute = std::path::absolute(path)
            .map_err(|e| RelentlessError::io(format!("resolving {}", path.display()), e))?;
        let name = absolute
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| invalid("project path has no executable name"))?;
        let dir = absolute
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| invalid("project path has no parent directory"))?;
        let state_dir = dir.join(&config.project.state_dir);

        let profile = ProfileStore::in_state_dir(&state_dir)
            .resolve(&options.profile, options.auto_profile)
            .await?;
        let spec = ComputationSpec::from_profile(name.clone(), &profile);

        let store = FileStore::open(state_dir.join(&config.cache.file_name));
        let cache = ResultCache::new(Arc::new(store))
            .with_enabled(options.cache.unwrap_or(config.cache.enabled));

        debug!(
            "Opened project {} in {} ({} computation)",
            name,
            dir.display(),
            spec.kind
        );

        Ok(Self {
            name,
            dir,
            state_dir,
            spec,
            cache,
            sweep: SweepOptions::from(&config.sweep),
        })
    }

    /// Executable name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory holding the project sources
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn spec(&self) -> &ComputationSpec {
        &self.spec
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn sweep_options(&self) -> SweepOptions {
        self.sweep
    }

    /// Sweep engine building in `context`
    pub fn engine(&self, context: BuildContext) -> SweepEngine {
        SweepEngine::new(create_computation(&self.spec, context), self.cache.clone())
            .with_options(self.sweep)
    }
}

/// Builds and runs the project's working tree
pub struct Tester {
    project: Project,
    engine: SweepEngine,
}

impl Tester {
    pub async fn open(
        path: impl AsRef<Path>,
        config: &Config,
        options: &TesterOptions,
    ) -> RelentlessResult<Self> {
        let project = Project::open(path, config, options).await?;
        let engine = project.engine(BuildContext::new(project.dir()));
        Ok(Self { project, engine })
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn engine(&self) -> &SweepEngine {
        &self.engine
    }

    /// Build now rather than on the first trial
    pub async fn build(&self) -> RelentlessResult<()> {
        self.engine.computation().ensure_built().await
    }

    pub async fn run(
        &self,
        task: Task,
        params: &ParameterSet,
        vis: bool,
    ) -> RelentlessResult<TrialResult> {
        self.engine.run(task, params, vis).await
    }

    /// Score of a single run
    pub async fn score(&self, task: Task, params: &ParameterSet) -> RelentlessResult<f64> {
        Ok(self.run(task, params, false).await?.score())
    }

    pub async fn iterate(&self, sweep: &Sweep) -> RelentlessResult<ResultGrid> {
        self.engine.iterate(sweep).await
    }

    pub async fn iterate_score(&self, sweep: &Sweep) -> RelentlessResult<ScoreGrid> {
        self.engine.iterate_score(sweep).await
    }

    pub async fn dependence(&self, sweep: &Sweep) -> RelentlessResult<Dependence> {
        self.engine.dependence(sweep).await
    }
}
