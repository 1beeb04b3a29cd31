//! Sweeps over committed revisions

use crate::computation::TrialResult;
use crate::config::Config;
use crate::error::RelentlessResult;
use crate::params::{ParameterSet, Task};
use crate::revision::{
    intensities, BuildContextResolver, Comparison, FieldComparison, GitResolver, HistoryPoint,
};
use crate::sweep::{ResultGrid, ScoreGrid, Sweep, SweepEngine};
use crate::tester::{Project, TesterOptions};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::info;

/// Checkouts directory inside the project state directory
const CHECKOUTS_DIR: &str = "checkouts";

/// Default branch swept when none is given
const DEFAULT_REFERENCE: &str = "master";

/// Builds and runs revisions of a project, one checkout per commit
pub struct RevisionTester<R = GitResolver> {
    project: Project,
    resolver: R,
    reference: String,
    /// Engines per resolved revision, so each is built once per process
    engines: Mutex<HashMap<String, SweepEngine>>,
}

impl RevisionTester<GitResolver> {
    /// Tester for the git repository holding the project, at `master`
    pub async fn open(
        path: impl AsRef<Path>,
        config: &Config,
        options: &TesterOptions,
    ) -> RelentlessResult<Self> {
        let project = Project::open(path, config, options).await?;
        let resolver = GitResolver::new(project.dir(), project.state_dir().join(CHECKOUTS_DIR));
        Ok(Self::with_resolver(project, resolver))
    }

    /// Total score of `sweep` at every commit of `branches`, oldest first.
    ///
    /// With `since`, commits before the first one whose id starts with it
    /// are skipped.
    pub async fn score_history(
        &self,
        sweep: &Sweep,
        branches: Option<&[String]>,
        since: Option<&str>,
    ) -> RelentlessResult<Vec<HistoryPoint>> {
        let history = self.resolver.list_commits(branches).await?;

        let mut going = since.is_none();
        let mut commits = Vec::new();
        let mut scores = Vec::new();
        for commit in history.commits {
            if !going && since.is_some_and(|prefix| commit.id.starts_with(prefix)) {
                going = true;
            }
            if !going {
                continue;
            }
            info!("Scoring commit {} ({})", &commit.id, commit.summary);
            let total = self.iterate_score_at(&commit.id, sweep).await?.total();
            scores.push(total);
            commits.push(commit);
        }

        Ok(commits
            .into_iter()
            .zip(scores.iter().copied().zip(intensities(&scores)))
            .map(|(commit, (score, intensity))| HistoryPoint {
                commit,
                score,
                intensity,
            })
            .collect())
    }

    /// Delete every materialized checkout
    pub async fn cleanup(&self) -> RelentlessResult<()> {
        self.engines.lock().await.clear();
        self.resolver.cleanup().await
    }
}

impl<R: BuildContextResolver> RevisionTester<R> {
    pub fn with_resolver(project: Project, resolver: R) -> Self {
        Self {
            project,
            resolver,
            reference: DEFAULT_REFERENCE.to_string(),
            engines: Mutex::new(HashMap::new()),
        }
    }

    /// Select the reference later calls sweep at
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    pub fn set_reference(&mut self, reference: impl Into<String>) {
        self.reference = reference.into();
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Engine for `reference`, materializing its checkout on first use
    pub async fn engine_at(&self, reference: &str) -> RelentlessResult<SweepEngine> {
        let revision = self.resolver.resolve(reference).await?;

        let mut engines = self.engines.lock().await;
        if let Some(engine) = engines.get(&revision) {
            return Ok(engine.clone());
        }

        let context = self.resolver.materialize(&revision).await?;
        info!("Materialized {} as {}", reference, context);
        let engine = self.project.engine(context);
        engines.insert(revision, engine.clone());
        Ok(engine)
    }

    pub async fn run(
        &self,
        task: Task,
        params: &ParameterSet,
        vis: bool,
    ) -> RelentlessResult<TrialResult> {
        self.engine_at(&self.reference).await?.run(task, params, vis).await
    }

    pub async fn score(&self, task: Task, params: &ParameterSet) -> RelentlessResult<f64> {
        Ok(self.run(task, params, false).await?.score())
    }

    pub async fn iterate(&self, sweep: &Sweep) -> RelentlessResult<ResultGrid> {
        self.iterate_at(&self.reference, sweep).await
    }

    pub async fn iterate_score(&self, sweep: &Sweep) -> RelentlessResult<ScoreGrid> {
        self.iterate_score_at(&self.reference, sweep).await
    }

    pub async fn iterate_at(&self, reference: &str, sweep: &Sweep) -> RelentlessResult<ResultGrid> {
        self.engine_at(reference).await?.iterate(sweep).await
    }

    pub async fn iterate_score_at(
        &self,
        reference: &str,
        sweep: &Sweep,
    ) -> RelentlessResult<ScoreGrid> {
        self.engine_at(reference).await?.iterate_score(sweep).await
    }

    /// Compare `fields` (`score` when empty) between the current reference
    /// and `other`
    pub async fn compare(
        &self,
        other: &str,
        sweep: &Sweep,
        fields: &[&str],
    ) -> RelentlessResult<Comparison> {
        let old = self.iterate_at(&self.reference, sweep).await?;
        let new = self.iterate_at(other, sweep).await?;

        let fields: &[&str] = if fields.is_empty() { &["score"] } else { fields };
        let fields = fields
            .iter()
            .map(|field| FieldComparison::between(field, &old, &new))
            .collect::<RelentlessResult<Vec<_>>>()?;

        Ok(Comparison {
            base: self.reference.clone(),
            other: other.to_string(),
            fields,
        })
    }
}
