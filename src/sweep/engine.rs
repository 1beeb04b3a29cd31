//! Sweep execution
//!
//! # Execution mode
//!
//! Before dispatching, the engine checks whether every task is already
//! cached with the base parameters alone:
//!
//! - all cached: run the grid serially, building lazily only if some cell
//!   still misses
//! - otherwise: build synchronously, then fan the cells out over a bounded
//!   worker pool
//!
//! Workers get a deferred-write cache handle; the engine commits their
//! writes after every completed cell.

use crate::cache::ResultCache;
use crate::computation::{Computation, TrialResult};
use crate::config::SweepConfig;
use crate::error::{RelentlessError, RelentlessResult};
use crate::params::{ParamValue, ParameterSet, Task};
use crate::sweep::grid::{coordinate, Grid, ResultGrid, ScoreGrid};
use crate::sweep::progress::SweepProgress;
use crate::sweep::range::{SweepRange, TaskSpec};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

/// How a sweep dispatches its cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// In order, on the calling task
    Serial,
    /// Over a bounded worker pool, after a forced build
    Parallel,
}

/// Worker pool and display settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepOptions {
    pub workers: usize,
    pub progress: bool,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self::from(&SweepConfig::default())
    }
}

impl From<&SweepConfig> for SweepOptions {
    fn from(config: &SweepConfig) -> Self {
        Self {
            workers: config.worker_count(),
            progress: config.progress,
        }
    }
}

/// Declared dimensions of a sweep plus the parameters shared by every cell
#[derive(Debug, Clone, PartialEq)]
pub struct Sweep {
    tasks: TaskSpec,
    ranges: Vec<SweepRange>,
    params: ParameterSet,
}

impl Sweep {
    pub fn new(tasks: impl Into<TaskSpec>) -> Self {
        Self {
            tasks: tasks.into(),
            ranges: Vec::new(),
            params: ParameterSet::new(),
        }
    }

    /// Add a named dimension after the ones already declared
    pub fn with_range(mut self, range: SweepRange) -> Self {
        self.ranges.push(range);
        self
    }

    /// Replace the base parameters
    pub fn with_params(mut self, params: ParameterSet) -> Self {
        self.params = params;
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn tasks(&self) -> &TaskSpec {
        &self.tasks
    }

    pub fn ranges(&self) -> &[SweepRange] {
        &self.ranges
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    /// Expand every dimension, validating the ranges
    pub fn plan(&self) -> RelentlessResult<SweepPlan> {
        let mut seen = HashSet::new();
        let mut axes = Vec::with_capacity(self.ranges.len());
        for range in &self.ranges {
            if !seen.insert(range.name()) {
                return Err(RelentlessError::InvalidSweep(format!(
                    "range '{}' is declared twice",
                    range.name()
                )));
            }
            axes.push((range.name().to_string(), range.expand()?));
        }

        Ok(SweepPlan {
            tasks: self.tasks.tasks(),
            axes,
            base: self.params.clone(),
        })
    }
}

/// A sweep with every dimension expanded
#[derive(Debug, Clone, PartialEq)]
pub struct SweepPlan {
    tasks: Vec<Task>,
    axes: Vec<(String, Vec<ParamValue>)>,
    base: ParameterSet,
}

impl SweepPlan {
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Named dimensions with their values, in declaration order
    pub fn axes(&self) -> &[(String, Vec<ParamValue>)] {
        &self.axes
    }

    pub fn base(&self) -> &ParameterSet {
        &self.base
    }

    /// Task dimension first, then each named range
    pub fn shape(&self) -> Vec<usize> {
        std::iter::once(self.tasks.len())
            .chain(self.axes.iter().map(|(_, values)| values.len()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Task and effective parameters of the `index`-th row-major cell
    pub fn cell(&self, index: usize) -> (Task, ParameterSet) {
        let coord = coordinate(index, &self.shape());
        let mut params = self.base.clone();
        for ((name, values), &i) in self.axes.iter().zip(&coord[1..]) {
            params.insert(name.clone(), values[i].clone());
        }
        (self.tasks[coord[0]], params)
    }
}

/// Summed scores over the task dimension, with the swept axis values
#[derive(Debug, Clone, PartialEq)]
pub struct Dependence {
    pub axes: Vec<(String, Vec<ParamValue>)>,
    pub totals: ScoreGrid,
}

/// Runs trials and sweeps for one computation
#[derive(Clone)]
pub struct SweepEngine {
    computation: Arc<dyn Computation>,
    cache: ResultCache,
    options: SweepOptions,
}

impl SweepEngine {
    pub fn new(computation: Arc<dyn Computation>, cache: ResultCache) -> Self {
        Self {
            computation,
            cache,
            options: SweepOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SweepOptions) -> Self {
        self.options = options;
        self
    }

    pub fn computation(&self) -> &Arc<dyn Computation> {
        &self.computation
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn options(&self) -> SweepOptions {
        self.options
    }

    /// Run a single trial through the cache.
    ///
    /// Visual runs never read the cache.
    pub async fn run(
        &self,
        task: Task,
        params: &ParameterSet,
        vis: bool,
    ) -> RelentlessResult<TrialResult> {
        let result = evaluate(self.computation.as_ref(), &self.cache, task, params, vis).await;
        self.cache.sync();
        result
    }

    /// Pick serial or parallel dispatch for `plan`.
    ///
    /// Cells with swept values are never cached, so a plan with named
    /// ranges always has work to fan out.
    pub fn execution_mode(&self, plan: &SweepPlan) -> ExecutionMode {
        if !plan.axes().is_empty() {
            return ExecutionMode::Parallel;
        }
        let context = self.computation.context();
        let covered = plan
            .tasks()
            .iter()
            .all(|&task| self.cache.get(context, task, plan.base()).is_some());
        if covered {
            ExecutionMode::Serial
        } else {
            ExecutionMode::Parallel
        }
    }

    /// Evaluate every cell of `sweep` into a grid shaped like its dimensions
    pub async fn iterate(&self, sweep: &Sweep) -> RelentlessResult<ResultGrid> {
        let plan = sweep.plan()?;
        self.iterate_plan(&plan).await
    }

    /// Scores of [`SweepEngine::iterate`], same shape
    pub async fn iterate_score(&self, sweep: &Sweep) -> RelentlessResult<ScoreGrid> {
        Ok(self.iterate(sweep).await?.map(TrialResult::score))
    }

    /// Scores summed over tasks, for sweeps of one or two named ranges
    pub async fn dependence(&self, sweep: &Sweep) -> RelentlessResult<Dependence> {
        match sweep.ranges().len() {
            0 => {
                return Err(RelentlessError::InvalidSweep(
                    "dependence needs at least one named range".to_string(),
                ))
            }
            1 | 2 => {}
            n => {
                return Err(RelentlessError::InvalidSweep(format!(
                    "dependence supports at most two named ranges, got {}",
                    n
                )))
            }
        }

        let plan = sweep.plan()?;
        let scores = self.iterate_plan(&plan).await?.map(TrialResult::score);
        Ok(Dependence {
            axes: plan.axes().to_vec(),
            totals: scores.sum_axis0(),
        })
    }

    async fn iterate_plan(&self, plan: &SweepPlan) -> RelentlessResult<ResultGrid> {
        let mode = self.execution_mode(plan);
        info!(
            "Sweeping {} cells of shape {:?} ({:?}) in {}",
            plan.len(),
            plan.shape(),
            mode,
            self.computation.context()
        );

        let cells = match mode {
            ExecutionMode::Serial => self.run_serial(plan).await?,
            ExecutionMode::Parallel => self.run_parallel(plan).await?,
        };
        Grid::from_cells(plan.shape(), cells)
    }

    async fn run_serial(&self, plan: &SweepPlan) -> RelentlessResult<Vec<TrialResult>> {
        let progress = SweepProgress::new(self.options.progress, plan.len(), "Sweeping");
        let mut cells = Vec::with_capacity(plan.len());
        for index in 0..plan.len() {
            let (task, params) = plan.cell(index);
            let result = evaluate(self.computation.as_ref(), &self.cache, task, &params, false).await;
            self.cache.sync();
            cells.push(result?);
            progress.inc();
        }
        Ok(cells)
    }

    async fn run_parallel(&self, plan: &SweepPlan) -> RelentlessResult<Vec<TrialResult>> {
        // Workers must never observe an unbuilt context.
        self.computation.ensure_built().await?;

        let workers = self.options.workers.max(1);
        debug!("Dispatching {} cells to {} workers", plan.len(), workers);

        let semaphore = Arc::new(Semaphore::new(workers));
        let mut join_set = JoinSet::new();
        for index in 0..plan.len() {
            let (task, params) = plan.cell(index);
            let computation = Arc::clone(&self.computation);
            let cache = self.cache.worker();
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| RelentlessError::Internal(format!("worker pool closed: {}", e)))?;
                let result = evaluate(computation.as_ref(), &cache, task, &params, false).await?;
                Ok::<_, RelentlessError>((index, result))
            });
        }

        let progress = SweepProgress::new(self.options.progress, plan.len(), "Sweeping");
        let mut slots: Vec<Option<TrialResult>> = vec![None; plan.len()];
        while let Some(joined) = join_set.join_next().await {
            let outcome = joined
                .map_err(|e| RelentlessError::Internal(format!("sweep worker failed: {}", e)))
                .and_then(|outcome| outcome);
            self.cache.sync();

            match outcome {
                Ok((index, result)) => {
                    slots[index] = Some(result);
                    progress.inc();
                }
                Err(e) => {
                    join_set.shutdown().await;
                    self.cache.sync();
                    return Err(e);
                }
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| {
                    RelentlessError::Internal(format!("sweep cell {} produced no result", index))
                })
            })
            .collect()
    }
}

/// Cache lookup, then trial on a miss
async fn evaluate(
    computation: &dyn Computation,
    cache: &ResultCache,
    task: Task,
    params: &ParameterSet,
    vis: bool,
) -> RelentlessResult<TrialResult> {
    let context = computation.context();
    if !vis {
        if let Some(hit) = cache.get(context, task, params) {
            return Ok(hit);
        }
    }

    let result = computation.run_trial(task, params, vis).await?;
    Ok(cache.put(context, task, params, result))
}
