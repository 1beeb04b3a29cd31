//! Sweep dimensions
//!
//! Dimension 0 is always the task list. Every further dimension is a named
//! range whose values are merged into the trial's parameter set.

use crate::error::{RelentlessError, RelentlessResult};
use crate::params::{ParamValue, Task};

/// The task dimension: `1..=count` or an explicit list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskSpec {
    Count(u64),
    List(Vec<Task>),
}

impl TaskSpec {
    /// Tasks in iteration order
    pub fn tasks(&self) -> Vec<Task> {
        match self {
            Self::Count(count) => (1..=*count).collect(),
            Self::List(tasks) => tasks.clone(),
        }
    }
}

impl From<u64> for TaskSpec {
    fn from(count: u64) -> Self {
        Self::Count(count)
    }
}

impl From<Vec<Task>> for TaskSpec {
    fn from(tasks: Vec<Task>) -> Self {
        Self::List(tasks)
    }
}

/// How a named range produces its values
#[derive(Debug, Clone, PartialEq)]
pub enum RangeSpec {
    /// Explicit values, in order
    Values(Vec<ParamValue>),
    /// `count` evenly spaced floats from `start` to `stop`, both included
    Linear { start: f64, stop: f64, count: usize },
    /// Integers from `start` up to, not including, `stop`
    Step { start: i64, stop: i64, step: i64 },
}

/// One named sweep dimension
#[derive(Debug, Clone, PartialEq)]
pub struct SweepRange {
    name: String,
    spec: RangeSpec,
}

impl SweepRange {
    pub fn new(name: impl Into<String>, spec: RangeSpec) -> Self {
        Self {
            name: name.into(),
            spec,
        }
    }

    pub fn values<V: Into<ParamValue>>(name: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::new(
            name,
            RangeSpec::Values(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn linear(name: impl Into<String>, start: f64, stop: f64, count: usize) -> Self {
        Self::new(name, RangeSpec::Linear { start, stop, count })
    }

    pub fn step(name: impl Into<String>, start: i64, stop: i64, step: i64) -> Self {
        Self::new(name, RangeSpec::Step { start, stop, step })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &RangeSpec {
        &self.spec
    }

    /// Expand the range, rejecting empty or malformed ranges
    pub fn expand(&self) -> RelentlessResult<Vec<ParamValue>> {
        let invalid = |reason: String| {
            RelentlessError::InvalidSweep(format!("range '{}': {}", self.name, reason))
        };

        if self.name.trim().is_empty() {
            return Err(RelentlessError::InvalidSweep(
                "range names must not be empty".to_string(),
            ));
        }

        let values = match &self.spec {
            RangeSpec::Values(values) => values.clone(),
            RangeSpec::Linear { start, stop, count } => match count {
                0 => Vec::new(),
                1 => vec![ParamValue::Float(*start)],
                n => {
                    let delta = (stop - start) / (*n as f64 - 1.0);
                    (0..*n)
                        .map(|i| ParamValue::Float(start + delta * i as f64))
                        .collect()
                }
            },
            RangeSpec::Step { start, stop, step } => {
                if *step == 0 {
                    return Err(invalid("step must not be zero".to_string()));
                }
                let mut values = Vec::new();
                let mut current = *start;
                while (*step > 0 && current < *stop) || (*step < 0 && current > *stop) {
                    values.push(ParamValue::Int(current));
                    current = match current.checked_add(*step) {
                        Some(next) => next,
                        None => break,
                    };
                }
                values
            }
        };

        if values.is_empty() {
            return Err(invalid("no values".to_string()));
        }
        Ok(values)
    }
}
