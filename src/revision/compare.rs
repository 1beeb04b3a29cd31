//! Positional comparison of two sweeps
//!
//! Both grids come from the same sweep, so cells are zipped by position.
//! Differences are `new - old`; for minimised fields a decrease counts as
//! a win.

use crate::computation::{TrialResult, MINIMISED_FIELDS};
use crate::error::{RelentlessError, RelentlessResult};
use crate::params::Task;
use crate::sweep::ResultGrid;
use std::fmt;

/// Aggregate statistics over the per-cell differences of one field.
///
/// Wins and losses follow the field's direction rather than the sign of
/// `new - old`: for a minimised field such as `runtime` a decrease is a
/// win, so a faster revision never scores as a loss.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComparisonSummary {
    /// Largest improvement, 0 when nothing improved
    pub best: f64,
    /// Largest regression, 0 when nothing regressed
    pub worst: f64,
    pub average: f64,
    /// `sum(new) / sum(old)`, `None` when the old total is zero
    pub ratio: Option<f64>,
    pub wins: usize,
    pub losses: usize,
    /// Likelihood that the new revision is better
    pub likelihood_of_superiority: f64,
}

/// One field compared cell by cell
#[derive(Debug, Clone, PartialEq)]
pub struct FieldComparison {
    pub field: String,
    pub maximise: bool,
    pub tasks: Vec<Task>,
    pub old: Vec<f64>,
    pub new: Vec<f64>,
    pub summary: ComparisonSummary,
}

impl FieldComparison {
    /// Compare `field` across two grids of the same sweep.
    ///
    /// Cells where either side lacks a numeric value are left out of the
    /// statistics and reported as NaN.
    pub fn between(field: &str, old: &ResultGrid, new: &ResultGrid) -> RelentlessResult<Self> {
        if old.shape() != new.shape() {
            return Err(RelentlessError::InvalidSweep(format!(
                "cannot compare grids of shapes {:?} and {:?}",
                old.shape(),
                new.shape()
            )));
        }

        let value = |r: &TrialResult| r.field(field).unwrap_or(f64::NAN);
        let old_values: Vec<f64> = old.iter().map(value).collect();
        let new_values: Vec<f64> = new.iter().map(value).collect();
        let maximise = !MINIMISED_FIELDS.contains(&field);

        Ok(Self {
            field: field.to_string(),
            maximise,
            tasks: new.iter().map(TrialResult::task).collect(),
            summary: summarize(&old_values, &new_values, maximise),
            old: old_values,
            new: new_values,
        })
    }

    /// `new - old` per cell
    pub fn differences(&self) -> Vec<f64> {
        self.new.iter().zip(&self.old).map(|(n, o)| n - o).collect()
    }
}

impl fmt::Display for ComparisonSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ratio = self
            .ratio
            .map(|r| format!("{:.3}", r))
            .unwrap_or_else(|| "n/a".to_string());
        write!(
            f,
            "Best: {:.3} | Worst: {:.3} | Avg: {:.3} | Rel: {} | Wins: {} | Losses: {} | LOS: {:.3}",
            self.best,
            self.worst,
            self.average,
            ratio,
            self.wins,
            self.losses,
            self.likelihood_of_superiority
        )
    }
}

/// Result of comparing a sweep at two revisions
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// Revision the comparison starts from
    pub base: String,
    /// Revision compared against it
    pub other: String,
    pub fields: Vec<FieldComparison>,
}

impl Comparison {
    pub fn field(&self, name: &str) -> Option<&FieldComparison> {
        self.fields.iter().find(|f| f.field == name)
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "({}) <- ({})", self.other, self.base)?;
        for field in &self.fields {
            writeln!(f, "  {}: {}", field.field, field.summary)?;
        }
        Ok(())
    }
}

fn summarize(old: &[f64], new: &[f64], maximise: bool) -> ComparisonSummary {
    let diffs: Vec<f64> = new
        .iter()
        .zip(old)
        .map(|(n, o)| n - o)
        .filter(|d| !d.is_nan())
        .collect();

    // Improvements are positive in the field's preferred direction.
    let sign = if maximise { 1.0 } else { -1.0 };
    let mut best: f64 = 0.0;
    let mut worst: f64 = 0.0;
    let mut wins = 0;
    let mut losses = 0;
    for &d in &diffs {
        let gain = d * sign;
        if gain > 0.0 {
            wins += 1;
        } else if gain < 0.0 {
            losses += 1;
        }
        if gain > best * sign {
            best = d;
        }
        if gain < worst * sign {
            worst = d;
        }
    }

    let average = if diffs.is_empty() {
        0.0
    } else {
        diffs.iter().sum::<f64>() / diffs.len() as f64
    };

    let finite_sum = |values: &[f64]| values.iter().filter(|v| !v.is_nan()).sum::<f64>();
    let total_old = finite_sum(old);
    let ratio = (total_old != 0.0).then(|| finite_sum(new) / total_old);

    ComparisonSummary {
        best,
        worst,
        average,
        ratio,
        wins,
        losses,
        likelihood_of_superiority: likelihood_of_superiority(wins, losses),
    }
}

/// `0.5 * (1 + erf((wins - losses) / sqrt(wins + losses) / sqrt(2)))`, 0.5
/// without any decided cell
pub fn likelihood_of_superiority(wins: usize, losses: usize) -> f64 {
    let decided = (wins + losses) as f64;
    if decided == 0.0 {
        return 0.5;
    }
    let z = (wins as f64 - losses as f64) / decided.sqrt();
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// Error function, Abramowitz and Stegun 7.1.26 (absolute error < 1.5e-7)
fn erf(x: f64) -> f64 {
    const A1: f64 = 0.254_829_592;
    const A2: f64 = -0.284_496_736;
    const A3: f64 = 1.421_413_741;
    const A4: f64 = -1.453_152_027;
    const A5: f64 = 1.061_405_429;
    const P: f64 = 0.327_591_1;

    let sign = x.signum();
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let poly = ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t;
    sign * (1.0 - poly * (-x * x).exp())
}
