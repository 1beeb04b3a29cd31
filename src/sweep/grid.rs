//! Dense N-dimensional result arrays
//!
//! Cells are stored row-major: the last dimension varies fastest. With the
//! task dimension first, consecutive cells share a task.

use crate::computation::TrialResult;
use crate::error::{RelentlessError, RelentlessResult};

/// Row-major array whose shape is the product of the swept dimensions
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    shape: Vec<usize>,
    cells: Vec<T>,
}

/// Trial results of one sweep
pub type ResultGrid = Grid<TrialResult>;

/// Scores of one sweep
pub type ScoreGrid = Grid<f64>;

impl<T> Grid<T> {
    pub fn from_cells(shape: Vec<usize>, cells: Vec<T>) -> RelentlessResult<Self> {
        let expected: usize = shape.iter().product();
        if expected != cells.len() {
            return Err(RelentlessError::Internal(format!(
                "grid of shape {:?} needs {} cells, got {}",
                shape,
                expected,
                cells.len()
            )));
        }
        Ok(Self { shape, cells })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cells in row-major order
    pub fn cells(&self) -> &[T] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<T> {
        self.cells
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.cells.iter()
    }

    /// Cell at `coord`, one index per dimension
    pub fn get(&self, coord: &[usize]) -> Option<&T> {
        if coord.len() != self.shape.len() {
            return None;
        }
        let mut index = 0;
        for (&i, &dim) in coord.iter().zip(&self.shape) {
            if i >= dim {
                return None;
            }
            index = index * dim + i;
        }
        self.cells.get(index)
    }

    /// Apply `f` to every cell, keeping the shape
    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Grid<U> {
        Grid {
            shape: self.shape.clone(),
            cells: self.cells.iter().map(f).collect(),
        }
    }
}

/// Coordinate of the `index`-th row-major cell of `shape`
pub fn coordinate(mut index: usize, shape: &[usize]) -> Vec<usize> {
    let mut coord = vec![0; shape.len()];
    for (slot, &dim) in coord.iter_mut().zip(shape).rev() {
        if dim == 0 {
            continue;
        }
        *slot = index % dim;
        index /= dim;
    }
    coord
}

impl Grid<f64> {
    /// Sum over the first dimension, dropping it from the shape
    pub fn sum_axis0(&self) -> Grid<f64> {
        let rest: Vec<usize> = self.shape.iter().skip(1).copied().collect();
        let stride: usize = rest.iter().product();
        let mut cells = vec![0.0; stride];
        if stride > 0 {
            for row in self.cells.chunks(stride) {
                for (total, value) in cells.iter_mut().zip(row) {
                    *total += value;
                }
            }
        }
        Grid { shape: rest, cells }
    }

    /// Sum of every cell
    pub fn total(&self) -> f64 {
        self.cells.iter().sum()
    }
}

impl<'a, T> IntoIterator for &'a Grid<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
