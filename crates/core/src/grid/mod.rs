//! Flat 2D grids for heightmaps and simulation cells
//!
//! Grids are stored as a flat `Vec<T>` with the fixed index `i + j * width`,
//! where `i` runs along the width and `j` along the length. This matches the
//! host terrain layout (`heights[i, j]`) so buffers can be uploaded without
//! reordering.

mod cell;

pub use cell::TerrainCell;

use crate::error::{ErosionError, Result};
use serde::{Deserialize, Serialize};

/// Dense `width × length` grid
///
/// Deserialization goes through [`Grid::from_vec`], so a serialized grid
/// with the wrong number of cells is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GridData<T>")]
pub struct Grid<T> {
    width: usize,
    length: usize,
    data: Vec<T>,
}

#[derive(Deserialize)]
struct GridData<T> {
    width: usize,
    length: usize,
    data: Vec<T>,
}

impl<T> TryFrom<GridData<T>> for Grid<T> {
    type Error = ErosionError;

    fn try_from(raw: GridData<T>) -> Result<Self> {
        Self::from_vec(raw.width, raw.length, raw.data)
    }
}

impl<T: Clone> Grid<T> {
    /// Create a grid with every cell set to `fill`
    ///
    /// # Errors
    ///
    /// Returns `EmptyGrid` when either dimension is zero
    pub fn new(width: usize, length: usize, fill: T) -> Result<Self> {
        if width == 0 || length == 0 {
            return Err(ErosionError::EmptyGrid);
        }
        Ok(Self {
            data: vec![fill; width * length],
            width,
            length,
        })
    }

    /// Build a grid from `rows[i][j]`, the host's `heights[i, j]` layout
    ///
    /// # Errors
    ///
    /// - `EmptyGrid` if there are no rows or the first row is empty
    /// - `RaggedGrid` if any row differs in length from the first
    pub fn from_rows<R: AsRef<[T]>>(rows: &[R]) -> Result<Self> {
        let width = rows.len();
        let length = rows.first().map_or(0, |r| r.as_ref().len());
        if width == 0 || length == 0 {
            return Err(ErosionError::EmptyGrid);
        }

        for (row, r) in rows.iter().enumerate() {
            let found = r.as_ref().len();
            if found != length {
                return Err(ErosionError::RaggedGrid {
                    row,
                    expected: length,
                    found,
                });
            }
        }

        let mut data = Vec::with_capacity(width * length);
        for j in 0..length {
            for r in rows {
                data.push(r.as_ref()[j].clone());
            }
        }

        Ok(Self {
            data,
            width,
            length,
        })
    }

    /// Inverse of [`Grid::from_rows`]
    #[must_use]
    pub fn to_rows(&self) -> Vec<Vec<T>> {
        (0..self.width)
            .map(|i| (0..self.length).map(|j| self.get(i, j).clone()).collect())
            .collect()
    }
}

impl<T> Grid<T> {
    /// Wrap existing flat data
    ///
    /// # Errors
    ///
    /// - `EmptyGrid` when either dimension is zero
    /// - `DataLength` when `data.len() != width * length`
    pub fn from_vec(width: usize, length: usize, data: Vec<T>) -> Result<Self> {
        if width == 0 || length == 0 {
            return Err(ErosionError::EmptyGrid);
        }
        if data.len() != width * length {
            return Err(ErosionError::DataLength {
                expected: width * length,
                found: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            length,
        })
    }

    /// Grid width in cells
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Grid length in cells
    #[inline]
    pub fn length(&self) -> usize {
        self.length
    }

    /// `(width, length)`
    #[inline]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.length)
    }

    /// Total number of cells
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false for a constructed grid, kept for slice parity
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat index of `(i, j)`
    #[inline]
    pub fn index(&self, i: usize, j: usize) -> usize {
        i + j * self.width
    }

    /// Cell at `(i, j)`
    ///
    /// # Panics
    ///
    /// Panics if coordinates are out of bounds
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> &T {
        assert!(
            i < self.width && j < self.length,
            "Coordinates out of bounds"
        );
        &self.data[i + j * self.width]
    }

    /// Mutable cell at `(i, j)`
    ///
    /// # Panics
    ///
    /// Panics if coordinates are out of bounds
    #[inline]
    pub fn get_mut(&mut self, i: usize, j: usize) -> &mut T {
        assert!(
            i < self.width && j < self.length,
            "Coordinates out of bounds"
        );
        &mut self.data[i + j * self.width]
    }

    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// True when both grids have the same width and length
    pub fn same_shape<U>(&self, other: &Grid<U>) -> bool {
        self.width == other.width && self.length == other.length
    }

    /// Grid of the same shape backed by `data`
    pub(crate) fn with_data<U>(&self, data: Vec<U>) -> Grid<U> {
        debug_assert_eq!(data.len(), self.data.len());
        Grid {
            data,
            width: self.width,
            length: self.length,
        }
    }

    /// Transform every cell, keeping the shape
    pub fn map<U, F: FnMut(&T) -> U>(&self, f: F) -> Grid<U> {
        Grid {
            data: self.data.iter().map(f).collect(),
            width: self.width,
            length: self.length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_creation() {
        let grid = Grid::new(10, 20, 0.0_f32).unwrap();
        assert_eq!(grid.width(), 10);
        assert_eq!(grid.length(), 20);
        assert_eq!(grid.len(), 200);
        assert!(grid.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_empty_grid_rejected() {
        assert_eq!(Grid::new(0, 5, 0.0_f32), Err(ErosionError::EmptyGrid));
        let rows: Vec<Vec<f32>> = Vec::new();
        assert_eq!(Grid::from_rows(&rows), Err(ErosionError::EmptyGrid));
        let rows: Vec<Vec<f32>> = vec![Vec::new(), Vec::new()];
        assert_eq!(Grid::from_rows(&rows), Err(ErosionError::EmptyGrid));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let rows = vec![vec![0.0_f32; 4], vec![0.0; 4], vec![0.0; 3]];
        assert_eq!(
            Grid::from_rows(&rows),
            Err(ErosionError::RaggedGrid {
                row: 2,
                expected: 4,
                found: 3
            })
        );
    }

    #[test]
    fn test_from_rows_indexing() {
        // rows[i][j] lands at i + j * width
        let rows = vec![vec![1.0_f32, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
        let grid = Grid::from_rows(&rows).unwrap();
        assert_eq!(grid.width(), 2);
        assert_eq!(grid.length(), 3);
        assert_eq!(*grid.get(1, 2), 6.0);
        assert_eq!(grid.as_slice()[grid.index(1, 2)], 6.0);
        assert_eq!(grid.as_slice(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
        assert_eq!(grid.to_rows(), rows);
    }

    #[test]
    fn test_from_vec_length_check() {
        assert!(Grid::from_vec(2, 2, vec![0_u8; 4]).is_ok());
        assert!(matches!(
            Grid::from_vec(2, 2, vec![0_u8; 5]),
            Err(ErosionError::DataLength {
                expected: 4,
                found: 5
            })
        ));
    }

    #[test]
    fn test_map_keeps_shape() {
        let grid = Grid::new(3, 4, 2_i32).unwrap();
        let doubled = grid.map(|v| v * 2);
        assert!(grid.same_shape(&doubled));
        assert!(doubled.as_slice().iter().all(|&v| v == 4));
    }

    #[test]
    #[should_panic(expected = "Coordinates out of bounds")]
    fn test_grid_bounds_check() {
        let grid = Grid::new(10, 10, 0_u8).unwrap();
        let _ = grid.get(10, 5);
    }

    #[test]
    fn test_serde_rejects_wrong_cell_count() {
        let grid = Grid::from_vec(2, 2, vec![1.0_f32, 2.0, 3.0, 4.0]).unwrap();
        let json = serde_json::to_string(&grid).unwrap();
        let back: Grid<f32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, grid);

        let bad = r#"{"width":2,"length":2,"data":[1.0,2.0,3.0]}"#;
        assert!(serde_json::from_str::<Grid<f32>>(bad).is_err());
    }
}
