//! Error types for the erosion core
//!
//! Every failure at this layer is a precondition violation (malformed grid,
//! bad settings, mismatched buffers) or a GPU backend problem. Nothing here is
//! retried; callers get the error and the last-good state stays intact.

use thiserror::Error;

/// Errors reported by grid construction, the simulation driver and kernels
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErosionError {
    /// Grid has zero width or zero length
    #[error("grid must have at least one cell")]
    EmptyGrid,

    /// Row-of-columns input where one row differs in length from the first
    #[error("ragged grid: row {row} has {found} cells, expected {expected}")]
    RaggedGrid {
        /// Index of the offending row
        row: usize,
        /// Length of the first row
        expected: usize,
        /// Length of the offending row
        found: usize,
    },

    /// Two grids (or a grid and its backing data) disagree in size
    #[error(
        "dimension mismatch: expected {expected_width}x{expected_length}, \
         got {found_width}x{found_length}"
    )]
    DimensionMismatch {
        /// Expected width in cells
        expected_width: usize,
        /// Expected length in cells
        expected_length: usize,
        /// Actual width in cells
        found_width: usize,
        /// Actual length in cells
        found_length: usize,
    },

    /// Flat data does not fill `width * length` cells
    #[error("data length {found} does not match {expected} cells")]
    DataLength {
        /// `width * length`
        expected: usize,
        /// Actual data length
        found: usize,
    },

    /// A settings field is non-finite or out of range
    #[error("invalid setting '{field}': {reason}")]
    InvalidSettings {
        /// Name of the offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// Classification thresholds are not usable
    #[error("invalid thresholds: {0}")]
    InvalidThresholds(String),

    /// GPU device, buffer or readback failure
    #[error("gpu error: {0}")]
    Gpu(String),
}

impl ErosionError {
    /// Build a `DimensionMismatch` from two `(width, length)` pairs
    pub(crate) fn mismatch(expected: (usize, usize), found: (usize, usize)) -> Self {
        Self::DimensionMismatch {
            expected_width: expected.0,
            expected_length: expected.1,
            found_width: found.0,
            found_length: found.1,
        }
    }

    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidSettings {
            field,
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ErosionError>;
