//! Elevation band classification for texture blending
//!
//! Maps a normalized elevation to five overlapping band weights. Band `i`
//! covers `[thresholds[i-1], thresholds[i]]` (band 0 starts at 0) and ramps
//! linearly to zero across `overlap` on either side.
//!
//! Weights are *not* normalized: where two bands' ramps meet, both can be
//! non-zero and their sum can exceed or fall short of 1. Callers that need a
//! partition of unity should run [`normalize_weights`] on the result.

use crate::error::{ErosionError, Result};
use crate::grid::Grid;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Number of texture bands
pub const BAND_COUNT: usize = 5;

/// Per-cell band weights, one grid entry per heightmap sample
pub type AlphaMap = Grid<[f32; BAND_COUNT]>;

/// Weight of band `band_index` at elevation `h`
///
/// # Arguments
///
/// * `h` - Elevation
/// * `band_index` - Band to evaluate (0-based)
/// * `thresholds` - Ascending band upper bounds
/// * `overlap` - Blend margin on either side of a band
///
/// # Returns
///
/// Weight in `[0, 1]`. With `overlap == 0` this is 1 inside
/// `[lower, upper]` and 0 elsewhere.
///
/// # Panics
///
/// Panics if `band_index >= thresholds.len()`
///
/// A NaN height fails every comparison and falls through to full weight
/// in every band.
#[must_use]
pub fn weight(h: f32, band_index: usize, thresholds: &[f32], overlap: f32) -> f32 {
    let upper = thresholds[band_index];
    let lower = if band_index > 0 {
        thresholds[band_index - 1]
    } else {
        0.0
    };

    if h < lower - overlap {
        return 0.0;
    }
    if h < lower {
        return 1.0 - (lower - h) / overlap;
    }

    if h > upper + overlap {
        return 0.0;
    }
    if h > upper {
        return 1.0 - (h - upper) / overlap;
    }

    1.0
}

/// Scale weights so they sum to 1 (all-zero input stays zero)
#[must_use]
pub fn normalize_weights(weights: [f32; BAND_COUNT]) -> [f32; BAND_COUNT] {
    let sum: f32 = weights.iter().sum();
    if sum <= 0.0 {
        return weights;
    }
    weights.map(|w| w / sum)
}

/// Validated band thresholds and blend overlap
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ThresholdsRaw", into = "ThresholdsRaw")]
pub struct Thresholds {
    bounds: [f32; BAND_COUNT],
    overlap: f32,
}

#[derive(Serialize, Deserialize)]
struct ThresholdsRaw {
    bounds: [f32; BAND_COUNT],
    overlap: f32,
}

impl TryFrom<ThresholdsRaw> for Thresholds {
    type Error = ErosionError;

    fn try_from(raw: ThresholdsRaw) -> Result<Self> {
        Self::new(raw.bounds, raw.overlap)
    }
}

impl From<Thresholds> for ThresholdsRaw {
    fn from(t: Thresholds) -> Self {
        Self {
            bounds: t.bounds,
            overlap: t.overlap,
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            bounds: [0.1, 0.3, 0.5, 0.7, 1.0],
            overlap: 0.05,
        }
    }
}

impl Thresholds {
    /// # Errors
    ///
    /// `InvalidThresholds` when the bounds are not strictly increasing, leave
    /// `[0, 1]`, or the overlap is negative, non-finite, or wider than half
    /// of the narrowest band
    pub fn new(bounds: [f32; BAND_COUNT], overlap: f32) -> Result<Self> {
        let mut previous = 0.0_f32;
        let mut narrowest = f32::INFINITY;
        for (i, &bound) in bounds.iter().enumerate() {
            if !(0.0..=1.0).contains(&bound) {
                return Err(ErosionError::InvalidThresholds(format!(
                    "bound {i} = {bound} is outside [0, 1]"
                )));
            }
            if i > 0 && bound <= previous {
                return Err(ErosionError::InvalidThresholds(format!(
                    "bound {i} = {bound} does not exceed bound {} = {previous}",
                    i - 1
                )));
            }
            narrowest = narrowest.min(bound - previous);
            previous = bound;
        }

        if !overlap.is_finite() || overlap < 0.0 {
            return Err(ErosionError::InvalidThresholds(format!(
                "overlap must be finite and non-negative, got {overlap}"
            )));
        }
        if overlap > narrowest / 2.0 {
            return Err(ErosionError::InvalidThresholds(format!(
                "overlap {overlap} exceeds half of the narrowest band ({narrowest})"
            )));
        }

        Ok(Self { bounds, overlap })
    }

    pub fn bounds(&self) -> &[f32; BAND_COUNT] {
        &self.bounds
    }

    pub fn overlap(&self) -> f32 {
        self.overlap
    }

    /// Weight of one band at `h`, see [`weight`]
    #[inline]
    pub fn weight(&self, h: f32, band_index: usize) -> f32 {
        weight(h, band_index, &self.bounds, self.overlap)
    }

    /// All band weights at `h`
    pub fn weights(&self, h: f32) -> [f32; BAND_COUNT] {
        std::array::from_fn(|band| self.weight(h, band))
    }
}

/// Compute band weights for every heightmap sample
pub fn paint_alpha_map(heights: &Grid<f32>, thresholds: &Thresholds) -> AlphaMap {
    let data: Vec<[f32; BAND_COUNT]> = heights
        .as_slice()
        .par_iter()
        .map(|&h| thresholds.weights(h))
        .collect();

    heights.with_data(data)
}
