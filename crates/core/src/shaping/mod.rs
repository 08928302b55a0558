//! Heightmap shaping
//!
//! Builds (or reshapes) a normalized heightmap from two layers of gradient
//! noise, a logistic contrast curve and an optional flattened area:
//!
//! ```text
//! n = base + Σ amplitude · noise(frequency · u + offset, frequency · v + offset)
//! h = logistic(steepness · (n + 0.5 − inflection)) + elevate
//! h = lerp(h, flat.elevation, flat.weight · smoothstep(1 − d / flat.size))   (d < flat.size)
//! h = clamp(h, 0, 1)
//! ```
//!
//! `u` and `v` are the sample coordinates normalized to `[0, 1]`.

mod noise;

pub use noise::NoiseGenerator;

use crate::error::Result;
use crate::grid::Grid;
use crate::settings::{FlatArea, NoiseLayer, ShapingSettings};
use noise::lerp;
use rayon::prelude::*;
use tracing::debug;

#[inline]
fn logistic(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[inline]
fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[inline]
fn normalized(index: usize, count: usize) -> f32 {
    if count > 1 {
        index as f32 / (count - 1) as f32
    } else {
        0.0
    }
}

fn layer_sample(noise: &NoiseGenerator, layer: &NoiseLayer, u: f32, v: f32) -> f32 {
    layer.amplitude
        * noise.sample(
            layer.frequency * u + layer.offset,
            layer.frequency * v + layer.offset,
        )
}

fn flatten(h: f32, flat: &FlatArea, u: f32, v: f32) -> f32 {
    if flat.size <= 0.0 {
        return h;
    }
    let du = u - flat.center[0];
    let dv = v - flat.center[1];
    let d = (du * du + dv * dv).sqrt();
    if d >= flat.size {
        return h;
    }
    lerp(h, flat.elevation, flat.weight * smoothstep(1.0 - d / flat.size))
}

/// Shape one sample given its pre-existing noise base
fn shape_sample(
    base: f32,
    noise: &NoiseGenerator,
    settings: &ShapingSettings,
    u: f32,
    v: f32,
) -> f32 {
    let n = base
        + layer_sample(noise, &settings.noise1, u, v)
        + layer_sample(noise, &settings.noise2, u, v);
    let h = logistic(settings.steepness * (n + 0.5 - settings.inflection_point)) + settings.elevate;
    flatten(h, &settings.flat_area, u, v).clamp(0.0, 1.0)
}

fn shape_into(heights: &mut Grid<f32>, settings: &ShapingSettings, centered: bool) {
    let (width, length) = heights.dimensions();
    let noise = NoiseGenerator::new(settings.seed);

    // Index is i + j * width, so each chunk of `width` is one value of j
    heights
        .as_mut_slice()
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(j, row)| {
            let v = normalized(j, length);
            for (i, h) in row.iter_mut().enumerate() {
                let u = normalized(i, width);
                // Existing heights are centered on 0.5 so a mid-grey map is neutral
                let base = if centered { *h - 0.5 } else { 0.0 };
                *h = shape_sample(base, &noise, settings, u, v);
            }
        });
}

/// Generate a fresh `width × length` heightmap
///
/// # Errors
///
/// - `EmptyGrid` when either dimension is zero
/// - `InvalidSettings` when the shaping settings are out of range
pub fn shape_heights(width: usize, length: usize, settings: &ShapingSettings) -> Result<Grid<f32>> {
    settings.validate()?;
    let mut heights = Grid::new(width, length, 0.0_f32)?;
    shape_into(&mut heights, settings, false);
    debug!(width, length, seed = settings.seed, "Shaped new heightmap");
    Ok(heights)
}

/// Reshape an existing heightmap, using its values as the noise base
///
/// # Errors
///
/// `InvalidSettings` when the shaping settings are out of range
pub fn shape_in_place(heights: &mut Grid<f32>, settings: &ShapingSettings) -> Result<()> {
    settings.validate()?;
    shape_into(heights, settings, true);
    debug!(
        width = heights.width(),
        length = heights.length(),
        seed = settings.seed,
        "Reshaped heightmap"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErosionError;
    use approx::assert_relative_eq;

    fn quiet_settings() -> ShapingSettings {
        let silent = NoiseLayer {
            offset: 0.0,
            frequency: 0.0,
            amplitude: 0.0,
        };
        ShapingSettings {
            noise1: silent,
            noise2: silent,
            ..Default::default()
        }
    }

    #[test]
    fn test_shaped_heights_in_unit_range() {
        let heights = shape_heights(64, 48, &ShapingSettings::default()).unwrap();
        assert_eq!(heights.dimensions(), (64, 48));
        assert!(heights.as_slice().iter().all(|h| (0.0..=1.0).contains(h)));
        let min = heights.as_slice().iter().copied().fold(f32::MAX, f32::min);
        let max = heights.as_slice().iter().copied().fold(f32::MIN, f32::max);
        assert!(max - min > 0.05, "noise should produce relief");
    }

    #[test]
    fn test_silent_noise_sits_on_inflection() {
        // n = 0, inflection 0.5 → logistic(0) = 0.5
        let heights = shape_heights(8, 8, &quiet_settings()).unwrap();
        for &h in heights.as_slice() {
            assert_relative_eq!(h, 0.5, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_elevate_shifts_and_clamps() {
        let mut settings = quiet_settings();
        settings.elevate = 0.25;
        let heights = shape_heights(4, 4, &settings).unwrap();
        assert_relative_eq!(*heights.get(2, 2), 0.75, epsilon = 1e-6);

        settings.elevate = 1.0;
        let heights = shape_heights(4, 4, &settings).unwrap();
        assert!(heights.as_slice().iter().all(|&h| h == 1.0));
    }

    #[test]
    fn test_flat_area_pulls_center() {
        let mut settings = quiet_settings();
        settings.flat_area = FlatArea {
            center: [0.5, 0.5],
            size: 0.3,
            elevation: 0.1,
            weight: 1.0,
        };
        let heights = shape_heights(11, 11, &settings).unwrap();
        // Center sample sits exactly on (0.5, 0.5)
        assert_relative_eq!(*heights.get(5, 5), 0.1, epsilon = 1e-6);
        // Corners are outside the radius
        assert_relative_eq!(*heights.get(0, 0), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_shape_is_deterministic() {
        let a = shape_heights(32, 32, &ShapingSettings::default()).unwrap();
        let b = shape_heights(32, 32, &ShapingSettings::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_shape_in_place_uses_existing_base() {
        let settings = quiet_settings();
        let mut heights = Grid::new(4, 4, 0.5_f32).unwrap();
        shape_in_place(&mut heights, &settings).unwrap();
        assert_relative_eq!(*heights.get(1, 1), 0.5, epsilon = 1e-6);

        let mut raised = Grid::new(4, 4, 0.6_f32).unwrap();
        shape_in_place(&mut raised, &settings).unwrap();
        assert!(*raised.get(1, 1) > 0.5);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut settings = ShapingSettings::default();
        settings.inflection_point = 2.0;
        assert!(matches!(
            shape_heights(4, 4, &settings),
            Err(ErosionError::InvalidSettings { .. })
        ));
        assert_eq!(
            shape_heights(0, 4, &ShapingSettings::default()),
            Err(ErosionError::EmptyGrid)
        );
    }
}
