//! Simulation and shaping configuration
//!
//! All settings are plain serde structs with `Default` impls. They are
//! immutable for the duration of a run; the driver validates them before
//! handing them to a kernel.

use crate::error::{ErosionError, Result};
use serde::{Deserialize, Serialize};

fn check_non_negative(field: &'static str, value: f32) -> Result<()> {
    if !value.is_finite() {
        return Err(ErosionError::invalid(field, format!("must be finite, got {value}")));
    }
    if value < 0.0 {
        return Err(ErosionError::invalid(
            field,
            format!("must be non-negative, got {value}"),
        ));
    }
    Ok(())
}

fn check_range(field: &'static str, value: f32, min: f32, max: f32) -> Result<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(ErosionError::invalid(
            field,
            format!("must be in [{min}, {max}], got {value}"),
        ));
    }
    Ok(())
}

/// Per-run rain and water parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErosionSettings {
    /// Rain added per second of simulated time (meters/second)
    pub rain_rate: f32,
    /// Simulated seconds covered by one step
    pub step_duration: f32,
    /// Water removed from every cell per second (evaporation + infiltration)
    pub water_loss_per_second: f32,
    /// Water shallower than this is hidden in the water surface
    pub min_water_depth_display: f32,
}

impl Default for ErosionSettings {
    fn default() -> Self {
        Self {
            rain_rate: 0.001,
            step_duration: 1.0,
            water_loss_per_second: 0.0002,
            min_water_depth_display: 0.001,
        }
    }
}

impl ErosionSettings {
    /// Rain deposited on each cell in one step
    #[inline]
    pub fn rain_per_step(&self) -> f32 {
        self.rain_rate * self.step_duration
    }

    /// Water lost from each cell in one step
    #[inline]
    pub fn loss_per_step(&self) -> f32 {
        self.water_loss_per_second * self.step_duration
    }

    /// # Errors
    ///
    /// `InvalidSettings` if any field is non-finite or negative
    pub fn validate(&self) -> Result<()> {
        check_non_negative("rain_rate", self.rain_rate)?;
        check_non_negative("step_duration", self.step_duration)?;
        check_non_negative("water_loss_per_second", self.water_loss_per_second)?;
        check_non_negative("min_water_depth_display", self.min_water_depth_display)
    }
}

/// Watershed kernel parameters that are fixed for a kernel instance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatershedParams {
    /// World distance between adjacent samples (terrain size / heightmap width)
    pub cell_width: f32,
    /// Fraction of the surface difference moved toward a lower neighbour per step (0-1)
    pub flow_rate: f32,
    /// Elevation carried along per unit of water moved
    pub erosion_rate: f32,
}

impl Default for WatershedParams {
    fn default() -> Self {
        Self {
            cell_width: 1.0,
            flow_rate: 0.5,
            erosion_rate: 0.01,
        }
    }
}

impl WatershedParams {
    /// # Errors
    ///
    /// `InvalidSettings` if `cell_width` is not positive, `flow_rate` leaves
    /// `[0, 1]` or `erosion_rate` is negative
    pub fn validate(&self) -> Result<()> {
        if !self.cell_width.is_finite() || self.cell_width <= 0.0 {
            return Err(ErosionError::invalid(
                "cell_width",
                format!("must be finite and positive, got {}", self.cell_width),
            ));
        }
        check_range("flow_rate", self.flow_rate, 0.0, 1.0)?;
        check_non_negative("erosion_rate", self.erosion_rate)
    }
}

/// One layer of gradient noise used when shaping a heightmap
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseLayer {
    /// Offset added to the sample coordinates
    pub offset: f32,
    /// Features per heightmap width (0-20)
    pub frequency: f32,
    /// Contribution to the summed noise (0-1)
    pub amplitude: f32,
}

impl Default for NoiseLayer {
    fn default() -> Self {
        Self {
            offset: 0.0,
            frequency: 4.0,
            amplitude: 0.5,
        }
    }
}

/// Circular region pulled toward a fixed elevation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlatArea {
    /// Center in normalized `(u, v)` coordinates
    pub center: [f32; 2],
    /// Radius in normalized units (0 disables the area)
    pub size: f32,
    /// Target elevation (0-1)
    pub elevation: f32,
    /// Blend strength at the center (0-1)
    pub weight: f32,
}

impl Default for FlatArea {
    fn default() -> Self {
        Self {
            center: [0.5, 0.5],
            size: 0.0,
            elevation: 0.3,
            weight: 1.0,
        }
    }
}

/// Heightmap shaping parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapingSettings {
    /// Seed for the noise permutation
    pub seed: u64,
    /// Constant added after the contrast curve (-1 to 1)
    pub elevate: f32,
    /// Noise value mapped to mid elevation (0-1)
    pub inflection_point: f32,
    /// Contrast of the logistic curve (0-100)
    pub steepness: f32,
    pub noise1: NoiseLayer,
    pub noise2: NoiseLayer,
    pub flat_area: FlatArea,
}

impl Default for ShapingSettings {
    fn default() -> Self {
        Self {
            seed: 42,
            elevate: 0.0,
            inflection_point: 0.5,
            steepness: 10.0,
            noise1: NoiseLayer::default(),
            noise2: NoiseLayer {
                offset: 17.0,
                frequency: 12.0,
                amplitude: 0.15,
            },
            flat_area: FlatArea::default(),
        }
    }
}

impl ShapingSettings {
    /// # Errors
    ///
    /// `InvalidSettings` when a field leaves its documented range
    pub fn validate(&self) -> Result<()> {
        check_range("elevate", self.elevate, -1.0, 1.0)?;
        check_range("inflection_point", self.inflection_point, 0.0, 1.0)?;
        check_range("steepness", self.steepness, 0.0, 100.0)?;
        for layer in [&self.noise1, &self.noise2] {
            if !layer.offset.is_finite() {
                return Err(ErosionError::invalid("noise.offset", "must be finite"));
            }
            check_range("noise.frequency", layer.frequency, 0.0, 20.0)?;
            check_range("noise.amplitude", layer.amplitude, 0.0, 1.0)?;
        }
        let flat = &self.flat_area;
        check_range("flat_area.center.u", flat.center[0], 0.0, 1.0)?;
        check_range("flat_area.center.v", flat.center[1], 0.0, 1.0)?;
        check_range("flat_area.size", flat.size, 0.0, 1.0)?;
        check_range("flat_area.elevation", flat.elevation, 0.0, 1.0)?;
        check_range("flat_area.weight", flat.weight, 0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ErosionSettings::default().validate().is_ok());
        assert!(WatershedParams::default().validate().is_ok());
        assert!(ShapingSettings::default().validate().is_ok());
    }

    #[test]
    fn test_per_step_amounts() {
        let settings = ErosionSettings {
            rain_rate: 0.01,
            step_duration: 0.5,
            water_loss_per_second: 0.002,
            min_water_depth_display: 0.0,
        };
        assert!((settings.rain_per_step() - 0.005).abs() < 1e-7);
        assert!((settings.loss_per_step() - 0.001).abs() < 1e-7);
    }

    #[test]
    fn test_invalid_erosion_settings() {
        let negative = ErosionSettings {
            rain_rate: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            negative.validate(),
            Err(ErosionError::InvalidSettings {
                field: "rain_rate",
                ..
            })
        ));

        let nan = ErosionSettings {
            step_duration: f32::NAN,
            ..Default::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_invalid_watershed_params() {
        let zero_width = WatershedParams {
            cell_width: 0.0,
            ..Default::default()
        };
        assert!(zero_width.validate().is_err());

        let too_fast = WatershedParams {
            flow_rate: 1.5,
            ..Default::default()
        };
        assert!(too_fast.validate().is_err());
    }

    #[test]
    fn test_invalid_shaping_settings() {
        let steep = ShapingSettings {
            steepness: 101.0,
            ..Default::default()
        };
        assert!(steep.validate().is_err());

        let mut far = ShapingSettings::default();
        far.flat_area.center = [1.5, 0.5];
        assert!(far.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: ErosionSettings = serde_json::from_str(r#"{"rain_rate": 0.5}"#).unwrap();
        assert_eq!(settings.rain_rate, 0.5);
        assert_eq!(settings.step_duration, ErosionSettings::default().step_duration);
    }
}
