use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Nominal octave band centre frequencies (Hz).
const OCTAVE_CENTERS: [f64; 8] = [63.0, 125.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0];

/// Nominal third-octave band centre frequencies (Hz).
const THIRD_OCTAVE_CENTERS: [f64; 24] = [
    50.0, 63.0, 80.0, 100.0, 125.0, 160.0, 200.0, 250.0, 315.0, 400.0, 500.0, 630.0, 800.0,
    1000.0, 1250.0, 1600.0, 2000.0, 2500.0, 3150.0, 4000.0, 5000.0, 6300.0, 8000.0, 10000.0,
];

/// Reporting period of a noise indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimePeriod {
    Day,
    Evening,
    Night,
}

/// Ordered set of frequency bands, identified by their centre frequency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrequencyBands {
    centers: Vec<f64>,
}

impl FrequencyBands {
    /// The eight octave bands from 63 Hz to 8 kHz.
    #[must_use]
    pub fn octave() -> Self {
        Self {
            centers: OCTAVE_CENTERS.to_vec(),
        }
    }

    /// The 24 third-octave bands from 50 Hz to 10 kHz.
    #[must_use]
    pub fn third_octave() -> Self {
        Self {
            centers: THIRD_OCTAVE_CENTERS.to_vec(),
        }
    }

    /// Arbitrary bands.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidScope` unless the centres are non-empty,
    /// positive and strictly increasing.
    pub fn custom(centers: Vec<f64>) -> Result<Self> {
        let bands = Self { centers };
        bands.validate()?;
        Ok(bands)
    }

    /// Band centre frequencies (Hz).
    #[must_use]
    pub fn centers(&self) -> &[f64] {
        &self.centers
    }

    /// Number of bands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.centers.len()
    }

    /// Returns `true` if no band is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    /// Checks that the bands are usable.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidScope` for empty, non-positive or
    /// unordered centres.
    pub fn validate(&self) -> Result<()> {
        if self.centers.is_empty() {
            return Err(ConfigError::InvalidScope("no frequency band configured".into()).into());
        }
        if self.centers.iter().any(|f| !f.is_finite() || *f <= 0.0) {
            return Err(ConfigError::InvalidScope("band centres must be positive".into()).into());
        }
        if self.centers.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ConfigError::InvalidScope("band centres must be strictly increasing".into()).into());
        }
        Ok(())
    }
}

impl Default for FrequencyBands {
    fn default() -> Self {
        Self::octave()
    }
}

/// What to compute: which bands and which periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputationScope {
    /// Frequency bands of every spectrum.
    pub bands: FrequencyBands,
    /// Periods for which levels are produced.
    pub periods: Vec<TimePeriod>,
}

impl Default for ComputationScope {
    fn default() -> Self {
        Self {
            bands: FrequencyBands::octave(),
            periods: vec![TimePeriod::Day, TimePeriod::Evening, TimePeriod::Night],
        }
    }
}

impl ComputationScope {
    /// Checks bands and periods.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidScope` for invalid bands, an empty period
    /// list or a repeated period.
    pub fn validate(&self) -> Result<()> {
        self.bands.validate()?;
        if self.periods.is_empty() {
            return Err(ConfigError::InvalidScope("no time period configured".into()).into());
        }
        let mut seen = self.periods.clone();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() != self.periods.len() {
            return Err(ConfigError::InvalidScope("time periods must be unique".into()).into());
        }
        Ok(())
    }
}

/// Atmospheric and ground parameters handed to the attenuation evaluator.
///
/// The propagation engine never interprets these values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttenuationParameters {
    /// Air temperature (°C).
    pub temperature: f64,
    /// Relative humidity (%).
    pub humidity: f64,
    /// Atmospheric pressure (Pa).
    pub pressure: f64,
    /// Ground absorption factor `G` in `[0, 1]`.
    pub ground_factor: f64,
}

impl Default for AttenuationParameters {
    fn default() -> Self {
        Self {
            temperature: 15.0,
            humidity: 70.0,
            pressure: 101_325.0,
            ground_factor: 0.0,
        }
    }
}

/// Parameters controlling the path search and the grid run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationConfig {
    /// Sources farther than this from a receiver (m) are ignored, and no
    /// path longer than this is produced.
    pub maximum_propagation_distance: f64,
    /// Walls farther than this from the receiver (m) are not used for
    /// reflections.
    pub maximum_reflection_distance: f64,
    /// Maximum number of reflections along one path.
    pub maximum_reflection_order: usize,
    /// Search paths around vertical edges.
    pub compute_horizontal_diffraction: bool,
    /// Search paths over obstacles.
    pub compute_vertical_diffraction: bool,
    /// Remaining sources are skipped once they can no longer raise the
    /// receiver level by this many dB. Zero disables the pruning.
    pub maximum_error: f64,
    /// The receiver envelope is split into `grid_dim` x `grid_dim` cells.
    pub grid_dim: usize,
    /// Worker threads; `None` uses the available parallelism.
    pub threads: Option<usize>,
    /// Minimum piece length (m) when splitting line sources.
    pub line_source_step: f64,
    /// Bands and periods to compute.
    pub scope: ComputationScope,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            maximum_propagation_distance: 750.0,
            maximum_reflection_distance: 50.0,
            maximum_reflection_order: 1,
            compute_horizontal_diffraction: true,
            compute_vertical_diffraction: true,
            maximum_error: 0.1,
            grid_dim: 4,
            threads: None,
            line_source_step: 1.0,
            scope: ComputationScope::default(),
        }
    }
}

impl PropagationConfig {
    /// Checks every value.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for the first out-of-range value,
    /// or `ConfigError::InvalidScope` for an invalid scope.
    pub fn validate(&self) -> Result<()> {
        positive("maximum_propagation_distance", self.maximum_propagation_distance)?;
        if !(self.maximum_reflection_distance >= 0.0) {
            return Err(invalid(
                "maximum_reflection_distance",
                self.maximum_reflection_distance,
                "must be zero or positive",
            ));
        }
        if !(self.maximum_error >= 0.0) || !self.maximum_error.is_finite() {
            return Err(invalid("maximum_error", self.maximum_error, "must be a finite non-negative dB value"));
        }
        if self.grid_dim == 0 {
            return Err(invalid("grid_dim", 0.0, "must be at least 1"));
        }
        if self.threads == Some(0) {
            return Err(invalid("threads", 0.0, "must be at least 1"));
        }
        positive("line_source_step", self.line_source_step)?;
        self.scope.validate()
    }

    /// Effective distance limit for reflecting walls.
    #[must_use]
    pub fn reflection_distance_limit(&self) -> f64 {
        self.maximum_reflection_distance.min(self.maximum_propagation_distance)
    }

    /// Returns `true` if any diffraction kind is enabled.
    #[must_use]
    pub fn computes_diffraction(&self) -> bool {
        self.compute_horizontal_diffraction || self.compute_vertical_diffraction
    }
}

fn positive(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(name, value, "must be a finite positive number"))
    }
}

#[allow(clippy::needless_pass_by_value)]
fn invalid(name: &'static str, value: f64, reason: &'static str) -> crate::error::NoisePathError {
    ConfigError::InvalidValue { name, value, reason }.into()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        PropagationConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_non_positive_distance() {
        let config = PropagationConfig {
            maximum_propagation_distance: 0.0,
            ..PropagationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_negative_or_nan_reflection_distance() {
        for distance in [-1.0, f64::NAN] {
            let config = PropagationConfig {
                maximum_reflection_distance: distance,
                ..PropagationConfig::default()
            };
            assert!(config.validate().is_err());
        }
        let config = PropagationConfig {
            maximum_reflection_distance: 0.0,
            ..PropagationConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_grid() {
        let config = PropagationConfig {
            grid_dim: 0,
            ..PropagationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_periods() {
        let mut config = PropagationConfig::default();
        config.scope.periods = vec![TimePeriod::Night, TimePeriod::Night];
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unordered_bands() {
        assert!(FrequencyBands::custom(vec![500.0, 250.0]).is_err());
        assert!(FrequencyBands::custom(vec![]).is_err());
        assert_eq!(FrequencyBands::custom(vec![125.0, 250.0]).unwrap().len(), 2);
    }

    #[test]
    fn reflection_limit_never_exceeds_propagation() {
        let config = PropagationConfig {
            maximum_propagation_distance: 30.0,
            maximum_reflection_distance: 50.0,
            ..PropagationConfig::default()
        };
        assert!((config.reflection_distance_limit() - 30.0).abs() < 1e-12);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: PropagationConfig = serde_json::from_str(
            r#"{
                "maximum_reflection_order": 2,
                "compute_horizontal_diffraction": false,
                "scope": { "periods": ["Night"] }
            }"#,
        )
        .unwrap();
        assert_eq!(config.maximum_reflection_order, 2);
        assert!(!config.compute_horizontal_diffraction);
        assert!(config.compute_vertical_diffraction);
        assert_eq!(config.scope.periods, vec![TimePeriod::Night]);
        assert_eq!(config.scope.bands, FrequencyBands::octave());
        config.validate().unwrap();
    }

    #[test]
    fn third_octave_has_24_bands() {
        let bands = FrequencyBands::third_octave();
        assert_eq!(bands.len(), 24);
        bands.validate().unwrap();
    }
}
