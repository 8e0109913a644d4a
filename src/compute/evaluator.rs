use crate::error::Result;
use crate::propagation::pruning::spreading_loss;
use crate::propagation::{AttenuationParameters, FrequencyBands, PropagationPath};

/// Converts the geometry of a path into an attenuation per band (dB).
///
/// Called once per valid path, from worker threads. Contribution pruning
/// assumes no band is attenuated by less than [`spreading_loss`] over the
/// path length; an evaluator breaking that should run with a zero
/// `maximum_error`.
pub trait AttenuationEvaluator: Send + Sync {
    /// Attenuation of `path`, one value per band of `bands`.
    ///
    /// # Errors
    ///
    /// Implementations report failures as `ComputationError::Evaluator`; the
    /// affected source-receiver pair is then dropped.
    fn attenuation(
        &self,
        path: &PropagationPath,
        parameters: &AttenuationParameters,
        bands: &FrequencyBands,
    ) -> Result<Vec<f64>>;
}

/// Geometric spreading only: `20 log10(length) + 11` dB in every band, plus
/// a fixed loss per reflection and per diffraction edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphericalSpreading {
    /// Loss added per reflection (dB).
    pub reflection_loss: f64,
    /// Loss added per diffraction edge (dB).
    pub diffraction_loss: f64,
}

impl Default for SphericalSpreading {
    fn default() -> Self {
        Self {
            reflection_loss: 1.0,
            diffraction_loss: 10.0,
        }
    }
}

impl AttenuationEvaluator for SphericalSpreading {
    #[allow(clippy::cast_precision_loss)]
    fn attenuation(
        &self,
        path: &PropagationPath,
        _parameters: &AttenuationParameters,
        bands: &FrequencyBands,
    ) -> Result<Vec<f64>> {
        let extra = match path {
            PropagationPath::Direct { .. } => 0.0,
            PropagationPath::Reflected { walls, .. } => self.reflection_loss * walls.len() as f64,
            PropagationPath::Diffracted { edges, .. } => self.diffraction_loss * edges.len() as f64,
        };
        Ok(vec![spreading_loss(path.length()) + extra; bands.len()])
    }
}
