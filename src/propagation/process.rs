use tracing::trace;

use crate::error::Result;
use crate::math::Point3;
use crate::scene::Scene;

use super::config::PropagationConfig;
use super::diffraction::BuildDiffractionPaths;
use super::mirror_receivers::GenerateMirrorReceivers;
use super::obstruction::ObstructionTester;
use super::path::PropagationPath;
use super::profile::BuildProfile;
use super::reflection::ValidateReflections;

/// Finds every valid path between one source point and one receiver.
#[derive(Debug, Clone, Copy)]
pub struct PropagationProcess<'a> {
    scene: &'a Scene,
    config: &'a PropagationConfig,
}

impl<'a> PropagationProcess<'a> {
    #[must_use]
    pub fn new(scene: &'a Scene, config: &'a PropagationConfig) -> Self {
        Self { scene, config }
    }

    /// Direct path if the line of sight is clear, reflections up to the
    /// configured order, and diffraction paths if the line of sight is
    /// blocked.
    ///
    /// An empty list is a normal outcome: the pair is too far apart, one end
    /// is enclosed in a building or under the ground, or nothing reaches.
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::Degenerate` when source and receiver coincide.
    pub fn run(&self, source: &Point3, receiver: &Point3) -> Result<Vec<PropagationPath>> {
        let config = self.config;
        let max_length = config.maximum_propagation_distance;
        let profile = BuildProfile::new(*source, *receiver).execute(self.scene)?;
        if (receiver - source).norm() > max_length || profile.has_enclosed_endpoint() {
            return Ok(Vec::new());
        }

        let tester = ObstructionTester::new(self.scene);
        let mut paths = Vec::new();

        let line_of_sight = tester.is_free_field(source, receiver, &[]);
        if line_of_sight {
            paths.push(PropagationPath::direct(*source, *receiver));
        }

        if config.maximum_reflection_order > 0 {
            let arena = GenerateMirrorReceivers::new(
                *source,
                *receiver,
                config.maximum_reflection_order,
                config.reflection_distance_limit(),
                max_length,
            )
            .execute(self.scene);
            paths.extend(ValidateReflections::new(*source, *receiver, &arena, max_length).execute(self.scene));
        }

        if !line_of_sight && config.computes_diffraction() {
            paths.extend(
                BuildDiffractionPaths::new(
                    &profile,
                    config.compute_vertical_diffraction,
                    config.compute_horizontal_diffraction,
                    max_length,
                )
                .execute(self.scene),
            );
        }

        trace!(
            direct = line_of_sight,
            paths = paths.len(),
            "propagation paths"
        );
        Ok(paths)
    }
}
