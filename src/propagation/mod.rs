pub mod config;
pub mod diffraction;
pub mod mirror_receivers;
pub mod obstruction;
pub mod path;
pub mod process;
pub mod profile;
pub mod pruning;
pub mod reflection;

pub use config::{AttenuationParameters, ComputationScope, FrequencyBands, PropagationConfig, TimePeriod};
pub use diffraction::BuildDiffractionPaths;
pub use mirror_receivers::{reflection_candidates, GenerateMirrorReceivers, MirrorReceiverArena, MirrorReceiverResult};
pub use obstruction::ObstructionTester;
pub use path::{DiffractionKind, PropagationPath};
pub use process::PropagationProcess;
pub use profile::{BuildProfile, Profile, ProfileSample};
pub use pruning::ContributionPruner;
pub use reflection::ValidateReflections;
