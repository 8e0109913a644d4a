use thiserror::Error;

/// Top-level error type for the noise propagation engine.
#[derive(Debug, Error)]
pub enum NoisePathError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Computation(#[from] ComputationError),
}

/// Errors related to geometric computations.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("degenerate geometry: {0}")]
    Degenerate(String),
}

/// Errors raised while assembling a scene.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("invalid building footprint: {0}")]
    InvalidFootprint(String),

    #[error("invalid wall: {0}")]
    InvalidWall(String),

    #[error("terrain triangulation failed: {0}")]
    Terrain(String),

    #[error("invalid source {id}: {reason}")]
    InvalidSource { id: u64, reason: String },
}

/// Errors related to configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} = {value} is invalid: {reason}")]
    InvalidValue {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("invalid computation scope: {0}")]
    InvalidScope(String),
}

/// Errors raised while running a computation.
#[derive(Debug, Error)]
pub enum ComputationError {
    #[error("attenuation evaluator failed: {0}")]
    Evaluator(String),

    #[error("result sink failed: {0}")]
    Sink(String),

    #[error("worker pool could not be built: {0}")]
    WorkerPool(String),
}

/// Convenience type alias for results using [`NoisePathError`].
pub type Result<T> = std::result::Result<T, NoisePathError>;
