pub mod compute;
pub mod error;
pub mod math;
pub mod propagation;
pub mod scene;

pub use error::{NoisePathError, Result};
