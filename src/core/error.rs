//! Error types for sightline

use thiserror::Error;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Voxel error: {0}")]
    Voxel(String),

    #[error("Rebuild failed: {0}")]
    Rebuild(String),
}
