//! Error types for scenelink core

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Animation duration must be finite and positive
    #[error("invalid animation duration: {0}")]
    InvalidDuration(f64),
}
