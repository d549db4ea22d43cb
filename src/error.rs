//! Central error handling for the terrain streaming core.
//!
//! Recoverable conditions (missing tiles, short reads) are absorbed where they
//! occur and degrade to zero-filled samples; only programmer errors and
//! corrupt registry metadata surface as `TerrainError`.

/// Centralized error type for all terrain operations.
#[derive(thiserror::Error, Debug)]
pub enum TerrainError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TerrainError {
    /// Convenience constructors for common error types.
    pub fn invalid_argument<T: ToString>(msg: T) -> Self {
        TerrainError::InvalidArgument(msg.to_string())
    }

    pub fn dataset<T: ToString>(msg: T) -> Self {
        TerrainError::Dataset(msg.to_string())
    }
}

/// Result type alias for terrain operations.
pub type TerrainResult<T> = Result<T, TerrainError>;
