//! Error types for CLI operations.

use std::path::PathBuf;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    /// Input directory missing or unreadable
    #[error("Input directory not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    /// Input directory holds no supported images
    #[error("No png/jpg/bmp frames in {}", path.display())]
    EmptyInput { path: PathBuf },

    /// Frame could not be decoded
    #[error("Failed to decode {}: {message}", path.display())]
    ImageDecode { path: PathBuf, message: String },

    /// Frame size differs from the first frame of the sequence
    #[error("{} is {actual:?}, sequence is {expected:?}", path.display())]
    FrameSizeMismatch {
        path: PathBuf,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn image_decode(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ImageDecode {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
