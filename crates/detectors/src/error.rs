//! Detector error types

use std::path::PathBuf;

use contracts::ContractError;
use thiserror::Error;

/// Detector specific error
#[derive(Debug, Error)]
pub enum DetectorError {
    /// Replay file could not be read
    #[error("failed to read replay file '{path}': {source}")]
    ReplayRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Replay file is not a JSON array of landmark packets
    #[error("failed to parse replay file '{path}': {source}")]
    ReplayParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Replay contains the same timestamp twice
    #[error("replay file '{path}' has duplicate timestamp {timestamp}")]
    DuplicateTimestamp { path: PathBuf, timestamp: u64 },

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl From<DetectorError> for ContractError {
    fn from(err: DetectorError) -> Self {
        match err {
            DetectorError::Contract(inner) => inner,
            other => ContractError::initialization("landmark replay", other.to_string()),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, DetectorError>;
