//! Aligner error types

use contracts::ContractError;
use thiserror::Error;

/// Aligner-specific errors
#[derive(Debug, Error)]
pub enum AlignerError {
    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Sink write error (from contract)
    #[error("sink error: {0}")]
    Contract(#[from] ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AlignerError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl From<AlignerError> for ContractError {
    fn from(err: AlignerError) -> Self {
        match err {
            AlignerError::SinkCreation { name, message } => {
                ContractError::sink_creation(name, message)
            }
            AlignerError::Contract(inner) => inner,
            AlignerError::Io(e) => ContractError::Io(e),
        }
    }
}
