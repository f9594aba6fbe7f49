//! Wire protocol errors

use contracts::ContractError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Handshake values unusable
    #[error("invalid handshake: {message}")]
    Handshake { message: String },

    /// Frame payload above the configured limit
    #[error("frame of {len} bytes exceeds limit of {max} bytes")]
    FrameTooLarge { len: usize, max: usize },

    /// Frame handed to the client has the wrong size
    #[error("frame has {actual} bytes, session expects {expected}")]
    FrameSize { expected: usize, actual: usize },

    /// Peer closed the connection inside a frame
    #[error("connection closed after {received} of {expected} frame bytes")]
    Truncated { expected: usize, received: usize },

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error(transparent)]
    Detector(#[from] detectors::DetectorError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    pub fn handshake(message: impl Into<String>) -> Self {
        Self::Handshake {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
