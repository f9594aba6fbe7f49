//! Layered error definitions
//!
//! Categorized by source: config / detector / crop / sink

use thiserror::Error;

use crate::Eye;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Detector Errors =====
    /// Detector session failed to start or load
    #[error("initialization of '{component}' failed: {message}")]
    Initialization { component: String, message: String },

    /// Frame could not be handed to the landmark detector
    #[error("failed to submit frame {frame_index} to detector: {message}")]
    DetectorSubmit { frame_index: u64, message: String },

    /// Detector did not drain cleanly on shutdown
    #[error("detector shutdown failed: {message}")]
    DetectorShutdown { message: String },

    /// Operation called in the wrong lifecycle state
    #[error("{component} is {state}, cannot {operation}")]
    InvalidState {
        component: String,
        state: String,
        operation: String,
    },

    /// Landmark packet does not follow the fixed iris layout
    #[error("landmark layout error at timestamp {timestamp}: {message}")]
    LandmarkLayout { timestamp: u64, message: String },

    // ===== Frame / Crop Errors =====
    /// Pixel buffer does not match its declared dimensions
    #[error("invalid frame: {message}")]
    InvalidFrame { message: String },

    /// Clamped crop does not fit the destination canvas
    #[error("{eye} eye crop {crop_width}x{crop_height} overflows canvas of side {canvas_side}")]
    CropOverflow {
        eye: Eye,
        crop_width: u32,
        crop_height: u32,
        canvas_side: u32,
    },

    /// Crop rectangle lies entirely outside the frame
    #[error("{eye} eye crop lies outside the frame")]
    CropOutOfFrame { eye: Eye },

    // ===== Sink Errors =====
    /// Sink could not open its output
    #[error("failed to create sink '{sink_name}': {message}")]
    SinkCreation { sink_name: String, message: String },

    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create initialization error
    pub fn initialization(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Initialization {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create detector submit error
    pub fn detector_submit(frame_index: u64, message: impl Into<String>) -> Self {
        Self::DetectorSubmit {
            frame_index,
            message: message.into(),
        }
    }

    /// Create detector shutdown error
    pub fn detector_shutdown(message: impl Into<String>) -> Self {
        Self::DetectorShutdown {
            message: message.into(),
        }
    }

    /// Create invalid state error
    pub fn invalid_state(
        component: impl Into<String>,
        state: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            component: component.into(),
            state: state.into(),
            operation: operation.into(),
        }
    }

    /// Create landmark layout error
    pub fn landmark_layout(timestamp: u64, message: impl Into<String>) -> Self {
        Self::LandmarkLayout {
            timestamp,
            message: message.into(),
        }
    }

    /// Create invalid frame error
    pub fn invalid_frame(message: impl Into<String>) -> Self {
        Self::InvalidFrame {
            message: message.into(),
        }
    }

    /// Create sink creation error
    pub fn sink_creation(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// True for per-eye crop failures that leave the other eye usable
    pub fn is_crop_failure(&self) -> bool {
        matches!(self, Self::CropOverflow { .. } | Self::CropOutOfFrame { .. })
    }
}
