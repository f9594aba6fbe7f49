//! Wire format
//!
//! Handshake: `width, height, bytes_per_pixel, fps` as little-endian f64.
//! Reply: six little-endian f32 per frame.

use bytes::{Buf, BufMut, BytesMut};
use contracts::{PixelFormat, TrackingFrame};

use crate::error::{ProtocolError, Result};

/// Handshake size on the wire
pub const HANDSHAKE_LEN: usize = 4 * std::mem::size_of::<f64>();

/// Reply size on the wire
pub const REPLY_LEN: usize = 6 * std::mem::size_of::<f32>();

/// Largest frame accepted unless configured otherwise (64 MiB)
pub const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Session parameters sent once by the client
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Handshake {
    pub width: u32,
    pub height: u32,
    pub bytes_per_pixel: u32,
    pub fps: f64,
}

impl Handshake {
    pub fn new(width: u32, height: u32, bytes_per_pixel: u32, fps: f64) -> Self {
        Self {
            width,
            height,
            bytes_per_pixel,
            fps,
        }
    }

    /// Parse and validate against `max_frame_bytes`
    ///
    /// # Errors
    /// `Handshake` for non-finite or non-positive values or an unknown pixel
    /// size, `FrameTooLarge` when one frame would exceed the limit.
    pub fn decode(raw: &[u8; HANDSHAKE_LEN], max_frame_bytes: usize) -> Result<Self> {
        let mut buf = &raw[..];
        let width = buf.get_f64_le();
        let height = buf.get_f64_le();
        let bpp = buf.get_f64_le();
        let fps = buf.get_f64_le();

        let handshake = Self {
            width: dimension("width", width)?,
            height: dimension("height", height)?,
            bytes_per_pixel: dimension("bytes_per_pixel", bpp)?,
            fps,
        };
        if !fps.is_finite() || fps <= 0.0 {
            return Err(ProtocolError::handshake(format!("fps must be positive, got {fps}")));
        }
        if handshake.pixel_format().is_none() {
            return Err(ProtocolError::handshake(format!(
                "bytes_per_pixel must be 1, 3 or 4, got {bpp}"
            )));
        }

        let len = handshake.frame_len();
        if len > max_frame_bytes {
            return Err(ProtocolError::FrameTooLarge {
                len,
                max: max_frame_bytes,
            });
        }
        Ok(handshake)
    }

    pub fn encode(&self) -> [u8; HANDSHAKE_LEN] {
        let mut buf = BytesMut::with_capacity(HANDSHAKE_LEN);
        buf.put_f64_le(self.width as f64);
        buf.put_f64_le(self.height as f64);
        buf.put_f64_le(self.bytes_per_pixel as f64);
        buf.put_f64_le(self.fps);

        let mut out = [0u8; HANDSHAKE_LEN];
        out.copy_from_slice(&buf);
        out
    }

    /// Bytes per frame: `width * height * bytes_per_pixel`
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * self.bytes_per_pixel as usize
    }

    /// Three-byte frames are BGR
    pub fn pixel_format(&self) -> Option<PixelFormat> {
        PixelFormat::from_bytes_per_pixel(self.bytes_per_pixel as usize)
    }
}

fn dimension(name: &str, value: f64) -> Result<u32> {
    if !value.is_finite() || value < 1.0 || value > u32::MAX as f64 || value.fract() != 0.0 {
        return Err(ProtocolError::handshake(format!(
            "{name} must be a positive whole number, got {value}"
        )));
    }
    Ok(value as u32)
}

/// Per-frame answer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PupilReply {
    pub left_diameter: f32,
    pub left_relative: f32,
    pub left_confidence: f32,
    pub right_diameter: f32,
    pub right_relative: f32,
    pub right_confidence: f32,
}

impl PupilReply {
    pub fn encode(&self) -> [u8; REPLY_LEN] {
        let mut buf = BytesMut::with_capacity(REPLY_LEN);
        for value in self.values() {
            buf.put_f32_le(value);
        }
        let mut out = [0u8; REPLY_LEN];
        out.copy_from_slice(&buf);
        out
    }

    pub fn decode(raw: &[u8; REPLY_LEN]) -> Self {
        let mut buf = &raw[..];
        Self {
            left_diameter: buf.get_f32_le(),
            left_relative: buf.get_f32_le(),
            left_confidence: buf.get_f32_le(),
            right_diameter: buf.get_f32_le(),
            right_relative: buf.get_f32_le(),
            right_confidence: buf.get_f32_le(),
        }
    }

    /// Values in wire order
    pub fn values(&self) -> [f32; 6] {
        [
            self.left_diameter,
            self.left_relative,
            self.left_confidence,
            self.right_diameter,
            self.right_relative,
            self.right_confidence,
        ]
    }
}

impl From<TrackingFrame> for PupilReply {
    fn from(frame: TrackingFrame) -> Self {
        Self {
            left_diameter: frame.left.diameter,
            left_relative: frame.left.diameter_relative,
            left_confidence: frame.left.confidence,
            right_diameter: frame.right.diameter,
            right_relative: frame.right.diameter_relative,
            right_confidence: frame.right.confidence,
        }
    }
}
