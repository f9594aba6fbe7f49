//! Frame - 采集输入
//!
//! 原始视频帧结构。帧索引同时作为时间戳使用。

use bytes::Bytes;
use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::ContractError;

/// 像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Gray8,
    Bgr8,
    Rgb8,
    Bgra8,
}

impl PixelFormat {
    /// 每像素字节数
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Gray8 => 1,
            Self::Bgr8 | Self::Rgb8 => 3,
            Self::Bgra8 => 4,
        }
    }

    /// 由线协议中的 bytesPerPixel 推断格式 (3 字节默认为 BGR)
    pub fn from_bytes_per_pixel(bpp: usize) -> Option<Self> {
        match bpp {
            1 => Some(Self::Gray8),
            3 => Some(Self::Bgr8),
            4 => Some(Self::Bgra8),
            _ => None,
        }
    }
}

/// 像素缓冲区 (行主序, 无行填充)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixelBuffer {
    /// 图像宽度
    pub width: u32,

    /// 图像高度
    pub height: u32,

    /// 像素格式
    pub format: PixelFormat,

    /// 原始像素数据 (零拷贝)
    pub data: Bytes,
}

impl PixelBuffer {
    /// 创建缓冲区并校验数据长度
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: impl Into<Bytes>,
    ) -> Result<Self, ContractError> {
        let data = data.into();
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(ContractError::invalid_frame(format!(
                "{width}x{height} {format:?} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// 全零缓冲区
    pub fn zeroed(width: u32, height: u32, format: PixelFormat) -> Self {
        let len = width as usize * height as usize * format.bytes_per_pixel();
        Self {
            width,
            height,
            format,
            data: Bytes::from(vec![0u8; len]),
        }
    }

    /// 从灰度图构建
    pub fn from_gray(image: &GrayImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            format: PixelFormat::Gray8,
            data: Bytes::copy_from_slice(image.as_raw()),
        }
    }

    /// 转为灰度图
    ///
    /// 使用 BT.601 整数权重 (R 0.299, G 0.587, B 0.114)，与常见视觉库的 BGR→GRAY 一致。
    pub fn to_gray(&self) -> GrayImage {
        let pixels = self.width as usize * self.height as usize;
        let luma: Vec<u8> = match self.format {
            PixelFormat::Gray8 => self.data.to_vec(),
            PixelFormat::Bgr8 => self
                .data
                .chunks_exact(3)
                .map(|p| bt601(p[2], p[1], p[0]))
                .collect(),
            PixelFormat::Rgb8 => self
                .data
                .chunks_exact(3)
                .map(|p| bt601(p[0], p[1], p[2]))
                .collect(),
            PixelFormat::Bgra8 => self
                .data
                .chunks_exact(4)
                .map(|p| bt601(p[2], p[1], p[0]))
                .collect(),
        };
        debug_assert_eq!(luma.len(), pixels);
        GrayImage::from_raw(self.width, self.height, luma)
            .unwrap_or_else(|| GrayImage::new(self.width, self.height))
    }
}

fn bt601(r: u8, g: u8, b: u8) -> u8 {
    let y = (r as u32 * 4899 + g as u32 * 9617 + b as u32 * 1868 + 8192) >> 14;
    y.min(255) as u8
}

/// 视频帧
///
/// 采集后不可变，处理后即丢弃。
#[derive(Debug, Clone)]
pub struct Frame {
    /// 帧索引 (同时作为时间戳)
    pub index: u64,

    /// 像素数据
    pub pixels: PixelBuffer,
}

impl Frame {
    pub fn new(index: u64, pixels: PixelBuffer) -> Self {
        Self { index, pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width
    }

    pub fn height(&self) -> u32 {
        self.pixels.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_buffer_length_checked() {
        let err = PixelBuffer::new(4, 4, PixelFormat::Bgr8, vec![0u8; 10]).unwrap_err();
        assert!(matches!(err, ContractError::InvalidFrame { .. }));
        assert!(PixelBuffer::new(4, 4, PixelFormat::Bgr8, vec![0u8; 48]).is_ok());
    }

    #[test]
    fn test_bgr_to_gray_uses_channel_order() {
        // pure blue in BGR order
        let buf = PixelBuffer::new(1, 1, PixelFormat::Bgr8, vec![255u8, 0, 0]).unwrap();
        let gray = buf.to_gray();
        assert_eq!(gray.get_pixel(0, 0)[0], 29);

        let white = PixelBuffer::new(1, 1, PixelFormat::Rgb8, vec![255u8, 255, 255]).unwrap();
        assert_eq!(white.to_gray().get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn test_from_bytes_per_pixel() {
        assert_eq!(PixelFormat::from_bytes_per_pixel(3), Some(PixelFormat::Bgr8));
        assert_eq!(PixelFormat::from_bytes_per_pixel(2), None);
    }
}
