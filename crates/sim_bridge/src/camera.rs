//! 相机帧
//!
//! 仿真器返回的原始 RGB 缓冲区左右镜像，解码时翻转一次。

use std::path::Path;

use image::RgbImage;

use crate::error::{Result, SimError};

/// 相机默认分辨率
pub const CAMERA_WIDTH: u32 = 640;
pub const CAMERA_HEIGHT: u32 = 480;

/// RGB8 相机帧
#[derive(Debug, Clone, PartialEq)]
pub struct CameraFrame {
    image: RgbImage,
}

impl CameraFrame {
    /// 从仿真器原始缓冲区构造，并水平翻转
    pub fn from_raw_mirrored(width: u32, height: u32, raw: Vec<u8>) -> Result<Self> {
        let mut frame = Self::from_raw(width, height, raw)?;
        image::imageops::flip_horizontal_in_place(&mut frame.image);
        Ok(frame)
    }

    /// 从已按正常方向排列的缓冲区构造
    pub fn from_raw(width: u32, height: u32, raw: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        let actual = raw.len();
        let image = RgbImage::from_raw(width, height, raw).ok_or(SimError::InvalidFrame {
            width,
            height,
            expected,
            actual,
        })?;
        Ok(Self { image })
    }

    /// 纯色帧
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, image::Rgb(rgb)),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// 像素值，越界返回 None
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        self.image.get_pixel_checked(x, y).map(|p| p.0)
    }

    /// 行优先 RGB 字节
    pub fn as_bytes(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// 保存为 PNG
    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.image
            .save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}

impl Default for CameraFrame {
    fn default() -> Self {
        Self::filled(CAMERA_WIDTH, CAMERA_HEIGHT, [0, 0, 0])
    }
}
