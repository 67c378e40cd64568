//! Pixel buffer shared across the pipeline.
//!
//! `FrameBuffer` is a dense 2D grid in one of two layouts:
//! - `Gray`: one luma byte per pixel
//! - `Rgb`: three interleaved bytes per pixel
//!
//! The stream driver owns the current buffer transiently; the change
//! scheduler borrows the (previous, current) pair read-only within a cycle.
//! The previous buffer is replaced each sampled cycle, never retained for
//! history.

use anyhow::{anyhow, Result};
use image::imageops::FilterType;
use image::{GrayImage, ImageBuffer, Rgb, RgbImage};
use serde::Serialize;

/// Pixel layout of a `FrameBuffer`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Gray,
    Rgb,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Gray => 1,
            PixelFormat::Rgb => 3,
        }
    }
}

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Intersection with a `width` x `height` frame, `None` when empty.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Rect> {
        if self.x >= width || self.y >= height || self.width == 0 || self.height == 0 {
            return None;
        }
        let right = self.x.saturating_add(self.width).min(width);
        let bottom = self.y.saturating_add(self.height).min(height);
        Some(Rect {
            x: self.x,
            y: self.y,
            width: right - self.x,
            height: bottom - self.y,
        })
    }
}

/// One decoded frame.
#[derive(Clone, Debug)]
pub struct FrameBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl FrameBuffer {
    /// Wrap raw bytes, validating the length against the dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(format.bytes_per_pixel()))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "frame length mismatch: expected {} bytes for {}x{} {:?}, got {}",
                expected,
                width,
                height,
                format,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            format,
        })
    }

    pub fn from_gray_image(image: &GrayImage) -> Self {
        Self {
            data: image.as_raw().clone(),
            width: image.width(),
            height: image.height(),
            format: PixelFormat::Gray,
        }
    }

    pub fn from_rgb_image(image: &RgbImage) -> Self {
        Self {
            data: image.as_raw().clone(),
            width: image.width(),
            height: image.height(),
            format: PixelFormat::Rgb,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Luma intensity of one pixel. Callers must stay in bounds.
    pub fn intensity_at(&self, x: u32, y: u32) -> u8 {
        debug_assert!(x < self.width && y < self.height);
        match self.format {
            PixelFormat::Gray => self.data[y as usize * self.width as usize + x as usize],
            PixelFormat::Rgb => {
                let idx = (y as usize * self.width as usize + x as usize) * 3;
                let r = self.data[idx] as u16;
                let g = self.data[idx + 1] as u16;
                let b = self.data[idx + 2] as u16;
                // BT.601 integer approximation.
                ((r * 77 + g * 150 + b * 29) >> 8) as u8
            }
        }
    }

    /// Copy out a sub-rectangle. The rect must lie inside the frame; clamp
    /// with `Rect::clamp_to` first.
    pub fn crop(&self, rect: Rect) -> Result<FrameBuffer> {
        if rect.width == 0
            || rect.height == 0
            || rect.x.saturating_add(rect.width) > self.width
            || rect.y.saturating_add(rect.height) > self.height
        {
            return Err(anyhow!(
                "crop {:?} outside {}x{} frame",
                rect,
                self.width,
                self.height
            ));
        }
        let bpp = self.format.bytes_per_pixel();
        let row_len = rect.width as usize * bpp;
        let mut data = Vec::with_capacity(row_len * rect.height as usize);
        for row in rect.y..rect.y + rect.height {
            let start = (row as usize * self.width as usize + rect.x as usize) * bpp;
            data.extend_from_slice(&self.data[start..start + row_len]);
        }
        Ok(FrameBuffer {
            data,
            width: rect.width,
            height: rect.height,
            format: self.format,
        })
    }

    /// Resample to the given dimensions (classifier input size).
    pub fn resize(&self, width: u32, height: u32) -> Result<FrameBuffer> {
        if width == 0 || height == 0 {
            return Err(anyhow!("resize target must be non-zero"));
        }
        match self.format {
            PixelFormat::Gray => {
                let src: GrayImage =
                    ImageBuffer::from_raw(self.width, self.height, self.data.clone())
                        .ok_or_else(|| anyhow!("gray frame buffer length corrupt"))?;
                let out = image::imageops::resize(&src, width, height, FilterType::Triangle);
                Ok(FrameBuffer::from_gray_image(&out))
            }
            PixelFormat::Rgb => {
                let src: RgbImage =
                    ImageBuffer::from_raw(self.width, self.height, self.data.clone())
                        .ok_or_else(|| anyhow!("rgb frame buffer length corrupt"))?;
                let out = image::imageops::resize(&src, width, height, FilterType::Triangle);
                Ok(FrameBuffer::from_rgb_image(&out))
            }
        }
    }

    /// Expand to an RGB image for drawing or encoding.
    pub fn to_rgb_image(&self) -> RgbImage {
        match self.format {
            PixelFormat::Rgb => ImageBuffer::from_raw(self.width, self.height, self.data.clone())
                .expect("rgb frame buffer length checked at construction"),
            PixelFormat::Gray => ImageBuffer::from_fn(self.width, self.height, |x, y| {
                let v = self.data[y as usize * self.width as usize + x as usize];
                Rgb([v, v, v])
            }),
        }
    }
}
