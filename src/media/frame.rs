use crate::foundation::core::{Dimensions, ScaleFilter};
use crate::foundation::error::{ButterflowError, ButterflowResult};
use crate::foundation::math::unit_to_u8;

/// 8-bit BGR frame, rows top to bottom, `width * height * 3` bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> ButterflowResult<Self> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(ButterflowError::invalid_input(format!(
                "BGR frame {width}x{height} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A frame filled with one BGR color.
    pub fn filled(width: u32, height: u32, bgr: [u8; 3]) -> Self {
        let n = width as usize * height as usize;
        let mut data = Vec::with_capacity(n * 3);
        for _ in 0..n {
            data.extend_from_slice(&bgr);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn dims(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = (y as usize * self.width as usize + x as usize) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, bgr: [u8; 3]) {
        let i = (y as usize * self.width as usize + x as usize) * 3;
        self.data[i..i + 3].copy_from_slice(&bgr);
    }

    /// Luma with BT.601 weights, rounded.
    pub fn to_gray(&self) -> GrayFrame {
        let data = self
            .data
            .chunks_exact(3)
            .map(|p| {
                let y = 0.114 * f32::from(p[0]) + 0.587 * f32::from(p[1]) + 0.299 * f32::from(p[2]);
                y.round().clamp(0.0, 255.0) as u8
            })
            .collect();
        GrayFrame {
            width: self.width,
            height: self.height,
            data,
        }
    }

    /// Channels as `f32` in `[0, 1]`.
    pub fn to_unit(&self) -> FrameF32 {
        FrameF32 {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&b| f32::from(b) / 255.0).collect(),
        }
    }

    /// Resample to `dims` with `filter`. Same-size requests return a copy.
    pub fn resized(&self, dims: Dimensions, filter: ScaleFilter) -> ButterflowResult<Self> {
        if dims == self.dims() {
            return Ok(self.clone());
        }
        // Channel order does not matter to the resampler, so BGR rides through an Rgb buffer.
        let buf: image::ImageBuffer<image::Rgb<u8>, Vec<u8>> =
            image::ImageBuffer::from_raw(self.width, self.height, self.data.clone()).ok_or_else(
                || ButterflowError::invalid_input("frame buffer does not match its dimensions"),
            )?;
        let out = image::imageops::resize(&buf, dims.width, dims.height, filter.to_image_filter());
        Self::new(dims.width, dims.height, out.into_raw())
    }
}

/// BGR frame with `f32` channels in `[0, 1]`, as consumed by the interpolator.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameF32 {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl FrameF32 {
    pub fn dims(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    pub fn to_frame(&self) -> Frame {
        Frame {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| unit_to_u8(v)).collect(),
        }
    }
}

/// 8-bit single-channel frame, input to optical flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl GrayFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> ButterflowResult<Self> {
        if data.len() != width as usize * height as usize {
            return Err(ButterflowError::invalid_input(format!(
                "gray frame {width}x{height} needs {} bytes, got {}",
                width as usize * height as usize,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn dims(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/frame.rs"]
mod tests;
