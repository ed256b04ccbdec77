//! Pixel frames.
//!
//! A `Frame` owns a tightly packed 3-channel buffer in **BGR** order, the
//! convention every stage relies on (the ripeness heuristic reads channel 2,
//! overlay colors are BGR triples). Decoders that produce RGB go through
//! `Frame::from_rgb` / `Frame::from_rgb_image`; encoders go back through
//! `Frame::to_rgb_image`.

use anyhow::{anyhow, Result};
use image::RgbImage;

use crate::BBox;

pub const CHANNELS: usize = 3;
pub const BLUE: usize = 0;
pub const GREEN: usize = 1;
pub const RED: usize = 2;

// ----------------------------------------------------------------------------
// Region: clipped rectangle inside a frame
// ----------------------------------------------------------------------------

/// Rectangle already clipped to a frame's bounds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Frame {
    /// Wrap an existing BGR buffer. The length must be `width * height * 3`.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = expected_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "BGR frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// All-black frame.
    pub fn zeros(width: u32, height: u32) -> Self {
        Self {
            data: vec![0u8; width as usize * height as usize * CHANNELS],
            width,
            height,
        }
    }

    /// Build a frame from packed RGB bytes, swapping to BGR.
    pub fn from_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Self> {
        let expected = expected_len(width, height)?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                pixels.len()
            ));
        }
        let mut data = pixels.to_vec();
        swap_red_blue(&mut data);
        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn from_rgb_image(image: &RgbImage) -> Self {
        let mut data = image.as_raw().clone();
        swap_red_blue(&mut data);
        Self {
            data,
            width: image.width(),
            height: image.height(),
        }
    }

    /// Copy out as an RGB image for encoding or model input.
    pub fn to_rgb_image(&self) -> RgbImage {
        let mut data = self.data.clone();
        swap_red_blue(&mut data);
        // Length is an invariant of `Frame`, so the buffer always fits.
        RgbImage::from_raw(self.width, self.height, data).unwrap_or_default()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw BGR bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// BGR triple at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = self.offset(x, y);
        Some([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ])
    }

    /// Clip a box to the frame. Negative origins clamp to zero and the far
    /// edge clamps to the frame size; a box entirely outside yields an empty region.
    pub fn clip(&self, bbox: &BBox) -> Region {
        let x0 = (bbox.x as i64).clamp(0, self.width as i64);
        let y0 = (bbox.y as i64).clamp(0, self.height as i64);
        let x1 = (bbox.x as i64 + bbox.w as i64).clamp(0, self.width as i64);
        let y1 = (bbox.y as i64 + bbox.h as i64).clamp(0, self.height as i64);
        Region {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0).max(0) as u32,
            height: (y1 - y0).max(0) as u32,
        }
    }

    /// Mean of one channel over a region. `None` when the region is empty.
    pub fn channel_mean(&self, region: &Region, channel: usize) -> Option<f64> {
        if region.is_empty() || channel >= CHANNELS {
            return None;
        }
        let mut sum: u64 = 0;
        for y in region.y..region.y + region.height {
            let row = self.offset(region.x, y);
            let row_end = row + region.width as usize * CHANNELS;
            sum += self.data[row..row_end]
                .iter()
                .skip(channel)
                .step_by(CHANNELS)
                .map(|&v| v as u64)
                .sum::<u64>();
        }
        Some(sum as f64 / region.area() as f64)
    }

    /// Set one channel to `value` over a region.
    pub fn fill_channel(&mut self, region: &Region, channel: usize, value: u8) {
        if region.is_empty() || channel >= CHANNELS {
            return;
        }
        for y in region.y..region.y + region.height {
            let row = self.offset(region.x, y);
            let row_end = row + region.width as usize * CHANNELS;
            self.data[row..row_end]
                .iter_mut()
                .skip(channel)
                .step_by(CHANNELS)
                .for_each(|v| *v = value);
        }
    }

    /// Lend the buffer to an image-drawing closure without copying.
    ///
    /// The canvas reuses `image::Rgb` as a plain 3-channel pixel, so colors
    /// passed to drawing primitives must already be BGR.
    pub fn with_canvas<R>(&mut self, draw: impl FnOnce(&mut RgbImage) -> R) -> Result<R> {
        let data = std::mem::take(&mut self.data);
        let mut canvas = RgbImage::from_raw(self.width, self.height, data)
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", self.width, self.height))?;
        let out = draw(&mut canvas);
        self.data = canvas.into_raw();
        Ok(out)
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * CHANNELS
    }
}

fn expected_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(CHANNELS))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

fn swap_red_blue(data: &mut [u8]) {
    for px in data.chunks_exact_mut(CHANNELS) {
        px.swap(0, 2);
    }
}
