use image::{DynamicImage, RgbImage};
use palette::Srgb;

use crate::error::{ExtractError, Result};

/// Background used when flattening transparent pixels. Product photos are
/// shot on white, so transparency reads as white backdrop.
pub const DEFAULT_BACKGROUND: Srgb<u8> = Srgb::new(255, 255, 255);

/// Immutable, row-major grid of RGB pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelGrid {
    width: u32,
    height: u32,
    pixels: Vec<Srgb<u8>>,
}

impl PixelGrid {
    /// Build a grid from a row-major pixel buffer.
    ///
    /// Zero-sized grids are accepted here; extraction is what rejects them.
    pub fn new(width: u32, height: u32, pixels: Vec<Srgb<u8>>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(ExtractError::DimensionMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self { width, height, pixels })
    }

    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> Srgb<u8>,
    {
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self { width, height, pixels }
    }

    pub fn from_rgb_image(img: &RgbImage) -> Self {
        let pixels = img.pixels().map(|p| Srgb::new(p[0], p[1], p[2])).collect();
        Self {
            width: img.width(),
            height: img.height(),
            pixels,
        }
    }

    /// Convert any decoded image to RGB, compositing alpha over `background`.
    pub fn from_dynamic_image(img: &DynamicImage, background: Srgb<u8>) -> Self {
        if !img.color().has_alpha() {
            return Self::from_rgb_image(&img.to_rgb8());
        }

        let rgba = img.to_rgba8();
        let pixels = rgba
            .pixels()
            .map(|p| {
                let a = p[3];
                Srgb::new(
                    blend(p[0], background.red, a),
                    blend(p[1], background.green, a),
                    blend(p[2], background.blue, a),
                )
            })
            .collect();

        Self {
            width: rgba.width(),
            height: rgba.height(),
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn pixels(&self) -> &[Srgb<u8>] {
        &self.pixels
    }

    pub fn get(&self, x: u32, y: u32) -> Option<Srgb<u8>> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Keep the central `fraction` of rows and of columns, trimming the
    /// margins symmetrically. A crop that would retain nothing returns the
    /// whole grid.
    pub fn center_crop(&self, fraction: f64) -> PixelGrid {
        let (x0, crop_w) = center_span(self.width, fraction);
        let (y0, crop_h) = center_span(self.height, fraction);

        if crop_w == 0 || crop_h == 0 {
            log::debug!(
                "crop {fraction} of {}x{} is empty, using full image",
                self.width,
                self.height
            );
            return self.clone();
        }

        let row = self.width as usize;
        let mut pixels = Vec::with_capacity(crop_w as usize * crop_h as usize);
        for y in y0..y0 + crop_h {
            let start = y as usize * row + x0 as usize;
            pixels.extend_from_slice(&self.pixels[start..start + crop_w as usize]);
        }

        PixelGrid {
            width: crop_w,
            height: crop_h,
            pixels,
        }
    }
}

/// Offset and length of the centered span covering `fraction` of `len`.
fn center_span(len: u32, fraction: f64) -> (u32, u32) {
    // Decimal fractions such as 0.7 sit just below their written value.
    let kept = ((len as f64 * fraction * (1.0 + 1e-9)).floor() as u32).min(len);
    ((len - kept) / 2, kept)
}

#[inline]
fn blend(channel: u8, background: u8, alpha: u8) -> u8 {
    let a = alpha as u32;
    let mixed = channel as u32 * a + background as u32 * (255 - a);
    ((mixed + 127) / 255) as u8
}
