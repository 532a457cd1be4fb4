//! Decoding raster files into [`PixelGrid`]s.

use std::path::Path;

use crate::error::Result;
use crate::grid::{DEFAULT_BACKGROUND, PixelGrid};

/// Decode an in-memory image (JPEG, PNG, ...) to RGB.
pub fn decode_bytes(input: &[u8]) -> Result<PixelGrid> {
    let img = image::load_from_memory(input)?;
    log::debug!("decoded {}x{} {:?} image", img.width(), img.height(), img.color());
    Ok(PixelGrid::from_dynamic_image(&img, DEFAULT_BACKGROUND))
}

/// Decode an image file from disk to RGB.
pub fn open_image<P: AsRef<Path>>(path: P) -> Result<PixelGrid> {
    let path = path.as_ref();
    let img = image::open(path)?;
    log::debug!("opened {} ({}x{})", path.display(), img.width(), img.height());
    Ok(PixelGrid::from_dynamic_image(&img, DEFAULT_BACKGROUND))
}
