//! Shared test utilities: synthetic rasters and encoded fixtures.
//!
//! Everything is generated in memory so tests never depend on files on disk.
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let base = jpeg_bytes(400, 300);
//! let mark = png_bytes(&solid_raster(20, 10, [255, 255, 255, 96]));
//! ```

use crate::imaging::{Raster, codec};
use image::{ImageEncoder, Rgba, RgbaImage};

// =========================================================================
// Rasters
// =========================================================================

/// Every pixel the same colour.
pub fn solid_raster(width: u32, height: u32, rgba: [u8; 4]) -> Raster {
    Raster::filled(width, height, Rgba(rgba)).unwrap()
}

/// Opaque raster whose colour encodes the pixel position, so misplaced
/// copies show up in equality assertions.
pub fn gradient_raster(width: u32, height: u32) -> Raster {
    Raster::from_image(RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
    }))
    .unwrap()
}

// =========================================================================
// Encoded fixtures
// =========================================================================

pub fn png_bytes(raster: &Raster) -> Vec<u8> {
    codec::encode_png(raster).unwrap()
}

/// A small valid baseline JPEG with the given dimensions.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut out = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut out)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    out
}
