//! Pure Rust composition backend built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (PNG, JPEG) | `image::ImageReader` with an explicit format and size limits |
//! | Resample | `image::imageops::resize` with the `Triangle` (bilinear) filter |
//! | Letterbox, tiling | [`Raster::copy_from`] (clipped row copies) |
//! | Alpha-over | [`Raster::composite_over`] (rows in parallel via `rayon`) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |

use super::backend::{ImageBackend, ImagingError};
use super::codec::{self, FormatHint};
use super::params::{DecodeLimits, FitParams};
use super::raster::Raster;
use super::{resize, tile};

/// Production backend. Holds only the decode limits, so it is cheap to
/// build per request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustBackend {
    limits: DecodeLimits,
}

impl RustBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: DecodeLimits) -> Self {
        Self { limits }
    }
}

impl ImageBackend for RustBackend {
    fn decode(&self, bytes: &[u8], hint: FormatHint) -> Result<Raster, ImagingError> {
        codec::decode(bytes, hint, self.limits)
    }

    fn fit(&self, source: Raster, params: &FitParams) -> Result<Raster, ImagingError> {
        resize::fit(source, params)
    }

    fn tile_overlay(&self, base: &Raster, watermark: &Raster) -> Result<Raster, ImagingError> {
        tile::tile_overlay(base, watermark)
    }

    fn encode_png(&self, raster: &Raster) -> Result<Vec<u8>, ImagingError> {
        codec::encode_png(raster)
    }
}
