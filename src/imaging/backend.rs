//! Image backend trait and the error taxonomy shared by every stage.
//!
//! The [`ImageBackend`] trait defines the four operations a composition
//! needs: decode, fit, tile_overlay, and encode_png. The pipeline only talks
//! to the trait, so tests can swap in a recording mock and assert on stage
//! ordering and abort behaviour without touching pixels.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate.

use super::codec::FormatHint;
use super::params::FitParams;
use super::raster::Raster;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("failed to decode {format} data: {message}")]
    Decode { format: FormatHint, message: String },
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("PNG encode failed: {0}")]
    Encode(String),
}

/// Coarse classification of an [`ImagingError`], used by the HTTP layer to
/// pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Decode,
    InvalidGeometry,
    Encode,
}

impl ImagingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode { .. } => ErrorKind::Decode,
            Self::InvalidGeometry(_) => ErrorKind::InvalidGeometry,
            Self::Encode(_) => ErrorKind::Encode,
        }
    }
}

/// Trait for image composition backends.
///
/// `fit` takes the source by value: when the compatibility passthrough
/// applies, the source is handed back untouched instead of being copied.
pub trait ImageBackend: Sync {
    /// Decode an encoded PNG or JPEG stream.
    fn decode(&self, bytes: &[u8], hint: FormatHint) -> Result<Raster, ImagingError>;

    /// Scale to fit the target box, letterboxing the remainder.
    fn fit(&self, source: Raster, params: &FitParams) -> Result<Raster, ImagingError>;

    /// Composite a centred watermark mosaic over `base`.
    fn tile_overlay(&self, base: &Raster, watermark: &Raster) -> Result<Raster, ImagingError>;

    /// Encode as PNG.
    fn encode_png(&self, raster: &Raster) -> Result<Vec<u8>, ImagingError>;
}
