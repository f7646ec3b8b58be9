//! Decode PNG/JPEG byte streams into rasters and encode rasters as PNG.
//!
//! The decoder is chosen from a file name, not sniffed from the bytes: a
//! `.png` extension (any case) selects PNG, everything else JPEG. Feeding
//! a PNG stream to the JPEG decoder is a decode error, not a fallback.

use super::backend::ImagingError;
use super::params::DecodeLimits;
use super::raster::Raster;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat, ImageReader, Limits};
use std::fmt;
use std::io::Cursor;

/// Which decoder to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatHint {
    Png,
    Jpeg,
}

impl FormatHint {
    /// Pick a decoder from a file name.
    ///
    /// Only the last path component is considered, so `shots.png/photo`
    /// has no extension and decodes as JPEG. A bare `.png` counts as a PNG
    /// extension.
    pub fn from_name(name: &str) -> Self {
        let file = name.rsplit(['/', '\\']).next().unwrap_or(name);
        match file.rsplit_once('.') {
            Some((_, ext)) if ext.eq_ignore_ascii_case("png") => Self::Png,
            _ => Self::Jpeg,
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Jpeg => ImageFormat::Jpeg,
        }
    }
}

impl fmt::Display for FormatHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
        })
    }
}

/// Decode `bytes` with the decoder `hint` selects.
pub fn decode(
    bytes: &[u8],
    hint: FormatHint,
    limits: DecodeLimits,
) -> Result<Raster, ImagingError> {
    let decode_err = |message: String| ImagingError::Decode {
        format: hint,
        message,
    };

    let mut decoder_limits = Limits::default();
    decoder_limits.max_image_width = Some(limits.max_dimension);
    decoder_limits.max_image_height = Some(limits.max_dimension);

    let mut reader = ImageReader::with_format(Cursor::new(bytes), hint.image_format());
    reader.limits(decoder_limits);
    let image = reader.decode().map_err(|e| decode_err(e.to_string()))?;

    Raster::from_image(image.into_rgba8()).map_err(|e| decode_err(e.to_string()))
}

/// Encode as 8-bit RGBA PNG.
pub fn encode_png(raster: &Raster) -> Result<Vec<u8>, ImagingError> {
    let (width, height) = raster.dimensions();
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(
            raster.as_image().as_raw(),
            width,
            height,
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| ImagingError::Encode(e.to_string()))?;
    Ok(out)
}
