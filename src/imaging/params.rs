//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the [`pipeline`](crate::pipeline) (which decides what to
//! compose) and the [`backend`](super::backend) (which does the pixel work).
//!
//! ## Types
//!
//! - [`TargetResolution`]: Output canvas size. Both sides non-zero by construction.
//! - [`Background`]: Opaque letterbox colour, parsed from `#RRGGBB`.
//! - [`FitParams`]: Everything `fit` needs: target, background, compatibility passthrough.
//! - [`DecodeLimits`]: Upper bound on decoded image dimensions.

use super::backend::ImagingError;
use image::Rgba;
use std::fmt;

/// Desired output canvas size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetResolution {
    width: u32,
    height: u32,
}

impl TargetResolution {
    pub fn new(width: u32, height: u32) -> Result<Self, ImagingError> {
        if width == 0 || height == 0 {
            return Err(ImagingError::InvalidGeometry(format!(
                "target resolution must be positive, got {width}x{height}"
            )));
        }
        Ok(Self { width, height })
    }

    pub fn width(self) -> u32 {
        self.width
    }

    pub fn height(self) -> u32 {
        self.height
    }

    pub fn dimensions(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl fmt::Display for TargetResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Opaque letterbox fill colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Background([u8; 3]);

impl Background {
    pub const BLACK: Self = Self([0, 0, 0]);

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b])
    }

    /// Parse `#RRGGBB` (leading `#` optional). Alpha is not accepted: the
    /// letterbox is always opaque.
    pub fn parse(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self([channel(0)?, channel(2)?, channel(4)?]))
    }

    pub fn to_rgba(self) -> Rgba<u8> {
        let [r, g, b] = self.0;
        Rgba([r, g, b, 255])
    }
}

impl Default for Background {
    fn default() -> Self {
        Self::BLACK
    }
}

impl fmt::Display for Background {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}")
    }
}

/// Parameters for an aspect-preserving fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitParams {
    pub target: TargetResolution,
    pub background: Background,
    /// Return the source untouched when its height equals the target width
    /// and its width equals the target height. The comparison is swapped
    /// on purpose: older deployments behaved this way and disabling it
    /// changes output for exactly those inputs.
    pub swapped_passthrough: bool,
}

impl FitParams {
    pub fn new(target: TargetResolution) -> Self {
        Self {
            target,
            background: Background::default(),
            swapped_passthrough: true,
        }
    }

    /// Whether a `source`-sized raster short-circuits the fit.
    pub fn passes_through(&self, source: (u32, u32)) -> bool {
        self.swapped_passthrough
            && source.1 == self.target.width()
            && source.0 == self.target.height()
    }
}

/// Upper bound on decoded width and height, checked from the header before
/// pixel data is allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    pub max_dimension: u32,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_dimension: 16_384,
        }
    }
}
