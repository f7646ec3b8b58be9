//! Image composition in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image` PNG/JPEG decoders, chosen by file name |
//! | **Fit** | bilinear resample + solid letterbox |
//! | **Tile overlay** | centred watermark mosaic, straight-alpha "over" |
//! | **Encode** | `image` PNG encoder |
//!
//! The module is split into:
//! - **Raster**: [`Raster`] and [`Rect`], clipped copy and composite primitives
//! - **Calculations**: Pure functions for fit and tile geometry (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Codec / resize / tile**: the three pixel stages
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
pub mod codec;
mod params;
pub mod raster;
pub mod resize;
pub mod rust_backend;
pub mod tile;

pub use backend::{ErrorKind, ImageBackend, ImagingError};
pub use calculations::{
    FitPlacement, LimitingAxis, TileLayout, calculate_fit_placement, calculate_tile_layout,
    padded_tile_count,
};
pub use codec::FormatHint;
pub use params::{Background, DecodeLimits, FitParams, TargetResolution};
pub use raster::{Raster, Rect};
pub use rust_backend::RustBackend;
