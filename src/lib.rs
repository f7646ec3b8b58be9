//! # Tilemark
//!
//! Letterbox a photo onto a fixed canvas and stamp it with a tiled watermark.
//! Works as a one-shot command, as an HTTP upload service, and as the client
//! for that service.
//!
//! # Pipeline
//!
//! Every composition runs the same four stages, in order, and the first
//! failure aborts it:
//!
//! ```text
//! 1. Decode    PNG/JPEG bytes  →  RGBA raster     (format from the file name)
//! 2. Fit       raster          →  target canvas   (aspect kept, letterboxed)
//! 3. Overlay   canvas + mark   →  canvas          (centred mosaic, alpha over)
//! 4. Encode    canvas          →  PNG bytes
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Rasters, fit/tile geometry, the decode/fit/overlay/encode stages, and the backend trait |
//! | [`pipeline`] | Runs one request through the four stages and reports what happened |
//! | [`config`] | `tilemark.toml` loading: stock defaults merged with a sparse user file, validation |
//! | [`server`] | HTTP upload endpoint (`hyper` + `multer`) answering with the composed PNG |
//! | [`client`] | Blocking HTTP client that posts two files and saves the reply |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Fixed Output Size
//!
//! The canvas size comes from configuration only. Callers of the upload
//! service cannot ask for a different size, so every response from one
//! deployment has the same dimensions.
//!
//! ## Geometry Before Pixels
//!
//! Fit placement and tile layout are pure functions of image dimensions
//! ([`imaging::calculate_fit_placement`], [`imaging::calculate_tile_layout`]).
//! They are unit tested without decoding anything, and the pixel stages only
//! execute the plan they produce.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, resampling, and PNG encoding use the `image` crate. Blending is
//! done row-parallel with `rayon` on straight (non-premultiplied) alpha; fully
//! transparent watermark pixels leave the base bit-for-bit unchanged.
//!
//! ## Nothing Touches Disk in the Service
//!
//! Uploads are held in memory for the duration of one request and dropped
//! with the response.

pub mod client;
pub mod config;
pub mod imaging;
pub mod output;
pub mod pipeline;
pub mod server;

#[cfg(test)]
pub(crate) mod test_helpers;
