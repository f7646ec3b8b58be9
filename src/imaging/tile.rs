//! Tiled watermark overlay.
//!
//! The watermark is laid out as a mosaic a little larger than the base in
//! every direction (see [`padded_tile_count`](super::calculations::padded_tile_count))
//! and centred on it. Only the part of the mosaic over the base is ever
//! materialized. Tiles are butted edge to edge with a plain copy; blending
//! only happens once, against the base.

use super::backend::ImagingError;
use super::calculations::{TileLayout, calculate_tile_layout};
use super::raster::Raster;

/// Compute the tile layout, rejecting watermarks the base cannot take.
pub fn plan_tiles(base: &Raster, watermark: &Raster) -> Result<TileLayout, ImagingError> {
    calculate_tile_layout(base.dimensions(), watermark.dimensions()).ok_or_else(|| {
        ImagingError::InvalidGeometry(format!(
            "cannot tile a {}x{} watermark over a {}x{} image",
            watermark.width(),
            watermark.height(),
            base.width(),
            base.height()
        ))
    })
}

/// Repeat `watermark` row-major at the layout's tile positions, keeping
/// only the window that lands on a `canvas`-sized base.
///
/// The result is exactly `canvas` sized: each pixel holds the mosaic pixel
/// above that base pixel, or transparent where the mosaic does not reach.
/// Only tiles that touch the canvas are copied, so a huge watermark over a
/// small base costs no more than the base itself.
pub fn build_mosaic(
    watermark: &Raster,
    layout: &TileLayout,
    canvas: (u32, u32),
) -> Result<Raster, ImagingError> {
    let mut mosaic = Raster::new(canvas.0, canvas.1)?;
    let Some(visible) = layout.mosaic_rect().intersect(&mosaic.bounds()) else {
        return Ok(mosaic);
    };

    let tile_w = i64::from(layout.tile_width);
    let tile_h = i64::from(layout.tile_height);
    let first_column = (visible.x - layout.offset_x) / tile_w;
    let last_column = (visible.right() - 1 - layout.offset_x) / tile_w;
    let first_row = (visible.y - layout.offset_y) / tile_h;
    let last_row = (visible.bottom() - 1 - layout.offset_y) / tile_h;

    for row in first_row..=last_row {
        let y = layout.offset_y + row * tile_h;
        for column in first_column..=last_column {
            mosaic.copy_from(watermark, layout.offset_x + column * tile_w, y);
        }
    }
    Ok(mosaic)
}

/// Composite a centred watermark mosaic over a copy of `base`.
pub fn tile_overlay(base: &Raster, watermark: &Raster) -> Result<Raster, ImagingError> {
    let layout = plan_tiles(base, watermark)?;
    let mosaic = build_mosaic(watermark, &layout, base.dimensions())?;

    let mut out = base.clone();
    out.composite_over(&mosaic, 0, 0);
    Ok(out)
}
