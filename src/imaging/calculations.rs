//! Pure calculation functions for composition geometry.
//!
//! All functions here are pure and testable without any I/O or pixels.

use super::raster::Rect;

/// Which axis constrained the shared scale factor in a fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitingAxis {
    /// Width filled the target; the remainder is padded top and bottom.
    Width,
    /// Height filled the target; the remainder is padded left and right.
    Height,
}

/// Where scaled content lands on the target canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitPlacement {
    pub scale: f64,
    pub limiting: LimitingAxis,
    /// Scaled content size and its offset on the target canvas.
    pub content: Rect,
}

impl FitPlacement {
    /// True when the scaled content covers the whole target.
    pub fn is_padding_free(&self, target: (u32, u32)) -> bool {
        self.content == Rect::new(0, 0, target.0, target.1)
    }
}

/// Calculate the aspect-preserving placement of `source` inside `target`.
///
/// The smaller of the two per-axis ratios becomes the shared scale, so the
/// scaled content always fits without cropping. The constrained axis fills
/// its dimension; the other axis is centred. On a tie the width branch is
/// taken, whose vertical offset then comes out as zero.
///
/// Scaled sizes are rounded and never drop below one pixel.
///
/// # Examples
/// ```
/// # use tilemark::imaging::{calculate_fit_placement, LimitingAxis};
/// // 2:1 source into a 4:3 box → full width, letterboxed top and bottom
/// let fit = calculate_fit_placement((2000, 1000), (1024, 768));
/// assert_eq!(fit.limiting, LimitingAxis::Width);
/// assert_eq!((fit.content.width, fit.content.height), (1024, 512));
/// assert_eq!((fit.content.x, fit.content.y), (0, 128));
/// ```
pub fn calculate_fit_placement(source: (u32, u32), target: (u32, u32)) -> FitPlacement {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let aspect_w = tgt_w as f64 / src_w as f64;
    let aspect_h = tgt_h as f64 / src_h as f64;

    let (scale, limiting) = if aspect_h < aspect_w {
        (aspect_h, LimitingAxis::Height)
    } else {
        (aspect_w, LimitingAxis::Width)
    };

    let dest_w = scaled_len(src_w, scale);
    let dest_h = scaled_len(src_h, scale);

    let (x, y) = match limiting {
        LimitingAxis::Height => ((i64::from(tgt_w) - i64::from(dest_w)) / 2, 0),
        LimitingAxis::Width => (0, (i64::from(tgt_h) - i64::from(dest_h)) / 2),
    };

    FitPlacement {
        scale,
        limiting,
        content: Rect::new(x, y, dest_w, dest_h),
    }
}

fn scaled_len(len: u32, scale: f64) -> u32 {
    ((len as f64 * scale).round() as u32).max(1)
}

/// Tile count along one axis, padded so the centred mosaic overhangs both
/// edges: even quotients get three extra tiles, odd ones two. Either way the
/// result is odd, so a tile sits on the centre line.
pub fn padded_tile_count(quotient: u32) -> u32 {
    if quotient % 2 == 0 {
        quotient.saturating_add(3)
    } else {
        quotient.saturating_add(2)
    }
}

/// How a watermark is repeated to cover a base canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLayout {
    pub columns: u32,
    pub rows: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    /// Position of the mosaic's top-left corner relative to the base's.
    /// Usually negative: the mosaic overflows every edge.
    pub offset_x: i64,
    pub offset_y: i64,
}

impl TileLayout {
    pub fn mosaic_width(&self) -> u32 {
        self.columns * self.tile_width
    }

    pub fn mosaic_height(&self) -> u32 {
        self.rows * self.tile_height
    }

    /// The mosaic's placement in base coordinates.
    pub fn mosaic_rect(&self) -> Rect {
        Rect::new(
            self.offset_x,
            self.offset_y,
            self.mosaic_width(),
            self.mosaic_height(),
        )
    }
}

/// Calculate the tile grid for a `tile`-sized watermark over a `base` canvas.
///
/// Returns `None` for a zero-sized tile or when the mosaic would not fit in
/// `u32` pixel dimensions.
///
/// # Examples
/// ```
/// # use tilemark::imaging::calculate_tile_layout;
/// let layout = calculate_tile_layout((1024, 768), (100, 50)).unwrap();
/// assert_eq!((layout.columns, layout.rows), (13, 17));
/// assert_eq!((layout.offset_x, layout.offset_y), (-138, -41));
/// ```
pub fn calculate_tile_layout(base: (u32, u32), tile: (u32, u32)) -> Option<TileLayout> {
    let (base_w, base_h) = base;
    let (tile_w, tile_h) = tile;
    if tile_w == 0 || tile_h == 0 {
        return None;
    }

    let columns = padded_tile_count(base_w / tile_w);
    let rows = padded_tile_count(base_h / tile_h);
    let mosaic_w = columns.checked_mul(tile_w)?;
    let mosaic_h = rows.checked_mul(tile_h)?;

    Some(TileLayout {
        columns,
        rows,
        tile_width: tile_w,
        tile_height: tile_h,
        offset_x: i64::from(base_w / 2) - i64::from(mosaic_w / 2),
        offset_y: i64::from(base_h / 2) - i64::from(mosaic_h / 2),
    })
}
