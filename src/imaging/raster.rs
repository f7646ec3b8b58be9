//! In-memory RGBA raster and integer rectangles.
//!
//! A [`Raster`] wraps an [`image::RgbaImage`] and guarantees non-zero
//! dimensions. Two region primitives live here because both the resizer and
//! the tiler need them:
//!
//! - [`Raster::copy_from`]: plain overwrite of a source region.
//! - [`Raster::composite_over`]: straight-alpha "over" blend.
//!
//! Both take a signed destination origin and copy only the sub-rectangle
//! where the placed source overlaps the destination. Anything outside is
//! clipped, never wrapped.

use super::backend::ImagingError;
use image::{Rgba, RgbaImage};
use rayon::prelude::*;

/// Integer rectangle with a signed origin.
///
/// Used both as a placement (origin may be negative when content overhangs a
/// canvas) and as the clipped overlap between two placements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i64, y: i64, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i64 {
        self.x + i64::from(self.width)
    }

    pub fn bottom(&self) -> i64 {
        self.y + i64::from(self.height)
    }

    /// Overlap of two rectangles, or `None` when they share no pixel.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= x || bottom <= y {
            return None;
        }
        Some(Rect::new(x, y, (right - x) as u32, (bottom - y) as u32))
    }
}

/// Decoded image held as 8-bit RGBA. Width and height are always > 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pixels: RgbaImage,
}

impl Raster {
    /// Fully transparent raster.
    pub fn new(width: u32, height: u32) -> Result<Self, ImagingError> {
        Self::filled(width, height, Rgba([0, 0, 0, 0]))
    }

    pub fn filled(width: u32, height: u32, color: Rgba<u8>) -> Result<Self, ImagingError> {
        check_dimensions(width, height)?;
        Ok(Self {
            pixels: RgbaImage::from_pixel(width, height, color),
        })
    }

    pub fn from_image(pixels: RgbaImage) -> Result<Self, ImagingError> {
        check_dimensions(pixels.width(), pixels.height())?;
        Ok(Self { pixels })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// The raster's own extent, anchored at the origin.
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width(), self.height())
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.pixels.get_pixel(x, y)
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Overwrite the region of `self` covered by `src` placed at
    /// (`dest_x`, `dest_y`). Returns the destination rectangle written.
    pub fn copy_from(&mut self, src: &Raster, dest_x: i64, dest_y: i64) -> Option<Rect> {
        let (visible, src_x, src_y) = self.overlap(src, dest_x, dest_y)?;
        let row_bytes = visible.width as usize * 4;
        let dst_width = self.width();
        let src_buf: &[u8] = src.pixels.as_raw();
        let dst_buf: &mut [u8] = &mut self.pixels;
        for row in 0..visible.height {
            let s = offset(src.width(), src_x, src_y + row);
            let d = offset(dst_width, visible.x as u32, visible.y as u32 + row);
            dst_buf[d..d + row_bytes].copy_from_slice(&src_buf[s..s + row_bytes]);
        }
        Some(visible)
    }

    /// Alpha-over blend `src` placed at (`dest_x`, `dest_y`) onto `self`.
    ///
    /// Rows are blended in parallel. Source pixels with alpha 0 leave the
    /// destination bit-for-bit unchanged, alpha 255 overwrites it.
    pub fn composite_over(&mut self, src: &Raster, dest_x: i64, dest_y: i64) -> Option<Rect> {
        let (visible, src_x, src_y) = self.overlap(src, dest_x, dest_y)?;
        let dst_stride = self.width() as usize * 4;
        let x0 = visible.x as usize * 4;
        let row_bytes = visible.width as usize * 4;
        let src_width = src.width();
        let src_buf: &[u8] = src.pixels.as_raw();
        let dst_buf: &mut [u8] = &mut self.pixels;

        dst_buf
            .par_chunks_mut(dst_stride)
            .skip(visible.y as usize)
            .take(visible.height as usize)
            .enumerate()
            .for_each(|(row, dst_row)| {
                let s = offset(src_width, src_x, src_y + row as u32);
                let src_row = &src_buf[s..s + row_bytes];
                for (d, s) in dst_row[x0..x0 + row_bytes]
                    .chunks_exact_mut(4)
                    .zip(src_row.chunks_exact(4))
                {
                    blend_over(d, s);
                }
            });
        Some(visible)
    }

    /// Clipped overlap in destination space plus the matching source origin.
    fn overlap(&self, src: &Raster, dest_x: i64, dest_y: i64) -> Option<(Rect, u32, u32)> {
        let placed = Rect::new(dest_x, dest_y, src.width(), src.height());
        let visible = placed.intersect(&self.bounds())?;
        Some((
            visible,
            (visible.x - dest_x) as u32,
            (visible.y - dest_y) as u32,
        ))
    }
}

/// Byte offset of pixel (x, y) in a tightly packed RGBA8 buffer.
fn offset(width: u32, x: u32, y: u32) -> usize {
    (y as usize * width as usize + x as usize) * 4
}

fn check_dimensions(width: u32, height: u32) -> Result<(), ImagingError> {
    if width == 0 || height == 0 {
        return Err(ImagingError::InvalidGeometry(format!(
            "raster must be at least 1x1, got {width}x{height}"
        )));
    }
    Ok(())
}

/// Straight-alpha Porter-Duff "over" for one RGBA8 pixel.
///
/// Works in 255² fixed point so that the alpha 0 and alpha 255 cases are
/// exact; both are short-circuited anyway.
#[inline]
pub(crate) fn blend_over(dst: &mut [u8], src: &[u8]) {
    let sa = u32::from(src[3]);
    match sa {
        0 => {}
        255 => dst.copy_from_slice(src),
        _ => {
            let da = u32::from(dst[3]);
            let inv = 255 - sa;
            let out_a = sa * 255 + da * inv;
            for c in 0..3 {
                let num = u32::from(src[c]) * sa * 255 + u32::from(dst[c]) * da * inv;
                dst[c] = ((num + out_a / 2) / out_a) as u8;
            }
            dst[3] = ((out_a + 127) / 255) as u8;
        }
    }
}
