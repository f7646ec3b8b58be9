//! Aspect-preserving scale-to-fit with a solid letterbox.

use super::backend::ImagingError;
use super::calculations::calculate_fit_placement;
use super::params::FitParams;
use super::raster::Raster;
use image::imageops::{self, FilterType};

/// Scale `source` into the target box, centred, padding with the background.
///
/// The result is exactly the target size, except when the compatibility
/// passthrough in [`FitParams`] applies; then `source` is returned as is.
pub fn fit(source: Raster, params: &FitParams) -> Result<Raster, ImagingError> {
    if params.passes_through(source.dimensions()) {
        return Ok(source);
    }

    let (target_w, target_h) = params.target.dimensions();
    let placement = calculate_fit_placement(source.dimensions(), (target_w, target_h));
    let content = placement.content;

    // Bilinear
    let scaled = imageops::resize(
        source.as_image(),
        content.width,
        content.height,
        FilterType::Triangle,
    );
    let scaled = Raster::from_image(scaled)?;

    let mut canvas = Raster::filled(target_w, target_h, params.background.to_rgba())?;
    canvas.copy_from(&scaled, content.x, content.y);
    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::{Background, TargetResolution};
    use image::Rgba;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    fn params(w: u32, h: u32) -> FitParams {
        FitParams::new(TargetResolution::new(w, h).unwrap())
    }

    #[test]
    fn output_matches_target_dimensions() {
        for (source, target) in [
            ((2000, 1000), (1024, 768)),
            ((10, 300), (64, 48)),
            ((1, 1), (33, 17)),
            ((640, 480), (640, 480)),
            ((5, 5), (3, 2)),
        ] {
            let src = Raster::filled(source.0, source.1, RED).unwrap();
            let out = fit(src, &params(target.0, target.1)).unwrap();
            assert_eq!(out.dimensions(), target, "source {source:?}");
        }
    }

    #[test]
    fn wide_source_is_letterboxed() {
        // 2000x1000 → 1024x768: content 1024x512 at y=128
        let src = Raster::filled(2000, 1000, RED).unwrap();
        let out = fit(src, &params(1024, 768)).unwrap();

        assert_eq!(out.pixel(512, 0), BLACK);
        assert_eq!(out.pixel(512, 127), BLACK);
        assert_eq!(out.pixel(0, 128), RED);
        assert_eq!(out.pixel(1023, 639), RED);
        assert_eq!(out.pixel(512, 640), BLACK);
        assert_eq!(out.pixel(512, 767), BLACK);
    }

    #[test]
    fn tall_source_is_pillarboxed_with_custom_background() {
        let src = Raster::filled(50, 100, RED).unwrap();
        let fit_params = FitParams {
            background: Background::rgb(0, 255, 0),
            ..params(200, 100)
        };
        let out = fit(src, &fit_params).unwrap();

        // content 50x100 centred at x=75
        let green = Rgba([0, 255, 0, 255]);
        assert_eq!(out.pixel(74, 50), green);
        assert_eq!(out.pixel(75, 50), RED);
        assert_eq!(out.pixel(124, 50), RED);
        assert_eq!(out.pixel(125, 50), green);
    }

    #[test]
    fn matching_ratio_has_no_background_pixels() {
        let src = Raster::filled(800, 600, RED).unwrap();
        let out = fit(src, &params(1024, 768)).unwrap();
        assert!(out.as_image().pixels().all(|p| *p == RED));
    }

    #[test]
    fn transparent_source_is_not_filled_with_background() {
        // The letterbox is painted first; scaled content overwrites it
        // including alpha, so transparency in the source survives.
        let src = Raster::new(4, 2).unwrap();
        let out = fit(src, &params(8, 8)).unwrap();
        assert_eq!(out.pixel(4, 0), BLACK);
        assert_eq!(out.pixel(4, 4)[3], 0);
    }

    #[test]
    fn swapped_dimensions_pass_through() {
        let src = Raster::filled(768, 1024, RED).unwrap();
        let out = fit(src.clone(), &params(1024, 768)).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn swapped_dimensions_fit_when_passthrough_disabled() {
        let src = Raster::filled(768, 1024, RED).unwrap();
        let strict = FitParams {
            swapped_passthrough: false,
            ..params(1024, 768)
        };
        let out = fit(src, &strict).unwrap();
        assert_eq!(out.dimensions(), (1024, 768));
        // 768x1024 → 576x768 centred at x=224
        assert_eq!(out.pixel(223, 0), BLACK);
        assert_eq!(out.pixel(224, 0), RED);
    }

    #[test]
    fn exact_size_is_resampled_not_passed_through() {
        let src = Raster::filled(1024, 768, RED).unwrap();
        let out = fit(src, &params(1024, 768)).unwrap();
        assert_eq!(out.dimensions(), (1024, 768));
        assert_eq!(out.pixel(0, 0), RED);
    }
}
