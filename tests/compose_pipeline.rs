//! End-to-end composition over encoded bytes, through the public API only.
//!
//! Fixtures are generated with the `image` crate at test time; the checks
//! look at decoded output pixels rather than intermediate rasters.

use image::{ExtendedColorType, ImageEncoder, ImageFormat, Rgba, RgbaImage};
use tilemark::imaging::{Background, ErrorKind, FitParams, RustBackend, TargetResolution};
use tilemark::pipeline::{ComposeError, ComposeRequest, ImageInput, compose};

fn png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba(rgba));
    let mut out = Vec::new();
    image::codecs::png::PngEncoder::new(&mut out)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgba8)
        .unwrap();
    out
}

fn jpeg(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
    let mut out = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 95)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    out
}

fn decode_png(bytes: &[u8]) -> RgbaImage {
    image::load_from_memory_with_format(bytes, ImageFormat::Png)
        .unwrap()
        .into_rgba8()
}

fn params(width: u32, height: u32) -> FitParams {
    FitParams::new(TargetResolution::new(width, height).unwrap())
}

fn close(actual: Rgba<u8>, expected: [u8; 4], tolerance: u8) -> bool {
    actual
        .0
        .iter()
        .zip(expected)
        .all(|(a, e)| a.abs_diff(e) <= tolerance)
}

#[test]
fn wide_photo_is_letterboxed_onto_the_canvas() {
    let base = jpeg(2000, 1000, [120, 160, 200]);
    let mark = png(100, 50, [255, 255, 255, 0]);
    let request = ComposeRequest {
        base: ImageInput::new("photo.jpg", &base),
        watermark: ImageInput::new("logo.png", &mark),
    };

    let result = compose(&RustBackend::new(), &request, &params(1024, 768)).unwrap();
    let out = decode_png(&result.png);

    assert_eq!(out.dimensions(), (1024, 768));
    // 1024x512 content at y=128: bars above and below, photo in between
    assert_eq!(out.get_pixel(512, 0).0, [0, 0, 0, 255]);
    assert_eq!(out.get_pixel(512, 127).0, [0, 0, 0, 255]);
    assert_eq!(out.get_pixel(512, 640).0, [0, 0, 0, 255]);
    assert_eq!(out.get_pixel(0, 767).0, [0, 0, 0, 255]);
    assert!(close(*out.get_pixel(512, 384), [120, 160, 200, 255], 4));
    assert!(close(*out.get_pixel(3, 130), [120, 160, 200, 255], 4));
}

#[test]
fn tall_photo_is_pillarboxed_with_custom_background() {
    let base = png(300, 600, [10, 200, 10, 255]);
    let mark = png(7, 7, [0, 0, 0, 0]);
    let request = ComposeRequest {
        base: ImageInput::new("tall.PNG", &base),
        watermark: ImageInput::new("clear.png", &mark),
    };
    let params = FitParams {
        background: Background::rgb(255, 255, 255),
        ..params(400, 300)
    };

    let result = compose(&RustBackend::new(), &request, &params).unwrap();
    let out = decode_png(&result.png);

    // 150x300 content at x=125
    assert_eq!(out.dimensions(), (400, 300));
    assert_eq!(out.get_pixel(124, 150).0, [255, 255, 255, 255]);
    assert_eq!(out.get_pixel(275, 150).0, [255, 255, 255, 255]);
    assert_eq!(out.get_pixel(200, 150).0, [10, 200, 10, 255]);
}

#[test]
fn opaque_watermark_covers_every_pixel() {
    let base = jpeg(640, 480, [0, 0, 255]);
    let mark = png(33, 17, [255, 0, 0, 255]);
    let request = ComposeRequest {
        base: ImageInput::new("photo.jpeg", &base),
        watermark: ImageInput::new("red.png", &mark),
    };

    let result = compose(&RustBackend::new(), &request, &params(320, 200)).unwrap();
    let out = decode_png(&result.png);

    assert_eq!(out.dimensions(), (320, 200));
    assert!(out.pixels().all(|p| p.0 == [255, 0, 0, 255]));
}

#[test]
fn half_transparent_watermark_blends_over_letterbox() {
    let base = png(200, 100, [0, 0, 0, 255]);
    let mark = png(5, 5, [255, 255, 255, 128]);
    let request = ComposeRequest {
        base: ImageInput::new("black.png", &base),
        watermark: ImageInput::new("white.png", &mark),
    };

    let result = compose(&RustBackend::new(), &request, &params(200, 200)).unwrap();
    let out = decode_png(&result.png);

    assert!(out.pixels().all(|p| p.0 == [128, 128, 128, 255]));
}

#[test]
fn swapped_size_passes_through_unscaled() {
    let base = png(768, 1024, [50, 60, 70, 255]);
    let mark = png(10, 10, [0, 0, 0, 0]);
    let request = ComposeRequest {
        base: ImageInput::new("portrait.png", &base),
        watermark: ImageInput::new("mark.png", &mark),
    };

    let result = compose(&RustBackend::new(), &request, &params(1024, 768)).unwrap();
    assert_eq!(result.report.plan.fit, None);
    assert_eq!(decode_png(&result.png).dimensions(), (768, 1024));

    let always_fit = FitParams {
        swapped_passthrough: false,
        ..params(1024, 768)
    };
    let result = compose(&RustBackend::new(), &request, &always_fit).unwrap();
    assert_eq!(decode_png(&result.png).dimensions(), (1024, 768));
}

#[test]
fn png_named_as_jpeg_is_a_decode_error() {
    let base = png(20, 20, [1, 2, 3, 255]);
    let mark = png(4, 4, [0, 0, 0, 0]);
    let request = ComposeRequest {
        base: ImageInput::new("upload", &base),
        watermark: ImageInput::new("mark.png", &mark),
    };

    let err = compose(&RustBackend::new(), &request, &params(64, 48)).unwrap_err();
    assert!(matches!(err, ComposeError::Base(_)));
    assert_eq!(err.kind(), ErrorKind::Decode);
}

#[test]
fn corrupt_watermark_is_a_decode_error() {
    let base = jpeg(32, 32, [9, 9, 9]);
    let request = ComposeRequest {
        base: ImageInput::new("photo.jpg", &base),
        watermark: ImageInput::new("logo.png", b"\x89PNG\r\n\x1a\nnot really"),
    };

    let err = compose(&RustBackend::new(), &request, &params(64, 48)).unwrap_err();
    assert!(matches!(err, ComposeError::Watermark(_)));
    assert_eq!(err.kind(), ErrorKind::Decode);
}
