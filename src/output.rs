//! CLI output formatting.
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.
//!
//! # Output Format
//!
//! ## Compose
//!
//! ```text
//! Base: photo.jpg (2000x1000)
//!     Fit: 1024x512 at (0, 128), scale 0.512, letterboxed
//! Watermark: logo.png (100x50)
//!     Tiles: 13 x 17 (1300x850) at (-138, -41)
//! Output: result.png (1024x768, 412.7 KB) in 85 ms
//! ```
//!
//! ## Post
//!
//! ```text
//! Status: 200 OK
//! Saved: result.png (412.7 KB)
//! ```

use crate::client::PostOutcome;
use crate::imaging::{FitPlacement, LimitingAxis};
use crate::pipeline::ComposeReport;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn dims((w, h): (u32, u32)) -> String {
    format!("{w}x{h}")
}

/// Human-readable byte count, one decimal above 1 KB.
fn format_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{bytes} B")
    }
}

fn fit_line(fit: Option<&FitPlacement>, output: (u32, u32)) -> String {
    let Some(fit) = fit else {
        return "Fit: skipped (swapped-dimension passthrough)".to_string();
    };
    let c = fit.content;
    let padding = if fit.is_padding_free(output) {
        "no padding"
    } else {
        match fit.limiting {
            LimitingAxis::Width => "letterboxed",
            LimitingAxis::Height => "pillarboxed",
        }
    };
    format!(
        "Fit: {} at ({}, {}), scale {:.3}, {}",
        dims((c.width, c.height)),
        c.x,
        c.y,
        fit.scale,
        padding
    )
}

// ============================================================================
// compose
// ============================================================================

/// Format the summary of a local composition.
pub fn format_compose_output(
    report: &ComposeReport,
    base_name: &str,
    watermark_name: &str,
    outfile: &Path,
) -> Vec<String> {
    let plan = &report.plan;
    let tiles = &plan.tiles;
    vec![
        format!("Base: {} ({})", base_name, dims(report.base)),
        format!("{}{}", indent(1), fit_line(plan.fit.as_ref(), plan.output)),
        format!("Watermark: {} ({})", watermark_name, dims(report.watermark)),
        format!(
            "{}Tiles: {} x {} ({}) at ({}, {})",
            indent(1),
            tiles.columns,
            tiles.rows,
            dims((tiles.mosaic_width(), tiles.mosaic_height())),
            tiles.offset_x,
            tiles.offset_y
        ),
        format!(
            "Output: {} ({}, {}) in {} ms",
            outfile.display(),
            dims(plan.output),
            format_size(report.png_len),
            report.elapsed.as_millis()
        ),
    ]
}

pub fn print_compose_output(
    report: &ComposeReport,
    base_name: &str,
    watermark_name: &str,
    outfile: &Path,
) {
    for line in format_compose_output(report, base_name, watermark_name, outfile) {
        println!("{}", line);
    }
}

// ============================================================================
// post
// ============================================================================

/// Format the result of posting to the upload service.
pub fn format_post_output(outcome: &PostOutcome, outfile: &Path) -> Vec<String> {
    vec![
        format!("Status: {}", outcome.status),
        format!(
            "Saved: {} ({})",
            outfile.display(),
            format_size(outcome.bytes)
        ),
    ]
}

pub fn print_post_output(outcome: &PostOutcome, outfile: &Path) {
    for line in format_post_output(outcome, outfile) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{FitParams, TargetResolution};
    use crate::pipeline::plan_composition;
    use std::time::Duration;

    fn report(base: (u32, u32), watermark: (u32, u32), params: &FitParams) -> ComposeReport {
        ComposeReport {
            base,
            watermark,
            plan: plan_composition(base, watermark, params).unwrap(),
            png_len: 422_605,
            elapsed: Duration::from_millis(85),
        }
    }

    fn params() -> FitParams {
        FitParams::new(TargetResolution::new(1024, 768).unwrap())
    }

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn format_size_units() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn compose_output_letterboxed() {
        let lines = format_compose_output(
            &report((2000, 1000), (100, 50), &params()),
            "photo.jpg",
            "logo.png",
            Path::new("result.png"),
        );
        assert_eq!(
            lines,
            vec![
                "Base: photo.jpg (2000x1000)",
                "    Fit: 1024x512 at (0, 128), scale 0.512, letterboxed",
                "Watermark: logo.png (100x50)",
                "    Tiles: 13 x 17 (1300x850) at (-138, -41)",
                "Output: result.png (1024x768, 412.7 KB) in 85 ms",
            ]
        );
    }

    #[test]
    fn compose_output_pillarboxed() {
        let lines = format_compose_output(
            &report((600, 1200), (100, 50), &params()),
            "tall.jpg",
            "logo.png",
            Path::new("out.png"),
        );
        assert_eq!(
            lines[1],
            "    Fit: 384x768 at (320, 0), scale 0.640, pillarboxed"
        );
    }

    #[test]
    fn compose_output_matching_ratio() {
        let lines = format_compose_output(
            &report((800, 600), (100, 50), &params()),
            "a.jpg",
            "b.png",
            Path::new("out.png"),
        );
        assert!(lines[1].ends_with("no padding"), "{}", lines[1]);
    }

    #[test]
    fn compose_output_passthrough() {
        let lines = format_compose_output(
            &report((768, 1024), (100, 50), &params()),
            "a.jpg",
            "b.png",
            Path::new("out.png"),
        );
        assert_eq!(lines[1], "    Fit: skipped (swapped-dimension passthrough)");
        assert!(lines[4].contains("(768x1024,"), "{}", lines[4]);
    }

    #[test]
    fn post_output() {
        let outcome = PostOutcome {
            status: "200 OK".to_string(),
            bytes: 2048,
        };
        assert_eq!(
            format_post_output(&outcome, Path::new("result.png")),
            vec!["Status: 200 OK", "Saved: result.png (2.0 KB)"]
        );
    }
}
