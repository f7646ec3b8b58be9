//! One composition request, start to finish.
//!
//! ```text
//! base bytes ──decode──┐
//!                      ├─ fit(target) ── tile_overlay(watermark) ── encode PNG
//! watermark bytes ─decode┘
//! ```
//!
//! Stages run strictly in order and the first failure aborts the request:
//! nothing is retried and no partial image is produced. All rasters live
//! only for the duration of [`compose`].
//!
//! Geometry is planned from the decoded dimensions before any pixel work
//! (see [`plan_composition`]), which both validates the watermark early and
//! feeds the [`ComposeReport`] shown by the CLI.

use crate::imaging::{
    ErrorKind, FitParams, FitPlacement, FormatHint, ImageBackend, ImagingError, TileLayout,
    calculate_fit_placement, calculate_tile_layout,
};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("base image: {0}")]
    Base(#[source] ImagingError),
    #[error("watermark image: {0}")]
    Watermark(#[source] ImagingError),
    #[error(transparent)]
    Imaging(#[from] ImagingError),
}

impl ComposeError {
    pub fn imaging(&self) -> &ImagingError {
        match self {
            Self::Base(e) | Self::Watermark(e) | Self::Imaging(e) => e,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.imaging().kind()
    }
}

/// An encoded input image plus the file name that selects its decoder.
#[derive(Debug, Clone, Copy)]
pub struct ImageInput<'a> {
    pub name: &'a str,
    pub bytes: &'a [u8],
}

impl<'a> ImageInput<'a> {
    pub fn new(name: &'a str, bytes: &'a [u8]) -> Self {
        Self { name, bytes }
    }

    pub fn hint(&self) -> FormatHint {
        FormatHint::from_name(self.name)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ComposeRequest<'a> {
    pub base: ImageInput<'a>,
    pub watermark: ImageInput<'a>,
}

/// Geometry decided before pixels are touched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositionPlan {
    /// `None` when the compatibility passthrough skips the fit.
    pub fit: Option<FitPlacement>,
    pub output: (u32, u32),
    pub tiles: TileLayout,
}

/// What happened during a composition, for display and logging.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposeReport {
    pub base: (u32, u32),
    pub watermark: (u32, u32),
    pub plan: CompositionPlan,
    pub png_len: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct Composition {
    pub png: Vec<u8>,
    pub report: ComposeReport,
}

/// Plan the fit and tile geometry for the given decoded sizes.
pub fn plan_composition(
    base: (u32, u32),
    watermark: (u32, u32),
    params: &FitParams,
) -> Result<CompositionPlan, ImagingError> {
    let (fit, output) = if params.passes_through(base) {
        (None, base)
    } else {
        let target = params.target.dimensions();
        (Some(calculate_fit_placement(base, target)), target)
    };

    let tiles = calculate_tile_layout(output, watermark).ok_or_else(|| {
        ImagingError::InvalidGeometry(format!(
            "cannot tile a {}x{} watermark over a {}x{} image",
            watermark.0, watermark.1, output.0, output.1
        ))
    })?;

    Ok(CompositionPlan { fit, output, tiles })
}

/// Decode, fit, overlay, and encode one request.
#[tracing::instrument(
    name = "compose",
    skip_all,
    fields(base = request.base.name, watermark = request.watermark.name, target = %params.target)
)]
pub fn compose(
    backend: &impl ImageBackend,
    request: &ComposeRequest<'_>,
    params: &FitParams,
) -> Result<Composition, ComposeError> {
    let started = Instant::now();

    let base = backend
        .decode(request.base.bytes, request.base.hint())
        .map_err(ComposeError::Base)?;
    let watermark = backend
        .decode(request.watermark.bytes, request.watermark.hint())
        .map_err(ComposeError::Watermark)?;
    debug!(
        base = ?base.dimensions(),
        watermark = ?watermark.dimensions(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "decoded inputs"
    );

    let base_dims = base.dimensions();
    let watermark_dims = watermark.dimensions();
    let plan = plan_composition(base_dims, watermark_dims, params)?;

    let fitted = backend.fit(base, params)?;
    debug!(
        output = ?fitted.dimensions(),
        passthrough = plan.fit.is_none(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "fitted base"
    );

    let composed = backend.tile_overlay(&fitted, &watermark)?;
    debug!(
        columns = plan.tiles.columns,
        rows = plan.tiles.rows,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "overlaid watermark"
    );

    let png = backend.encode_png(&composed)?;
    let elapsed = started.elapsed();
    debug!(
        bytes = png.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "encoded PNG"
    );

    let report = ComposeReport {
        base: base_dims,
        watermark: watermark_dims,
        plan,
        png_len: png.len(),
        elapsed,
    };
    Ok(Composition { png, report })
}
