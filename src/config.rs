//! Configuration module.
//!
//! Handles loading, validating, and merging `tilemark.toml`. Stock defaults
//! are overridden by whatever the user file sets; everything else keeps its
//! default.
//!
//! ## Config File Location
//!
//! `tilemark.toml` in the working directory is picked up automatically.
//! Pass `--config <path>` to load a specific file instead (it must exist).
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [output]
//! width = 1024              # Fixed output canvas size
//! height = 768
//!
//! [resize]
//! background = "#000000"    # Letterbox colour (#RRGGBB, always opaque)
//! swapped_passthrough = true
//!
//! [limits]
//! max_image_dimension = 16384
//!
//! [server]
//! bind = "0.0.0.0:3210"
//! endpoint = "/watermark"
//! max_upload_bytes = 33554432
//!
//! [client]
//! url = "http://localhost:3210/watermark"
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse; override just the values you want:
//!
//! ```toml
//! [output]
//! width = 1920
//! height = 1080
//! ```
//!
//! A misspelled key is an error rather than a silently ignored setting.

use crate::imaging::{Background, DecodeLimits, FitParams, TargetResolution};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

/// File name looked up in a directory by [`load_config`].
pub const CONFIG_FILE_NAME: &str = "tilemark.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Contents of `tilemark.toml`. Every field has a default, so a user file
/// only lists what it changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TilemarkConfig {
    /// Output canvas size.
    pub output: OutputConfig,
    /// Letterbox fit behaviour.
    pub resize: ResizeConfig,
    /// Decoder safety limits.
    pub limits: LimitsConfig,
    /// HTTP upload service.
    pub server: ServerConfig,
    /// HTTP client used by `tilemark post`.
    pub client: ClientConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl TilemarkConfig {
    /// Reject values the pipeline or server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output.width == 0 || self.output.height == 0 {
            return Err(ConfigError::Validation(
                "output.width and output.height must be positive".into(),
            ));
        }
        if Background::parse(&self.resize.background).is_none() {
            return Err(ConfigError::Validation(format!(
                "resize.background must be #RRGGBB, got {:?}",
                self.resize.background
            )));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::Validation(
                "limits.max_image_dimension must be positive".into(),
            ));
        }
        if self.server.bind.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "server.bind must be host:port, got {:?}",
                self.server.bind
            )));
        }
        if !self.server.endpoint.starts_with('/') {
            return Err(ConfigError::Validation(
                "server.endpoint must start with '/'".into(),
            ));
        }
        if self.server.max_upload_bytes == 0 {
            return Err(ConfigError::Validation(
                "server.max_upload_bytes must be positive".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Fit parameters for the configured output canvas.
    pub fn fit_params(&self) -> Result<FitParams, ConfigError> {
        self.fit_params_for(self.output.width, self.output.height)
    }

    /// Fit parameters for an explicit canvas, keeping the configured
    /// background and passthrough setting.
    pub fn fit_params_for(&self, width: u32, height: u32) -> Result<FitParams, ConfigError> {
        let target = TargetResolution::new(width, height)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        let background = Background::parse(&self.resize.background).ok_or_else(|| {
            ConfigError::Validation(format!(
                "resize.background must be #RRGGBB, got {:?}",
                self.resize.background
            ))
        })?;
        Ok(FitParams {
            target,
            background,
            swapped_passthrough: self.resize.swapped_passthrough,
        })
    }

    pub fn decode_limits(&self) -> DecodeLimits {
        DecodeLimits {
            max_dimension: self.limits.max_image_dimension,
        }
    }
}

/// Output canvas size. Fixed per deployment; requests cannot change it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
        }
    }
}

/// Letterbox fit settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResizeConfig {
    /// Fill colour for the letterbox/pillarbox margin.
    pub background: String,
    /// Return images whose height equals the output width and whose width
    /// equals the output height unchanged, skipping the fit.
    pub swapped_passthrough: bool,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            background: "#000000".to_string(),
            swapped_passthrough: true,
        }
    }
}

/// Decoder limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Largest accepted width or height of an input image.
    pub max_image_dimension: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_image_dimension: DecodeLimits::default().max_dimension,
        }
    }
}

/// HTTP upload service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Listen address as `host:port`.
    pub bind: String,
    /// Path accepting the multipart upload.
    pub endpoint: String,
    /// Largest accepted request body.
    pub max_upload_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3210".to_string(),
            endpoint: "/watermark".to_string(),
            max_upload_bytes: 32 * 1024 * 1024,
        }
    }
}

/// Client settings for `tilemark post`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3210/watermark".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Blending threads. Unset means one per core; larger values are
    /// clamped to the core count.
    pub max_processes: Option<usize>,
}

/// Worker threads for blending: `max_processes` if set, never more than the
/// number of cores.
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// [`TilemarkConfig::default`] as a TOML table: the bottom layer that user
/// files are merged onto.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(TilemarkConfig::default()).expect("default config must serialize")
}

/// Merge `overlay` onto `base`. Tables merge per key, recursively; any other
/// overlay value replaces the base value. Base keys the overlay does not
/// mention survive.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
pub fn read_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Apply the overlay (if any), deserialize, validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<TilemarkConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: TilemarkConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `tilemark.toml` from `dir` if present, otherwise the stock defaults.
pub fn load_config(dir: &Path) -> Result<TilemarkConfig, ConfigError> {
    let path = dir.join(CONFIG_FILE_NAME);
    let overlay = if path.exists() {
        Some(read_raw_config(&path)?)
    } else {
        None
    };
    resolve_config(stock_defaults_value(), overlay)
}

/// Load an explicitly named config file. Missing files are an error.
pub fn load_config_file(path: &Path) -> Result<TilemarkConfig, ConfigError> {
    let overlay = read_raw_config(path)?;
    resolve_config(stock_defaults_value(), Some(overlay))
}

/// Returns a fully-commented stock `tilemark.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Tilemark Configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Output canvas
# ---------------------------------------------------------------------------
[output]
# Every composed image is exactly this size. Uploads cannot change it.
width = 1024
height = 768

# ---------------------------------------------------------------------------
# Letterbox fit
# ---------------------------------------------------------------------------
[resize]
# Colour of the bars added when the input's aspect ratio differs from the
# output's. Always opaque: #RRGGBB only.
background = "#000000"

# When an input's height equals the output width AND its width equals the
# output height, skip the fit and use the input as is. Kept for
# compatibility with earlier deployments; set to false to always fit.
swapped_passthrough = true

# ---------------------------------------------------------------------------
# Decoder limits
# ---------------------------------------------------------------------------
[limits]
# Largest width or height accepted for base and watermark images.
max_image_dimension = 16384

# ---------------------------------------------------------------------------
# Upload service (tilemark serve)
# ---------------------------------------------------------------------------
[server]
bind = "0.0.0.0:3210"
endpoint = "/watermark"
# Requests with a larger body are rejected with 413.
max_upload_bytes = 33554432

# ---------------------------------------------------------------------------
# Upload client (tilemark post)
# ---------------------------------------------------------------------------
[client]
url = "http://localhost:3210/watermark"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum worker threads used for pixel blending.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
