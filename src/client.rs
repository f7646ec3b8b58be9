//! Command-line client for the upload service.
//!
//! Posts a base image and a watermark as a two-part multipart form and
//! writes the composed PNG from the response to disk. The part names match
//! what [`server`](crate::server) expects: `image` and `watermark`.

use reqwest::blocking::{Client, multipart::Form};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Multipart field carrying the base image.
pub const BASE_FIELD: &str = "image";
/// Multipart field carrying the watermark image.
pub const WATERMARK_FIELD: &str = "watermark";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server rejected the upload ({status}): {message}")]
    Rejected { status: String, message: String },
    #[error("cannot write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// What came back from a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostOutcome {
    /// Status line as sent by the server, e.g. `200 OK`.
    pub status: String,
    /// Bytes written to the output file.
    pub bytes: usize,
}

/// Post `base` and `watermark` to `url` and save the response to `outfile`.
///
/// The response body is only written when the server answers with a
/// success status; otherwise its text becomes the error message.
pub fn post_files(
    url: &str,
    base: &Path,
    watermark: &Path,
    outfile: &Path,
) -> Result<PostOutcome, ClientError> {
    let form = Form::new()
        .file(BASE_FIELD, base)
        .map_err(|source| read_error(base, source))?
        .file(WATERMARK_FIELD, watermark)
        .map_err(|source| read_error(watermark, source))?;

    debug!(%url, base = %base.display(), watermark = %watermark.display(), "posting upload");
    let response = Client::new().post(url).multipart(form).send()?;
    let status = response.status().to_string();
    let success = response.status().is_success();
    let body = response.bytes()?;

    if !success {
        return Err(ClientError::Rejected {
            status,
            message: String::from_utf8_lossy(&body).trim().to_string(),
        });
    }

    fs::write(outfile, &body).map_err(|source| ClientError::Write {
        path: outfile.display().to_string(),
        source,
    })?;
    info!(%status, bytes = body.len(), outfile = %outfile.display(), "saved response");

    Ok(PostOutcome {
        status,
        bytes: body.len(),
    })
}

fn read_error(path: &Path, source: std::io::Error) -> ClientError {
    ClientError::Read {
        path: path.display().to_string(),
        source,
    }
}
