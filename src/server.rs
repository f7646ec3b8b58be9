//! HTTP upload service.
//!
//! Accepts `POST <endpoint>` with a `multipart/form-data` body holding two
//! file parts and answers with the composed PNG:
//!
//! | Part | Names accepted |
//! |---|---|
//! | Base image | `image`, `uploadfile` |
//! | Watermark | `watermark` |
//!
//! Each part's file name selects its decoder (see
//! [`FormatHint::from_name`](crate::imaging::FormatHint::from_name)). The
//! output canvas is fixed by configuration; nothing in the request can
//! change it.
//!
//! ## Statuses
//!
//! | Status | When |
//! |---|---|
//! | 200 | PNG body, `Content-Type: image/png` |
//! | 400 | not multipart, missing part, undecodable image, unusable geometry |
//! | 404 | any other path |
//! | 405 | any method but POST |
//! | 413 | body larger than `server.max_upload_bytes` |
//! | 500 | encode failure or a crashed worker |
//!
//! Error bodies are one line of plain text. Uploads stay in memory and are
//! dropped once the response is built.

use crate::config::{ConfigError, TilemarkConfig};
use crate::imaging::{ErrorKind, FitParams, RustBackend};
use crate::pipeline::{ComposeError, ComposeRequest, Composition, ImageInput, compose};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::header::{self, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Part names accepted for the base image. `image` is what
/// [`client`](crate::client) sends; `uploadfile` is accepted for older
/// clients.
pub const BASE_PARTS: [&str; 2] = ["image", "uploadfile"];
/// Part name of the watermark image.
pub const WATERMARK_PART: &str = "watermark";

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a request was turned away. Each variant maps to one status code.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("no such endpoint: {0}")]
    NotFound(String),
    #[error("method {0} not allowed, use POST")]
    MethodNotAllowed(Method),
    #[error("expected a multipart/form-data body")]
    NotMultipart,
    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: u64 },
    #[error("failed to read request body: {0}")]
    Body(String),
    #[error("malformed multipart body: {0}")]
    Multipart(#[from] multer::Error),
    #[error("missing file part '{0}'")]
    MissingPart(&'static str),
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl UploadError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotMultipart | Self::Body(_) | Self::Multipart(_) | Self::MissingPart(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Compose(e) => match e.kind() {
                ErrorKind::Decode | ErrorKind::InvalidGeometry => StatusCode::BAD_REQUEST,
                ErrorKind::Encode => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Per-process request settings shared by every connection.
#[derive(Debug, Clone)]
pub struct AppState {
    pub endpoint: String,
    pub max_upload_bytes: u64,
    pub params: FitParams,
    pub backend: RustBackend,
}

impl AppState {
    pub fn from_config(config: &TilemarkConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: config.server.endpoint.clone(),
            max_upload_bytes: config.server.max_upload_bytes,
            params: config.fit_params()?,
            backend: RustBackend::with_limits(config.decode_limits()),
        })
    }
}

/// A bound listener, ready to serve.
pub struct Server {
    listener: TcpListener,
    state: Arc<AppState>,
}

impl Server {
    pub async fn bind(addr: &str, state: AppState) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        Ok(Self {
            listener,
            state: Arc::new(state),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `shutdown` resolves, then let open connections finish
    /// their current request before returning.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let addr = self.local_addr()?;
        info!(%addr, endpoint = %self.state.endpoint, "listening");

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        connections.spawn(serve_connection(
                            stream,
                            peer,
                            Arc::clone(&self.state),
                            stop_rx.clone(),
                        ));
                    }
                    Err(err) => {
                        warn!(error = %err, "accept failed");
                        if let Some(pause) = accept_backoff(&err) {
                            tokio::time::sleep(pause).await;
                        }
                    }
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                () = &mut shutdown => break,
            }
        }

        info!(open = connections.len(), "shutting down");
        let _ = stop_tx.send(true);
        while connections.join_next().await.is_some() {}
        Ok(())
    }
}

/// How long to pause after a failed `accept`.
///
/// Errors tied to one half-open connection are retried at once. Anything
/// else (typically running out of file descriptors) would fail again
/// immediately, so the loop sleeps instead of spinning.
fn accept_backoff(err: &std::io::Error) -> Option<Duration> {
    use std::io::ErrorKind::{ConnectionAborted, ConnectionRefused, ConnectionReset};
    match err.kind() {
        ConnectionAborted | ConnectionRefused | ConnectionReset => None,
        _ => Some(ACCEPT_BACKOFF),
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    state: Arc<AppState>,
    mut stop: watch::Receiver<bool>,
) {
    let service = service_fn(move |req| {
        let state = Arc::clone(&state);
        async move { Ok::<_, Infallible>(handle(&state, req).await) }
    });
    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = stop.changed() => {
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };
    if let Err(err) = result {
        debug!(%peer, error = %err, "connection closed with error");
    }
}

async fn handle(state: &AppState, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match process(state, req).await {
        Ok(composition) => {
            info!(
                %method,
                %path,
                base = ?composition.report.base,
                bytes = composition.png.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "composed"
            );
            png_response(composition.png)
        }
        Err(err) => {
            let status = err.status();
            warn!(%method, %path, status = status.as_u16(), error = %err, "rejected");
            error_response(status, &err)
        }
    }
}

async fn process(state: &AppState, req: Request<Incoming>) -> Result<Composition, UploadError> {
    if req.uri().path() != state.endpoint {
        return Err(UploadError::NotFound(req.uri().path().to_string()));
    }
    if req.method() != Method::POST {
        return Err(UploadError::MethodNotAllowed(req.method().clone()));
    }

    let boundary = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| multer::parse_boundary(ct).ok())
        .ok_or(UploadError::NotMultipart)?;

    let limit = state.max_upload_bytes;
    let declared = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(UploadError::TooLarge { limit });
    }

    let body = Limited::new(req.into_body(), usize::try_from(limit).unwrap_or(usize::MAX))
        .collect()
        .await
        .map_err(|err| {
            if err.downcast_ref::<LengthLimitError>().is_some() {
                UploadError::TooLarge { limit }
            } else {
                UploadError::Body(err.to_string())
            }
        })?
        .to_bytes();

    let upload = read_upload(body, boundary).await?;
    debug!(
        base = %upload.base.file_name,
        base_bytes = upload.base.bytes.len(),
        watermark = %upload.watermark.file_name,
        watermark_bytes = upload.watermark.bytes.len(),
        "received upload"
    );

    let backend = state.backend;
    let params = state.params;
    let composed = tokio::task::spawn_blocking(move || {
        let request = ComposeRequest {
            base: upload.base.input(),
            watermark: upload.watermark.input(),
        };
        compose(&backend, &request, &params)
    })
    .await
    .map_err(|err| UploadError::Internal(err.to_string()))??;

    Ok(composed)
}

/// One file part, held in memory.
#[derive(Debug)]
struct UploadedFile {
    file_name: String,
    bytes: Bytes,
}

impl UploadedFile {
    fn input(&self) -> ImageInput<'_> {
        ImageInput::new(&self.file_name, &self.bytes)
    }
}

#[derive(Debug)]
struct Upload {
    base: UploadedFile,
    watermark: UploadedFile,
}

/// Pull the base and watermark parts out of a complete multipart body.
///
/// Only parts carrying a file name count. When a name repeats, the first
/// part wins.
async fn read_upload(body: Bytes, boundary: String) -> Result<Upload, UploadError> {
    let stream = futures::stream::once(async move { Ok::<Bytes, Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut base = None;
    let mut watermark = None;
    while let Some(field) = multipart.next_field().await? {
        let (Some(name), Some(file_name)) = (field.name(), field.file_name()) else {
            continue;
        };
        let slot = if BASE_PARTS.contains(&name) {
            &mut base
        } else if name == WATERMARK_PART {
            &mut watermark
        } else {
            continue;
        };
        if slot.is_some() {
            continue;
        }
        let file_name = file_name.to_string();
        let bytes = field.bytes().await?;
        *slot = Some(UploadedFile { file_name, bytes });
    }

    Ok(Upload {
        base: base.ok_or(UploadError::MissingPart(BASE_PARTS[0]))?,
        watermark: watermark.ok_or(UploadError::MissingPart(WATERMARK_PART))?,
    })
}

fn png_response(png: Vec<u8>) -> Response<Full<Bytes>> {
    let len = png.len();
    let mut response = Response::new(Full::new(Bytes::from(png)));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    response
}

fn error_response(status: StatusCode, err: &UploadError) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(format!("{err}\n"))));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    if status == StatusCode::METHOD_NOT_ALLOWED {
        headers.insert(header::ALLOW, HeaderValue::from_static("POST"));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{FormatHint, ImagingError};

    const BOUNDARY: &str = "tilemark-test-boundary";

    /// `(part name, file name, content)`; a `None` file name makes a plain
    /// form field.
    fn multipart_body(parts: &[(&str, Option<&str>, &str)]) -> Bytes {
        let mut body = Vec::new();
        for (name, file_name, content) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file_name {
                Some(f) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(content.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Bytes::from(body)
    }

    async fn read(parts: &[(&str, Option<&str>, &str)]) -> Result<Upload, UploadError> {
        read_upload(multipart_body(parts), BOUNDARY.to_string()).await
    }

    // =========================================================================
    // read_upload
    // =========================================================================

    #[tokio::test]
    async fn reads_image_and_watermark_parts() {
        let upload = read(&[
            ("image", Some("photo.jpg"), "base-bytes"),
            ("watermark", Some("logo.png"), "mark"),
        ])
        .await
        .unwrap();

        assert_eq!(upload.base.file_name, "photo.jpg");
        assert_eq!(&upload.base.bytes[..], b"base-bytes");
        assert_eq!(upload.watermark.file_name, "logo.png");
        assert_eq!(upload.watermark.input().hint(), FormatHint::Png);
    }

    #[tokio::test]
    async fn accepts_legacy_base_part_name() {
        let upload = read(&[
            ("watermark", Some("logo.png"), "mark"),
            ("uploadfile", Some("photo.JPG"), "base"),
        ])
        .await
        .unwrap();
        assert_eq!(upload.base.file_name, "photo.JPG");
    }

    #[tokio::test]
    async fn first_part_wins_and_plain_fields_are_ignored() {
        let upload = read(&[
            ("image", None, "not a file"),
            ("note", Some("x.txt"), "ignored"),
            ("image", Some("first.png"), "1"),
            ("uploadfile", Some("second.png"), "2"),
            ("watermark", Some("logo.png"), "m"),
        ])
        .await
        .unwrap();
        assert_eq!(upload.base.file_name, "first.png");
        assert_eq!(&upload.base.bytes[..], b"1");
    }

    #[tokio::test]
    async fn missing_watermark_is_reported() {
        let err = read(&[("image", Some("photo.jpg"), "base")])
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::MissingPart("watermark")));
        assert_eq!(err.to_string(), "missing file part 'watermark'");
    }

    #[tokio::test]
    async fn missing_base_is_reported() {
        let err = read(&[("watermark", Some("logo.png"), "m")])
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::MissingPart("image")));
    }

    #[tokio::test]
    async fn truncated_body_is_malformed() {
        let body = Bytes::from(format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"a.png\"\r\n\r\nabc"
        ));
        let err = read_upload(body, BOUNDARY.to_string()).await.unwrap_err();
        assert!(matches!(err, UploadError::Multipart(_)));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    // =========================================================================
    // Status mapping
    // =========================================================================

    #[test]
    fn statuses_follow_error_kind() {
        let decode = UploadError::Compose(ComposeError::Base(ImagingError::Decode {
            format: FormatHint::Jpeg,
            message: "bad".into(),
        }));
        let geometry = UploadError::Compose(ComposeError::Imaging(
            ImagingError::InvalidGeometry("zero".into()),
        ));
        let encode = UploadError::Compose(ComposeError::Imaging(ImagingError::Encode(
            "io".into(),
        )));

        assert_eq!(decode.status(), StatusCode::BAD_REQUEST);
        assert_eq!(geometry.status(), StatusCode::BAD_REQUEST);
        assert_eq!(encode.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            UploadError::TooLarge { limit: 10 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            UploadError::NotFound("/x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            UploadError::MethodNotAllowed(Method::GET).status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(UploadError::NotMultipart.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn error_response_is_plain_text() {
        let response = error_response(
            StatusCode::METHOD_NOT_ALLOWED,
            &UploadError::MethodNotAllowed(Method::GET),
        );
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(response.headers()[header::ALLOW], "POST");
    }

    #[test]
    fn png_response_sets_length() {
        let response = png_response(vec![1, 2, 3]);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "3");
    }

    #[test]
    fn state_from_default_config() {
        let state = AppState::from_config(&TilemarkConfig::default()).unwrap();
        assert_eq!(state.endpoint, "/watermark");
        assert_eq!(state.params.target.dimensions(), (1024, 768));
    }

    #[test]
    fn accept_backs_off_on_resource_errors() {
        use std::io::{Error, ErrorKind};

        // EMFILE
        let exhausted = Error::from_raw_os_error(24);
        assert_eq!(accept_backoff(&exhausted), Some(ACCEPT_BACKOFF));
        let other = Error::other("out of memory");
        assert_eq!(accept_backoff(&other), Some(ACCEPT_BACKOFF));

        for kind in [
            ErrorKind::ConnectionAborted,
            ErrorKind::ConnectionReset,
            ErrorKind::ConnectionRefused,
        ] {
            assert_eq!(accept_backoff(&Error::from(kind)), None, "{kind:?}");
        }
    }
}
