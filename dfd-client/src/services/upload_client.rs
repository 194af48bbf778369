//! Upload transport
//!
//! One asynchronous call per upload returning either the raw success body or
//! a typed [`TransportError`]. Progress is reported on a channel while the
//! request body streams out.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dfd_common::config::{ClientConfig, MAX_UPLOAD_BYTES};
use reqwest::multipart;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

use crate::error::{SubmissionError, TransportError, ValidationError};
use crate::models::VideoFile;
use crate::services::response_parser::extract_error_detail;

const USER_AGENT: &str = concat!("dfd-client/", env!("CARGO_PKG_VERSION"));

/// Size of each streamed body chunk; one progress event per chunk
pub const UPLOAD_CHUNK_SIZE: usize = 256 * 1024;

/// Bytes handed to the transport so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub sent_bytes: u64,
    pub total_bytes: u64,
}

impl UploadProgress {
    /// Percentage sent; `None` when the total is unknown
    pub fn percent(&self) -> Option<f64> {
        if self.total_bytes == 0 {
            return None;
        }
        let sent = self.sent_bytes.min(self.total_bytes) as f64;
        Some(sent * 100.0 / self.total_bytes as f64)
    }
}

/// Multipart request contents
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    /// Sent as the `video` part
    pub file: VideoFile,
    /// Sent as the `timestamp` part (RFC 3339)
    pub timestamp: DateTime<Utc>,
}

impl UploadRequest {
    pub fn new(file: VideoFile) -> Self {
        Self {
            file,
            timestamp: Utc::now(),
        }
    }
}

/// Successful (2xx) response
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Transport failure, including failure to read the staged file
#[derive(Debug, Clone, PartialEq)]
pub enum UploadFailure {
    Validation(ValidationError),
    Transport(TransportError),
}

impl From<TransportError> for UploadFailure {
    fn from(err: TransportError) -> Self {
        UploadFailure::Transport(err)
    }
}

impl From<ValidationError> for UploadFailure {
    fn from(err: ValidationError) -> Self {
        UploadFailure::Validation(err)
    }
}

impl From<UploadFailure> for SubmissionError {
    fn from(failure: UploadFailure) -> Self {
        match failure {
            UploadFailure::Validation(e) => SubmissionError::Validation(e),
            UploadFailure::Transport(e) => SubmissionError::Transport(e),
        }
    }
}

impl std::fmt::Display for UploadFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadFailure::Validation(e) => write!(f, "{}", e),
            UploadFailure::Transport(e) => write!(f, "{}", e),
        }
    }
}

/// Sends one multipart upload
///
/// Implementations must not fail when the progress receiver has been
/// dropped.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn upload(
        &self,
        url: &str,
        request: &UploadRequest,
        progress: mpsc::UnboundedSender<UploadProgress>,
    ) -> Result<TransportResponse, UploadFailure>;
}

/// reqwest-backed transport
pub struct HttpUploadClient {
    http_client: reqwest::Client,
    timeout: Duration,
}

impl HttpUploadClient {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network {
                url: String::new(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            http_client,
            timeout,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        Self::new(config.request_timeout)
    }

    fn classify(&self, url: &str, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout {
                url: url.to_string(),
                after: self.timeout,
            }
        } else {
            TransportError::Network {
                url: url.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl UploadTransport for HttpUploadClient {
    async fn upload(
        &self,
        url: &str,
        request: &UploadRequest,
        progress: mpsc::UnboundedSender<UploadProgress>,
    ) -> Result<TransportResponse, UploadFailure> {
        let (chunks, total_bytes) = read_chunks(&request.file).await?;

        tracing::debug!(
            url = url,
            file = %request.file.file_name,
            total_bytes = total_bytes,
            chunks = chunks.len(),
            "Starting multipart upload"
        );

        let mut sent_bytes = 0u64;
        let body_stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
            sent_bytes += chunk.len() as u64;
            let _ = progress.send(UploadProgress {
                sent_bytes,
                total_bytes,
            });
            Ok::<_, std::io::Error>(chunk)
        }));

        let video_part =
            multipart::Part::stream_with_length(reqwest::Body::wrap_stream(body_stream), total_bytes)
                .file_name(request.file.file_name.clone())
                .mime_str(request.file.content_type())
                .map_err(|e| self.classify(url, e))?;

        let form = multipart::Form::new()
            .part("video", video_part)
            .text("timestamp", request.timestamp.to_rfc3339());

        let response = self
            .http_client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.classify(url, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(
                url = url,
                status = status.as_u16(),
                "Analysis service returned error status"
            );
            return Err(TransportError::Status {
                code: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
                detail: extract_error_detail(&body),
            }
            .into());
        }

        tracing::debug!(
            url = url,
            status = status.as_u16(),
            body_len = body.len(),
            "Upload completed"
        );

        Ok(TransportResponse {
            status: status.as_u16(),
            body,
        })
    }
}

/// Read the file into fixed-size chunks
///
/// Reading stops with a validation error as soon as the file turns out to
/// be larger than the size recorded at selection, so memory use never
/// exceeds that size (itself at most [`MAX_UPLOAD_BYTES`]) plus one chunk.
async fn read_chunks(file: &VideoFile) -> Result<(Vec<Vec<u8>>, u64), ValidationError> {
    if file.size_bytes > MAX_UPLOAD_BYTES {
        return Err(ValidationError::FileTooLarge {
            file_name: file.file_name.clone(),
            size_bytes: file.size_bytes,
            limit_bytes: MAX_UPLOAD_BYTES,
        });
    }

    let unreadable = |e: std::io::Error| ValidationError::Unreadable {
        path: file.path.display().to_string(),
        reason: e.to_string(),
    };

    let mut handle = tokio::fs::File::open(&file.path).await.map_err(unreadable)?;
    let mut chunks = Vec::new();
    let mut total_bytes = 0u64;

    loop {
        let mut buf = vec![0u8; UPLOAD_CHUNK_SIZE];
        let mut filled = 0;
        while filled < buf.len() {
            let n = handle.read(&mut buf[filled..]).await.map_err(unreadable)?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            break;
        }
        total_bytes += filled as u64;
        if total_bytes > file.size_bytes {
            return Err(ValidationError::SizeChanged {
                file_name: file.file_name.clone(),
                expected_bytes: file.size_bytes,
            });
        }
        buf.truncate(filled);
        let last = filled < UPLOAD_CHUNK_SIZE;
        chunks.push(buf);
        if last {
            break;
        }
    }

    Ok((chunks, total_bytes))
}
