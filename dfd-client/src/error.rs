//! Error types for dfd-client
//!
//! Three failure categories reach the Failed state: validation (before any
//! network call), transport (network or non-2xx status) and parse (body
//! malformed or contract violated). Caller errors (`NoFileStaged`,
//! `NoPriorSubmission`, `Busy`) are returned without touching controller
//! state.

use dfd_common::events::{FailureKind, SubmissionPhase};
use dfd_common::human_size::format_bytes;
use std::time::Duration;
use thiserror::Error;

fn human(bytes: &u64) -> String {
    format_bytes(*bytes)
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(detail) => format!(" ({})", detail),
        None => String::new(),
    }
}

/// Rejections raised before any network call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Video larger than the configured limit
    #[error(
        "File size exceeds limit: {file_name} is {}, maximum is {}",
        human(.size_bytes),
        human(.limit_bytes)
    )]
    FileTooLarge {
        file_name: String,
        size_bytes: u64,
        limit_bytes: u64,
    },

    /// Staged video could not be read when the upload started
    #[error("Could not read video file {path}: {reason}")]
    Unreadable { path: String, reason: String },

    /// Video grew past its selected size while being read for upload
    #[error(
        "Video file changed since it was selected: {file_name} is now larger than {}",
        human(.expected_bytes)
    )]
    SizeChanged {
        file_name: String,
        expected_bytes: u64,
    },
}

/// Upload transport failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    /// Connection refused, DNS failure, reset, ...
    #[error("Network error: could not connect to the analysis service at {url} ({reason})")]
    Network { url: String, reason: String },

    /// Whole-request timeout elapsed
    #[error("Network error: request to {url} timed out after {}s", .after.as_secs())]
    Timeout { url: String, after: Duration },

    /// Non-2xx response
    #[error("Error analyzing video: {code} {reason}{}", detail_suffix(.detail))]
    Status {
        code: u16,
        reason: String,
        /// Server-supplied `error`/`message` field, when the body carried one
        detail: Option<String>,
    },

    /// Response body could not be read
    #[error("Network error: failed to read response body ({0})")]
    Body(String),
}

/// Response body violations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("response body is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("response body is not a JSON object")]
    NotAnObject,

    #[error("response is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' has an invalid value: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// Label outside the real/fake taxonomy (e.g. an inconclusive analysis)
    #[error("unsupported prediction '{label}'{}", detail_suffix(.justification))]
    UnknownPrediction {
        label: String,
        justification: Option<String>,
    },

    /// HTTP 200 carrying an `error` field or `status: "error"`
    #[error("analysis service reported an error: {0}")]
    ServiceError(String),
}

/// Errors returned by the submission controller
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("No video file staged; select a file first")]
    NoFileStaged,

    #[error("Nothing to re-analyze; submit the staged video first")]
    NoPriorSubmission,

    /// Only one submission may be in flight per controller
    #[error("A submission is already in progress ({0})")]
    Busy(SubmissionPhase),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Error parsing analysis result: {0}")]
    Parse(#[from] ParseError),
}

impl SubmissionError {
    /// Failure category stored in the Failed state
    ///
    /// `None` for caller errors that leave the state untouched.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            SubmissionError::Validation(_) => Some(FailureKind::Validation),
            SubmissionError::Transport(_) => Some(FailureKind::Transport),
            SubmissionError::Parse(_) => Some(FailureKind::Parse),
            SubmissionError::NoFileStaged
            | SubmissionError::NoPriorSubmission
            | SubmissionError::Busy(_) => None,
        }
    }
}
