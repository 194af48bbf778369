//! dfd-client library interface
//!
//! Submits a video to the remote authenticity analysis service and tracks
//! the submission through upload, analysis and verdict.
//!
//! Exposes public APIs for the CLI and for integration testing.

pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ParseError, SubmissionError, TransportError, ValidationError};
pub use crate::models::{AnalysisResult, FrameProbability, Prediction, SubmissionState, VideoFile};
pub use crate::services::submission_controller::SubmissionController;
pub use crate::services::upload_client::{HttpUploadClient, UploadTransport};
