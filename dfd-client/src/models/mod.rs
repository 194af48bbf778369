//! Data models for dfd-client
//!
//! - Submission lifecycle state machine
//! - Selected video metadata
//! - Normalized analysis verdict

pub mod analysis_result;
pub mod submission;
pub mod video_file;

pub use analysis_result::{
    clamp_percent, AnalysisResult, FrameProbability, Prediction, ServiceDiagnostics,
};
pub use submission::{StateTransition, SubmissionState};
pub use video_file::VideoFile;
