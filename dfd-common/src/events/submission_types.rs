//! Submission lifecycle types shared between the controller and its readers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse phase of a submission, without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionPhase {
    /// No submission in flight (a file may be staged)
    Idle,
    /// Video bytes are being sent
    Uploading,
    /// Upload finished, response being normalized
    Analyzing,
    /// Verdict available
    Succeeded,
    /// Submission failed; recoverable via reset or re-analysis
    Failed,
}

impl SubmissionPhase {
    /// Uploading or Analyzing
    pub fn is_busy(self) -> bool {
        matches!(self, SubmissionPhase::Uploading | SubmissionPhase::Analyzing)
    }

    /// Succeeded or Failed
    pub fn is_terminal(self) -> bool {
        matches!(self, SubmissionPhase::Succeeded | SubmissionPhase::Failed)
    }
}

impl fmt::Display for SubmissionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubmissionPhase::Idle => "idle",
            SubmissionPhase::Uploading => "uploading",
            SubmissionPhase::Analyzing => "analyzing",
            SubmissionPhase::Succeeded => "succeeded",
            SubmissionPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Category of a failed submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Rejected before any network call (oversized file)
    Validation,
    /// Network unreachable or non-2xx response
    Transport,
    /// Body malformed or missing expected fields
    Parse,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Validation => "validation",
            FailureKind::Transport => "transport",
            FailureKind::Parse => "parse",
        };
        f.write_str(name)
    }
}
