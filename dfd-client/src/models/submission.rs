//! Submission lifecycle state machine
//!
//! IDLE → UPLOADING → ANALYZING → SUCCEEDED | FAILED
//!
//! Exactly one state is active; SUCCEEDED and FAILED are re-enterable via
//! re-analysis or reset.

use chrono::{DateTime, Utc};
use dfd_common::events::{FailureKind, SubmissionPhase};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::AnalysisResult;

/// Current state of the single submission a controller owns
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SubmissionState {
    /// Nothing in flight (a file may be staged)
    #[default]
    Idle,
    /// Bytes being sent; progress 0.0 - 100.0, non-decreasing
    Uploading { progress: f64 },
    /// Transport finished, body being normalized
    Analyzing,
    /// Verdict available
    Succeeded { result: AnalysisResult },
    /// Human-readable cause plus category
    Failed { kind: FailureKind, message: String },
}

impl SubmissionState {
    pub fn phase(&self) -> SubmissionPhase {
        match self {
            SubmissionState::Idle => SubmissionPhase::Idle,
            SubmissionState::Uploading { .. } => SubmissionPhase::Uploading,
            SubmissionState::Analyzing => SubmissionPhase::Analyzing,
            SubmissionState::Succeeded { .. } => SubmissionPhase::Succeeded,
            SubmissionState::Failed { .. } => SubmissionPhase::Failed,
        }
    }

    /// Upload progress while uploading
    pub fn progress(&self) -> Option<f64> {
        match self {
            SubmissionState::Uploading { progress } => Some(*progress),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            SubmissionState::Succeeded { result } => Some(result),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            SubmissionState::Failed { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.phase().is_busy()
    }
}

/// State transition record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    /// None while idle
    pub submission_id: Option<Uuid>,
    pub old_phase: SubmissionPhase,
    pub new_phase: SubmissionPhase,
    pub transitioned_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_idle() {
        let state = SubmissionState::default();
        assert_eq!(state.phase(), SubmissionPhase::Idle);
        assert!(state.progress().is_none());
        assert!(state.result().is_none());
        assert!(!state.is_busy());
    }

    #[test]
    fn test_accessors_match_variant() {
        let uploading = SubmissionState::Uploading { progress: 42.0 };
        assert_eq!(uploading.progress(), Some(42.0));
        assert!(uploading.is_busy());

        let failed = SubmissionState::Failed {
            kind: FailureKind::Transport,
            message: "Network error".to_string(),
        };
        assert_eq!(failed.error_message(), Some("Network error"));
        assert_eq!(failed.phase(), SubmissionPhase::Failed);
        assert!(!failed.is_busy());
    }
}
