//! Event types for the DFD event system
//!
//! Provides submission lifecycle events and the EventBus the controller
//! publishes them on.

mod submission_types;

pub use submission_types::{FailureKind, SubmissionPhase};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// DFD event types
///
/// The submission controller is the only writer. Renderers, history
/// persistence and loggers subscribe as passive readers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DfdEvent {
    /// Controller moved between phases
    StateChanged {
        /// Submission the transition belongs to (None while idle)
        submission_id: Option<Uuid>,
        /// Phase before change
        old_phase: SubmissionPhase,
        /// Phase after change
        new_phase: SubmissionPhase,
        /// When the phase changed
        timestamp: DateTime<Utc>,
    },

    /// A file was staged for submission
    FileStaged {
        file_name: String,
        size_bytes: u64,
        timestamp: DateTime<Utc>,
    },

    /// Upload progress advanced (advisory, non-decreasing)
    UploadProgress {
        submission_id: Uuid,
        /// 0.0 - 100.0
        percent: f64,
        sent_bytes: u64,
        total_bytes: u64,
        timestamp: DateTime<Utc>,
    },

    /// Verdict received and normalized
    ///
    /// Triggers:
    /// - Renderer: show verdict, chart and frame gallery
    /// - History persistence: store the analysis record
    SubmissionSucceeded {
        submission_id: Uuid,
        file_name: String,
        /// "real" or "fake"
        prediction: String,
        /// 0.0 - 100.0
        confidence: f64,
        training_opt_in: bool,
        timestamp: DateTime<Utc>,
    },

    /// Submission ended in the Failed phase
    SubmissionFailed {
        /// None when the failure happened before any submission started
        submission_id: Option<Uuid>,
        kind: FailureKind,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Fire-and-forget training upload finished (never affects the submission)
    TrainingUploadFinished {
        submission_id: Uuid,
        success: bool,
        /// Failure cause when `success` is false
        message: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

impl DfdEvent {
    /// Event name for logging and SSE-style framing
    pub fn event_type(&self) -> &'static str {
        match self {
            DfdEvent::StateChanged { .. } => "StateChanged",
            DfdEvent::FileStaged { .. } => "FileStaged",
            DfdEvent::UploadProgress { .. } => "UploadProgress",
            DfdEvent::SubmissionSucceeded { .. } => "SubmissionSucceeded",
            DfdEvent::SubmissionFailed { .. } => "SubmissionFailed",
            DfdEvent::TrainingUploadFinished { .. } => "TrainingUploadFinished",
        }
    }
}

// ============================================================================
// EventBus Implementation
// ============================================================================

/// Broadcast channel for [`DfdEvent`]s
///
/// Uses tokio::broadcast internally: every subscriber sees every event
/// emitted after it subscribed; slow subscribers lose the oldest events
/// once `capacity` is exceeded.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DfdEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use dfd_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<DfdEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: DfdEvent) -> Result<usize, broadcast::error::SendError<DfdEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: DfdEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_errors() {
        let bus = EventBus::new(10);
        let result = bus.emit(DfdEvent::FileStaged {
            file_name: "clip.mp4".to_string(),
            size_bytes: 10,
            timestamp: Utc::now(),
        });
        assert!(result.is_err());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        for phase in [SubmissionPhase::Uploading, SubmissionPhase::Analyzing] {
            bus.emit_lossy(DfdEvent::StateChanged {
                submission_id: None,
                old_phase: SubmissionPhase::Idle,
                new_phase: phase,
                timestamp: Utc::now(),
            });
        }

        match rx.recv().await.unwrap() {
            DfdEvent::StateChanged { new_phase, .. } => {
                assert_eq!(new_phase, SubmissionPhase::Uploading)
            }
            other => panic!("unexpected event {:?}", other),
        }
        match rx.recv().await.unwrap() {
            DfdEvent::StateChanged { new_phase, .. } => {
                assert_eq!(new_phase, SubmissionPhase::Analyzing)
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = DfdEvent::SubmissionFailed {
            submission_id: None,
            kind: FailureKind::Validation,
            message: "too big".to_string(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "SubmissionFailed");
        assert_eq!(json["kind"], "validation");
        assert_eq!(event.event_type(), "SubmissionFailed");
    }

    #[test]
    fn test_phase_predicates() {
        assert!(SubmissionPhase::Uploading.is_busy());
        assert!(SubmissionPhase::Analyzing.is_busy());
        assert!(!SubmissionPhase::Failed.is_busy());
        assert!(SubmissionPhase::Succeeded.is_terminal());
        assert!(!SubmissionPhase::Idle.is_terminal());
    }
}
