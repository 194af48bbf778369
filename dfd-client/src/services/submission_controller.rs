//! Submission lifecycle controller
//!
//! Owns the single submission state and mediates one in-flight upload at a
//! time:
//!
//! ```text
//! Idle --select_file(valid)--> Idle(staged)
//! Idle(staged) --submit--> Uploading(0)
//! Uploading(p) --progress--> Uploading(p')   [p' >= p]
//! Uploading(100) --transport success--> Analyzing
//! Analyzing --parse ok--> Succeeded(result)
//! Analyzing --parse fail--> Failed(message)
//! Uploading(*) --transport error--> Failed(message)
//! Succeeded|Failed --reanalyze--> Uploading(0)
//! * --reset--> Idle
//! ```
//!
//! `submit` holds `&mut self` for the whole submission, so two submissions
//! cannot overlap. If a submission future is dropped before completion the
//! state stays busy until `reset`; every other operation answers `Busy`.

use chrono::Utc;
use dfd_common::config::ClientConfig;
use dfd_common::events::{DfdEvent, EventBus, SubmissionPhase};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{SubmissionError, ValidationError};
use crate::models::{AnalysisResult, StateTransition, SubmissionState, VideoFile};
use crate::services::report::AnalysisReport;
use crate::services::response_parser::parse_analysis_response;
use crate::services::upload_client::{UploadProgress, UploadRequest, UploadTransport};

pub struct SubmissionController {
    transport: Arc<dyn UploadTransport>,
    config: ClientConfig,
    event_bus: EventBus,
    state: SubmissionState,
    staged: Option<VideoFile>,
    training_opt_in: bool,
    submission_id: Option<Uuid>,
    training_task: Option<JoinHandle<()>>,
}

impl SubmissionController {
    pub fn new(
        transport: Arc<dyn UploadTransport>,
        config: ClientConfig,
        event_bus: EventBus,
    ) -> Self {
        Self {
            transport,
            config,
            event_bus,
            state: SubmissionState::Idle,
            staged: None,
            training_opt_in: false,
            submission_id: None,
            training_task: None,
        }
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    pub fn phase(&self) -> SubmissionPhase {
        self.state.phase()
    }

    pub fn staged_file(&self) -> Option<&VideoFile> {
        self.staged.as_ref()
    }

    /// Id of the current (or last finished) submission
    pub fn submission_id(&self) -> Option<Uuid> {
        self.submission_id
    }

    /// Training flag of the last submission
    pub fn training_opt_in(&self) -> bool {
        self.training_opt_in
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Handle of the last detached training upload, if one was started
    ///
    /// The upload keeps running when the handle is dropped; callers that
    /// are about to shut the runtime down await it (or abort it) instead.
    pub fn take_training_task(&mut self) -> Option<JoinHandle<()>> {
        self.training_task.take()
    }

    /// Stage a file for submission
    ///
    /// Oversized files move the controller to Failed and leave nothing
    /// staged; selecting another file is always possible afterwards.
    pub fn select_file(&mut self, file: VideoFile) -> Result<(), SubmissionError> {
        self.ensure_not_busy()?;

        self.submission_id = None;

        if file.size_bytes > self.config.max_file_size_bytes {
            self.staged = None;
            let err = SubmissionError::from(ValidationError::FileTooLarge {
                file_name: file.file_name,
                size_bytes: file.size_bytes,
                limit_bytes: self.config.max_file_size_bytes,
            });
            return Err(self.fail(err));
        }

        if !file.has_supported_extension() {
            warn!(
                file = %file.file_name,
                "File extension is not one the analysis service accepts (mp4, mov, avi, mkv)"
            );
        }

        info!(file = %file.file_name, size_bytes = file.size_bytes, "Video staged");
        self.event_bus.emit_lossy(DfdEvent::FileStaged {
            file_name: file.file_name.clone(),
            size_bytes: file.size_bytes,
            timestamp: Utc::now(),
        });
        self.staged = Some(file);
        self.transition_to(SubmissionState::Idle);
        Ok(())
    }

    /// Upload the staged file and wait for the verdict
    ///
    /// The staged file is stat'ed again first; a file that has grown past
    /// the size limit or disappeared since selection fails validation
    /// before anything is sent.
    ///
    /// With `training_opt_in` the same video is also sent to the
    /// training-storage endpoint in a detached task whose outcome is only
    /// logged.
    pub async fn submit(
        &mut self,
        training_opt_in: bool,
    ) -> Result<AnalysisResult, SubmissionError> {
        self.ensure_not_busy()?;
        if self.staged.is_none() {
            return Err(SubmissionError::NoFileStaged);
        }
        let file = match self.restat_staged().await {
            Ok(file) => file,
            Err(err) => return Err(self.fail(err)),
        };

        let submission_id = Uuid::new_v4();
        self.submission_id = Some(submission_id);
        self.training_opt_in = training_opt_in;
        self.transition_to(SubmissionState::Uploading { progress: 0.0 });

        let request = UploadRequest::new(file.clone());
        if training_opt_in {
            let task = self.spawn_training_upload(request.clone(), submission_id);
            self.training_task = Some(task);
        }

        let transport = Arc::clone(&self.transport);
        let url = self.config.upload_url();
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();

        info!(
            submission_id = %submission_id,
            url = %url,
            file = %file.file_name,
            training_opt_in = training_opt_in,
            "Submitting video for analysis"
        );

        let outcome = {
            let upload = transport.upload(&url, &request, progress_tx);
            tokio::pin!(upload);
            loop {
                tokio::select! {
                    biased;
                    Some(progress) = progress_rx.recv() => self.apply_progress(progress),
                    outcome = &mut upload => break outcome,
                }
            }
        };
        while let Ok(progress) = progress_rx.try_recv() {
            self.apply_progress(progress);
        }

        let response = match outcome {
            Ok(response) => response,
            Err(failure) => return Err(self.fail(failure.into())),
        };

        self.set_progress(100.0, None);
        self.transition_to(SubmissionState::Analyzing);

        let result = match parse_analysis_response(&response.body) {
            Ok(result) => result,
            Err(err) => return Err(self.fail(err.into())),
        };

        info!(
            submission_id = %submission_id,
            prediction = %result.prediction,
            confidence = result.confidence,
            frames = result.frames.len(),
            "Analysis succeeded"
        );
        self.event_bus.emit_lossy(DfdEvent::SubmissionSucceeded {
            submission_id,
            file_name: file.file_name,
            prediction: result.prediction.as_str().to_string(),
            confidence: result.confidence,
            training_opt_in,
            timestamp: Utc::now(),
        });
        self.transition_to(SubmissionState::Succeeded {
            result: result.clone(),
        });
        Ok(result)
    }

    /// Submit the staged file again with the last training flag
    ///
    /// Only valid once the staged file has a verdict or a failure; a file
    /// that was never submitted answers `NoPriorSubmission`.
    pub async fn reanalyze(&mut self) -> Result<AnalysisResult, SubmissionError> {
        self.ensure_not_busy()?;
        if self.staged.is_none() {
            return Err(SubmissionError::NoFileStaged);
        }
        if !self.state.phase().is_terminal() {
            return Err(SubmissionError::NoPriorSubmission);
        }
        info!(previous = ?self.submission_id, "Re-analyzing staged video");
        self.submit(self.training_opt_in).await
    }

    /// Clear file, result, error and progress
    ///
    /// Always succeeds. An abandoned in-flight submission is no longer
    /// tracked.
    pub fn reset(&mut self) {
        if self.state.is_busy() {
            warn!(
                submission_id = ?self.submission_id,
                phase = %self.state.phase(),
                "Reset while a submission was in flight; abandoning it"
            );
        }
        self.staged = None;
        self.submission_id = None;
        self.transition_to(SubmissionState::Idle);
    }

    /// Report for the current verdict, if any
    pub fn build_report(&self) -> Option<AnalysisReport> {
        let result = self.state.result()?;
        let file = self.staged.as_ref()?;
        Some(AnalysisReport::new(
            file,
            self.submission_id,
            self.training_opt_in,
            result,
        ))
    }

    /// Refresh the staged file's size from disk and re-check the limit
    async fn restat_staged(&mut self) -> Result<VideoFile, SubmissionError> {
        let Some(staged) = self.staged.as_ref() else {
            return Err(SubmissionError::NoFileStaged);
        };
        let metadata = tokio::fs::metadata(&staged.path).await.map_err(|e| {
            ValidationError::Unreadable {
                path: staged.path.display().to_string(),
                reason: e.to_string(),
            }
        })?;

        let size_bytes = metadata.len();
        if size_bytes > self.config.max_file_size_bytes {
            let file_name = staged.file_name.clone();
            self.staged = None;
            return Err(ValidationError::FileTooLarge {
                file_name,
                size_bytes,
                limit_bytes: self.config.max_file_size_bytes,
            }
            .into());
        }

        if size_bytes != staged.size_bytes {
            debug!(
                file = %staged.file_name,
                selected = staged.size_bytes,
                current = size_bytes,
                "Staged video changed size since selection"
            );
        }

        let mut file = staged.clone();
        file.size_bytes = size_bytes;
        self.staged = Some(file.clone());
        Ok(file)
    }

    fn ensure_not_busy(&self) -> Result<(), SubmissionError> {
        let phase = self.state.phase();
        if phase.is_busy() {
            return Err(SubmissionError::Busy(phase));
        }
        Ok(())
    }

    fn transition_to(&mut self, new_state: SubmissionState) -> StateTransition {
        let old_phase = self.state.phase();
        let new_phase = new_state.phase();
        self.state = new_state;

        let transition = StateTransition {
            submission_id: self.submission_id,
            old_phase,
            new_phase,
            transitioned_at: Utc::now(),
        };

        debug!(
            submission_id = ?transition.submission_id,
            old = %old_phase,
            new = %new_phase,
            "Submission state transition"
        );
        self.event_bus.emit_lossy(DfdEvent::StateChanged {
            submission_id: transition.submission_id,
            old_phase,
            new_phase,
            timestamp: transition.transitioned_at,
        });

        transition
    }

    /// Move to Failed for errors that carry a failure kind
    fn fail(&mut self, err: SubmissionError) -> SubmissionError {
        let kind = match err.failure_kind() {
            Some(kind) => kind,
            None => return err,
        };
        let message = err.to_string();

        warn!(
            submission_id = ?self.submission_id,
            kind = %kind,
            message = %message,
            "Submission failed"
        );
        self.event_bus.emit_lossy(DfdEvent::SubmissionFailed {
            submission_id: self.submission_id,
            kind,
            message: message.clone(),
            timestamp: Utc::now(),
        });
        self.transition_to(SubmissionState::Failed { kind, message });
        err
    }

    fn apply_progress(&mut self, progress: UploadProgress) {
        if let Some(percent) = progress.percent() {
            self.set_progress(percent, Some(progress));
        }
    }

    /// Raise upload progress; lower values are ignored
    fn set_progress(&mut self, percent: f64, bytes: Option<UploadProgress>) {
        let SubmissionState::Uploading { progress } = &mut self.state else {
            return;
        };
        let percent = percent.clamp(0.0, 100.0);
        if percent <= *progress {
            return;
        }
        *progress = percent;

        let Some(submission_id) = self.submission_id else {
            return;
        };
        let (sent_bytes, total_bytes) = bytes
            .map(|b| (b.sent_bytes, b.total_bytes))
            .or_else(|| self.staged.as_ref().map(|f| (f.size_bytes, f.size_bytes)))
            .unwrap_or((0, 0));

        debug!(submission_id = %submission_id, percent = percent, "Upload progress");
        self.event_bus.emit_lossy(DfdEvent::UploadProgress {
            submission_id,
            percent,
            sent_bytes,
            total_bytes,
            timestamp: Utc::now(),
        });
    }

    fn spawn_training_upload(
        &self,
        request: UploadRequest,
        submission_id: Uuid,
    ) -> JoinHandle<()> {
        let transport = Arc::clone(&self.transport);
        let url = self.config.training_url();
        let event_bus = self.event_bus.clone();

        tokio::spawn(async move {
            // Progress of the secondary upload is not tracked
            let (progress_tx, _progress_rx) = mpsc::unbounded_channel();
            let outcome = transport.upload(&url, &request, progress_tx).await;

            let message = match &outcome {
                Ok(response) => {
                    info!(
                        submission_id = %submission_id,
                        status = response.status,
                        "Video stored for training"
                    );
                    None
                }
                Err(e) => {
                    warn!(
                        submission_id = %submission_id,
                        error = %e,
                        "Training upload failed"
                    );
                    Some(e.to_string())
                }
            };

            event_bus.emit_lossy(DfdEvent::TrainingUploadFinished {
                submission_id,
                success: outcome.is_ok(),
                message,
                timestamp: Utc::now(),
            });
        })
    }
}

impl std::fmt::Debug for SubmissionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionController")
            .field("state", &self.state)
            .field("staged", &self.staged)
            .field("training_opt_in", &self.training_opt_in)
            .field("submission_id", &self.submission_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::services::upload_client::{TransportResponse, UploadFailure};
    use async_trait::async_trait;
    use dfd_common::events::FailureKind;
    use std::sync::Mutex;

    /// Replies with a fixed outcome after reporting the given progress values
    struct ScriptedTransport {
        progress: Vec<(u64, u64)>,
        outcome: Result<TransportResponse, UploadFailure>,
        urls: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn ok(body: &str) -> Self {
            Self {
                progress: vec![(50, 100), (100, 100)],
                outcome: Ok(TransportResponse {
                    status: 200,
                    body: body.to_string(),
                }),
                urls: Mutex::new(Vec::new()),
            }
        }

        fn failing(err: TransportError) -> Self {
            Self {
                progress: vec![(10, 100)],
                outcome: Err(err.into()),
                urls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl UploadTransport for ScriptedTransport {
        async fn upload(
            &self,
            url: &str,
            _request: &UploadRequest,
            progress: mpsc::UnboundedSender<UploadProgress>,
        ) -> Result<TransportResponse, UploadFailure> {
            self.urls.lock().unwrap().push(url.to_string());
            for (sent_bytes, total_bytes) in &self.progress {
                let _ = progress.send(UploadProgress {
                    sent_bytes: *sent_bytes,
                    total_bytes: *total_bytes,
                });
            }
            self.outcome.clone()
        }
    }

    const FAKE_BODY: &str = r#"{"prediction":"fake","confidence":87.5,"justification":"Inconsistent lighting","frames":["/static/frames/f0.jpg"],"frame_probs":[[0.2,0.8]]}"#;

    fn clip(dir: &tempfile::TempDir) -> VideoFile {
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, vec![0u8; 100]).unwrap();
        VideoFile::new(path, 100)
    }

    fn controller(transport: ScriptedTransport) -> SubmissionController {
        SubmissionController::new(
            Arc::new(transport),
            ClientConfig::default(),
            EventBus::new(64),
        )
    }

    #[test]
    fn test_starts_idle() {
        let c = controller(ScriptedTransport::ok(FAKE_BODY));
        assert_eq!(c.phase(), SubmissionPhase::Idle);
        assert!(c.staged_file().is_none());
        assert!(c.build_report().is_none());
    }

    #[test]
    fn test_select_oversized_file_fails_validation() {
        let mut c = controller(ScriptedTransport::ok(FAKE_BODY));
        let limit = ClientConfig::default().max_file_size_bytes;

        let err = c
            .select_file(VideoFile::new("/tmp/big.mp4", limit + 1))
            .unwrap_err();

        assert!(matches!(
            err,
            SubmissionError::Validation(ValidationError::FileTooLarge { .. })
        ));
        assert!(matches!(
            c.state(),
            SubmissionState::Failed {
                kind: FailureKind::Validation,
                ..
            }
        ));
        assert!(c.staged_file().is_none());
    }

    #[test]
    fn test_file_at_limit_is_accepted() {
        let mut c = controller(ScriptedTransport::ok(FAKE_BODY));
        let limit = ClientConfig::default().max_file_size_bytes;

        c.select_file(VideoFile::new("/tmp/edge.mp4", limit)).unwrap();
        assert_eq!(c.phase(), SubmissionPhase::Idle);
        assert_eq!(c.staged_file().unwrap().file_name, "edge.mp4");
    }

    #[tokio::test]
    async fn test_submit_without_file() {
        let mut c = controller(ScriptedTransport::ok(FAKE_BODY));
        let err = c.submit(false).await.unwrap_err();
        assert_eq!(err, SubmissionError::NoFileStaged);
        assert_eq!(c.phase(), SubmissionPhase::Idle);
    }

    #[tokio::test]
    async fn test_submit_success() {
        let mut c = controller(ScriptedTransport::ok(FAKE_BODY));
        let dir = tempfile::tempdir().unwrap();
        c.select_file(clip(&dir)).unwrap();

        let result = c.submit(false).await.unwrap();

        assert_eq!(result.prediction, crate::models::Prediction::Fake);
        assert_eq!(result.confidence, 87.5);
        assert_eq!(c.phase(), SubmissionPhase::Succeeded);
        assert_eq!(c.state().result(), Some(&result));
        assert!(c.submission_id().is_some());

        let report = c.build_report().unwrap();
        assert_eq!(report.video.file_name, "clip.mp4");
        assert!(report.chart.is_some());
    }

    #[tokio::test]
    async fn test_submit_transport_failure() {
        let mut c = controller(ScriptedTransport::failing(TransportError::Status {
            code: 500,
            reason: "Internal Server Error".to_string(),
            detail: None,
        }));
        let dir = tempfile::tempdir().unwrap();
        c.select_file(clip(&dir)).unwrap();

        let err = c.submit(false).await.unwrap_err();

        assert!(matches!(err, SubmissionError::Transport(_)));
        match c.state() {
            SubmissionState::Failed { kind, message } => {
                assert_eq!(*kind, FailureKind::Transport);
                assert!(message.contains("500"));
            }
            other => panic!("expected Failed, got {:?}", other),
        }
        assert!(c.state().result().is_none());
    }

    #[tokio::test]
    async fn test_unparseable_body_fails_parse() {
        let mut c = controller(ScriptedTransport::ok("<html>oops</html>"));
        let dir = tempfile::tempdir().unwrap();
        c.select_file(clip(&dir)).unwrap();

        let err = c.submit(false).await.unwrap_err();

        assert!(matches!(err, SubmissionError::Parse(_)));
        assert!(matches!(
            c.state(),
            SubmissionState::Failed {
                kind: FailureKind::Parse,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_reset_clears_everything_but_training_flag() {
        let mut c = controller(ScriptedTransport::ok(FAKE_BODY));
        let dir = tempfile::tempdir().unwrap();
        c.select_file(clip(&dir)).unwrap();
        c.submit(true).await.unwrap();

        c.reset();

        assert_eq!(c.state(), &SubmissionState::Idle);
        assert!(c.staged_file().is_none());
        assert!(c.submission_id().is_none());
        assert!(c.training_opt_in());
    }

    #[tokio::test]
    async fn test_reanalyze_uses_new_submission_id() {
        let mut c = controller(ScriptedTransport::ok(FAKE_BODY));
        let dir = tempfile::tempdir().unwrap();
        c.select_file(clip(&dir)).unwrap();
        c.submit(false).await.unwrap();
        let first = c.submission_id();

        c.reanalyze().await.unwrap();

        assert_eq!(c.phase(), SubmissionPhase::Succeeded);
        assert_ne!(c.submission_id(), first);
    }

    #[tokio::test]
    async fn test_reanalyze_without_file() {
        let mut c = controller(ScriptedTransport::ok(FAKE_BODY));
        let err = c.reanalyze().await.unwrap_err();
        assert_eq!(err, SubmissionError::NoFileStaged);
    }

    #[tokio::test]
    async fn test_progress_events_are_monotonic() {
        let mut transport = ScriptedTransport::ok(FAKE_BODY);
        transport.progress = vec![(30, 100), (20, 100), (60, 100), (60, 100), (100, 100)];
        let mut c = controller(transport);
        let mut rx = c.event_bus().subscribe();
        let dir = tempfile::tempdir().unwrap();
        c.select_file(clip(&dir)).unwrap();

        c.submit(false).await.unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let DfdEvent::UploadProgress { percent, .. } = event {
                seen.push(percent);
            }
        }
        assert_eq!(seen, vec![30.0, 60.0, 100.0]);
    }

    #[tokio::test]
    async fn test_reanalyze_requires_prior_submission() {
        let mut c = controller(ScriptedTransport::ok(FAKE_BODY));
        let dir = tempfile::tempdir().unwrap();
        c.select_file(clip(&dir)).unwrap();

        let err = c.reanalyze().await.unwrap_err();

        assert_eq!(err, SubmissionError::NoPriorSubmission);
        assert_eq!(c.phase(), SubmissionPhase::Idle);
        assert!(c.submission_id().is_none());
    }

    #[tokio::test]
    async fn test_submit_rejects_file_deleted_after_selection() {
        let mut c = controller(ScriptedTransport::ok(FAKE_BODY));
        let dir = tempfile::tempdir().unwrap();
        let file = clip(&dir);
        std::fs::remove_file(&file.path).unwrap();
        c.select_file(file).unwrap();

        let err = c.submit(false).await.unwrap_err();

        assert!(matches!(
            err,
            SubmissionError::Validation(ValidationError::Unreadable { .. })
        ));
        assert!(matches!(
            c.state(),
            SubmissionState::Failed {
                kind: FailureKind::Validation,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_training_task_handle_only_when_requested() {
        let mut c = controller(ScriptedTransport::ok(FAKE_BODY));
        let dir = tempfile::tempdir().unwrap();
        c.select_file(clip(&dir)).unwrap();

        c.submit(false).await.unwrap();
        assert!(c.take_training_task().is_none());

        c.submit(true).await.unwrap();
        let task = c.take_training_task().unwrap();
        task.await.unwrap();
        assert!(c.take_training_task().is_none());
    }
}
