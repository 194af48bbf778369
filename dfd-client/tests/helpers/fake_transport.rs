//! Scripted upload transport
//!
//! Records every call and answers from a per-URL script so tests can drive
//! the submission controller without a network.

use async_trait::async_trait;
use dfd_client::services::upload_client::{
    TransportResponse, UploadFailure, UploadProgress, UploadRequest, UploadTransport,
};
use dfd_client::TransportError;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

/// How the fake answers one URL
#[derive(Debug, Clone)]
pub enum Script {
    /// 200 with the given body after reporting `progress` steps
    Respond {
        progress: Vec<(u64, u64)>,
        body: String,
    },
    /// Fail with a transport error after reporting `progress` steps
    Fail {
        progress: Vec<(u64, u64)>,
        error: TransportError,
    },
    /// Report `progress` steps, then never complete
    Hang { progress: Vec<(u64, u64)> },
    /// Sleep before answering 200 with `body`
    Delay { after: Duration, body: String },
}

impl Script {
    pub fn ok(body: &str) -> Self {
        Script::Respond {
            progress: vec![(25, 100), (50, 100), (75, 100), (100, 100)],
            body: body.to_string(),
        }
    }

    pub fn fail(error: TransportError) -> Self {
        Script::Fail {
            progress: vec![(40, 100)],
            error,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub url: String,
    pub file_name: String,
}

/// Transport answering per URL suffix (`/upload`, `/store_for_training`)
#[derive(Default)]
pub struct FakeTransport {
    scripts: Mutex<HashMap<String, Vec<Script>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a script for URLs ending in `suffix`; the last one repeats
    pub fn on(self, suffix: &str, script: Script) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(suffix.to_string())
            .or_default()
            .push(script);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, suffix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.url.ends_with(suffix))
            .count()
    }

    fn next_script(&self, url: &str) -> Option<Script> {
        let mut scripts = self.scripts.lock().unwrap();
        let (_, queue) = scripts.iter_mut().find(|(suffix, _)| url.ends_with(suffix.as_str()))?;
        if queue.len() > 1 {
            Some(queue.remove(0))
        } else {
            queue.first().cloned()
        }
    }
}

fn send_steps(progress: &mpsc::UnboundedSender<UploadProgress>, steps: &[(u64, u64)]) {
    for (sent_bytes, total_bytes) in steps {
        let _ = progress.send(UploadProgress {
            sent_bytes: *sent_bytes,
            total_bytes: *total_bytes,
        });
    }
}

#[async_trait]
impl UploadTransport for FakeTransport {
    async fn upload(
        &self,
        url: &str,
        request: &UploadRequest,
        progress: mpsc::UnboundedSender<UploadProgress>,
    ) -> Result<TransportResponse, UploadFailure> {
        self.calls.lock().unwrap().push(RecordedCall {
            url: url.to_string(),
            file_name: request.file.file_name.clone(),
        });

        let script = self.next_script(url).unwrap_or_else(|| Script::Fail {
            progress: Vec::new(),
            error: TransportError::Network {
                url: url.to_string(),
                reason: "no script for this URL".to_string(),
            },
        });

        match script {
            Script::Respond { progress: steps, body } => {
                send_steps(&progress, &steps);
                Ok(TransportResponse { status: 200, body })
            }
            Script::Fail {
                progress: steps,
                error,
            } => {
                send_steps(&progress, &steps);
                Err(error.into())
            }
            Script::Hang { progress: steps } => {
                send_steps(&progress, &steps);
                std::future::pending().await
            }
            Script::Delay { after, body } => {
                tokio::time::sleep(after).await;
                Ok(TransportResponse { status: 200, body })
            }
        }
    }
}
