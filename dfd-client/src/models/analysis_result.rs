//! Normalized verdict returned by the analysis service

use serde::{Deserialize, Serialize};
use std::fmt;

/// Shown when the service sent no justification
pub const MISSING_JUSTIFICATION: &str = "No detailed analysis available.";

/// Binary classification label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prediction {
    Real,
    Fake,
}

impl Prediction {
    /// Case-insensitive label match; anything else is outside the taxonomy
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim();
        if label.eq_ignore_ascii_case("real") {
            Some(Prediction::Real)
        } else if label.eq_ignore_ascii_case("fake") {
            Some(Prediction::Fake)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Prediction::Real => "real",
            Prediction::Fake => "fake",
        }
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clamp a percentage into [0, 100]
pub fn clamp_percent(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

/// Per-frame (real, fake) probabilities, each nominally in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameProbability {
    pub real: f64,
    pub fake: f64,
}

impl FrameProbability {
    pub fn new(real: f64, fake: f64) -> Self {
        Self { real, fake }
    }

    /// Fake probability as a chart percentage
    pub fn fake_percent(&self) -> f64 {
        clamp_percent(self.fake * 100.0)
    }

    pub fn real_percent(&self) -> f64 {
        clamp_percent(self.real * 100.0)
    }
}

/// Extra fields some service revisions attach; passed through untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceDiagnostics {
    /// Frames with a detected face that were classified
    pub frames_analyzed: Option<u32>,
    pub processing_time_secs: Option<f64>,
    pub model_version: Option<String>,
    /// Probability vector of the averaged features
    pub raw_output: Vec<f64>,
    pub landmark_variance: Option<f64>,
}

/// Strictly typed analysis verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub prediction: Prediction,
    /// Always within [0, 100]
    pub confidence: f64,
    pub justification: Option<String>,
    /// Ordered per-frame probabilities (may be empty)
    pub frame_probs: Vec<FrameProbability>,
    /// Ordered extracted-frame image references (may be empty)
    pub frames: Vec<String>,
    #[serde(default)]
    pub diagnostics: ServiceDiagnostics,
}

impl AnalysisResult {
    /// Justification text, or the stock placeholder
    pub fn justification_or_default(&self) -> &str {
        match self.justification.as_deref() {
            Some(text) if !text.trim().is_empty() => text,
            _ => MISSING_JUSTIFICATION,
        }
    }

    pub fn has_frames(&self) -> bool {
        !self.frames.is_empty()
    }

    pub fn has_frame_probs(&self) -> bool {
        !self.frame_probs.is_empty()
    }
}
