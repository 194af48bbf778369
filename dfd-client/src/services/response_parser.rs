//! Analysis response normalization
//!
//! The service answers with loosely typed JSON: `confidence` arrives either
//! as a number or as a percent string (`"87.50%"`), optional fields may be
//! missing or malformed, and logical failures come back as HTTP 200 with an
//! `error` field. Everything is validated here, immediately after transport,
//! so that only a strict [`AnalysisResult`] reaches the renderer.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ParseError;
use crate::models::{
    clamp_percent, AnalysisResult, FrameProbability, Prediction, ServiceDiagnostics,
};

/// Wire shape; every field optional so violations surface as [`ParseError`]
#[derive(Debug, Default, Deserialize)]
struct RawAnalysisResponse {
    #[serde(default)]
    status: Option<Value>,
    #[serde(default)]
    message: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    prediction: Option<Value>,
    #[serde(default)]
    confidence: Option<Value>,
    #[serde(default)]
    justification: Option<Value>,
    #[serde(default)]
    frames: Option<Value>,
    #[serde(default)]
    frame_probs: Option<Value>,
    #[serde(default)]
    frames_analyzed: Option<Value>,
    #[serde(default)]
    processing_time: Option<Value>,
    #[serde(default)]
    model_version: Option<Value>,
    #[serde(default)]
    raw_output: Option<Value>,
    #[serde(default)]
    landmark_variance: Option<Value>,
}

/// Confidence as sent by the service
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ConfidenceValue {
    Number(f64),
    Text(String),
}

/// Parse and normalize a response body
pub fn parse_analysis_response(body: &str) -> Result<AnalysisResult, ParseError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
    parse_analysis_value(value)
}

/// Normalize an already-decoded JSON document
pub fn parse_analysis_value(value: Value) -> Result<AnalysisResult, ParseError> {
    if !value.is_object() {
        return Err(ParseError::NotAnObject);
    }
    let raw: RawAnalysisResponse =
        serde_json::from_value(value).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    check_service_error(&raw)?;

    let justification = raw.justification.as_ref().and_then(non_null_string);
    let prediction = normalize_prediction(raw.prediction.as_ref(), &justification)?;
    let confidence = normalize_confidence(raw.confidence.as_ref())?;
    let frames = normalize_frames(raw.frames);
    let frame_probs = normalize_frame_probs(raw.frame_probs);

    let diagnostics = ServiceDiagnostics {
        frames_analyzed: raw
            .frames_analyzed
            .as_ref()
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok()),
        processing_time_secs: raw.processing_time.as_ref().and_then(Value::as_f64),
        model_version: raw.model_version.as_ref().and_then(non_null_string),
        raw_output: raw
            .raw_output
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default(),
        landmark_variance: raw.landmark_variance.as_ref().and_then(Value::as_f64),
    };

    debug!(
        prediction = %prediction,
        confidence = confidence,
        frames = frames.len(),
        frame_probs = frame_probs.len(),
        "Analysis response normalized"
    );

    Ok(AnalysisResult {
        prediction,
        confidence,
        justification,
        frame_probs,
        frames,
        diagnostics,
    })
}

/// Parse a confidence string such as `"87.5%"`, `" 42 "` or `"0.42"`
///
/// Returns the clamped percentage.
pub fn parse_confidence_text(text: &str) -> Result<f64, ParseError> {
    let trimmed = text.trim();
    let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
    let parsed: f64 = number.parse().map_err(|_| ParseError::InvalidField {
        field: "confidence",
        reason: format!("'{}' is not a number", text),
    })?;
    finite_percent(parsed)
}

fn finite_percent(value: f64) -> Result<f64, ParseError> {
    if !value.is_finite() {
        return Err(ParseError::InvalidField {
            field: "confidence",
            reason: format!("{} is not finite", value),
        });
    }
    Ok(clamp_percent(value))
}

/// Extract the service's own error text from a (possibly non-2xx) body
pub fn extract_error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let object = value.as_object()?;
    object
        .get("error")
        .and_then(non_null_string)
        .or_else(|| object.get("message").and_then(non_null_string))
}

fn check_service_error(raw: &RawAnalysisResponse) -> Result<(), ParseError> {
    if let Some(error) = raw.error.as_ref().and_then(non_null_string) {
        return Err(ParseError::ServiceError(error));
    }
    let status_is_error = raw
        .status
        .as_ref()
        .and_then(Value::as_str)
        .map(|s| s.eq_ignore_ascii_case("error"))
        .unwrap_or(false);
    if status_is_error {
        let message = raw
            .message
            .as_ref()
            .and_then(non_null_string)
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(ParseError::ServiceError(message));
    }
    Ok(())
}

fn normalize_prediction(
    value: Option<&Value>,
    justification: &Option<String>,
) -> Result<Prediction, ParseError> {
    let label = match value {
        None | Some(Value::Null) => return Err(ParseError::MissingField("prediction")),
        Some(Value::String(label)) => label,
        Some(other) => {
            return Err(ParseError::InvalidField {
                field: "prediction",
                reason: format!("expected a string, got {}", other),
            })
        }
    };
    Prediction::parse(label).ok_or_else(|| ParseError::UnknownPrediction {
        label: label.clone(),
        justification: justification.clone(),
    })
}

fn normalize_confidence(value: Option<&Value>) -> Result<f64, ParseError> {
    let value = match value {
        None | Some(Value::Null) => return Err(ParseError::MissingField("confidence")),
        Some(value) => value,
    };
    match serde_json::from_value::<ConfidenceValue>(value.clone()) {
        Ok(ConfidenceValue::Number(n)) => finite_percent(n),
        Ok(ConfidenceValue::Text(text)) => parse_confidence_text(&text),
        Err(_) => Err(ParseError::InvalidField {
            field: "confidence",
            reason: format!("expected a number or percent string, got {}", value),
        }),
    }
}

fn normalize_frames(value: Option<Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
            warn!(error = %e, "Ignoring malformed 'frames' field");
            Vec::new()
        }),
    }
}

fn normalize_frame_probs(value: Option<Value>) -> Vec<FrameProbability> {
    let pairs: Vec<[f64; 2]> = match value {
        None | Some(Value::Null) => return Vec::new(),
        Some(value) => match serde_json::from_value(value) {
            Ok(pairs) => pairs,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed 'frame_probs' field");
                return Vec::new();
            }
        },
    };

    let probs: Vec<FrameProbability> = pairs
        .into_iter()
        .map(|[real, fake]| FrameProbability::new(real, fake))
        .collect();

    let off_unit = probs
        .iter()
        .filter(|p| ((p.real + p.fake) - 1.0).abs() > 0.05)
        .count();
    if off_unit > 0 {
        debug!(frames = off_unit, "Frame probability pairs not summing to 1.0");
    }

    probs
}

fn non_null_string(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}
