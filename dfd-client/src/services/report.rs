//! JSON analysis report export

use chrono::{DateTime, Utc};
use dfd_common::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::models::{AnalysisResult, VideoFile};
use crate::services::chart_data::{build_chart_data, ChartData};

/// File name the report is saved under when no path is given
pub const DEFAULT_REPORT_FILE_NAME: &str = "deepfake_report.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportVideo {
    pub file_name: String,
    pub size_bytes: u64,
}

/// Downloadable record of one successful submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub generated_at: DateTime<Utc>,
    pub submission_id: Option<Uuid>,
    pub video: ReportVideo,
    pub training_opt_in: bool,
    pub result: AnalysisResult,
    pub chart: Option<ChartData>,
}

impl AnalysisReport {
    pub fn new(
        file: &VideoFile,
        submission_id: Option<Uuid>,
        training_opt_in: bool,
        result: &AnalysisResult,
    ) -> Self {
        Self {
            generated_at: Utc::now(),
            submission_id,
            video: ReportVideo {
                file_name: file.file_name.clone(),
                size_bytes: file.size_bytes,
            },
            training_opt_in,
            chart: build_chart_data(&result.frame_probs),
            result: result.clone(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report; an existing file is replaced
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = self.to_json_pretty()?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "Analysis report written");
        Ok(())
    }
}
