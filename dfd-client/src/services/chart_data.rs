//! Per-frame chart series
//!
//! Renderer-neutral data derived from `frame_probs`. Colors, tension and
//! other presentation settings belong to the renderer.

use serde::{Deserialize, Serialize};

use crate::models::FrameProbability;

/// Dataset label of the per-frame fake-confidence series
pub const FAKE_SERIES_LABEL: &str = "Confidence Score";

/// Dataset label of the per-frame real-probability series
pub const REAL_SERIES_LABEL: &str = "Real Probability";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartDataset {
    pub label: String,
    /// Percentages in [0, 100], one per label
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    /// `Frame 1`, `Frame 2`, ...
    pub labels: Vec<String>,
    /// Fake series first, then real series
    pub datasets: Vec<ChartDataset>,
}

impl ChartData {
    /// Values of the fake-confidence series
    pub fn fake_series(&self) -> &[f64] {
        self.series(FAKE_SERIES_LABEL)
    }

    pub fn real_series(&self) -> &[f64] {
        self.series(REAL_SERIES_LABEL)
    }

    fn series(&self, label: &str) -> &[f64] {
        self.datasets
            .iter()
            .find(|d| d.label == label)
            .map(|d| d.values.as_slice())
            .unwrap_or(&[])
    }

    /// Mean of the fake series
    pub fn mean_fake_percent(&self) -> Option<f64> {
        let values = self.fake_series();
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }

    /// One text row per frame: label, bar of `width` cells, percentage
    pub fn text_rows(&self, width: usize) -> Vec<String> {
        let label_width = self.labels.iter().map(String::len).max().unwrap_or(0);
        self.labels
            .iter()
            .zip(self.fake_series())
            .map(|(label, value)| {
                let filled = ((value / 100.0) * width as f64).round() as usize;
                let filled = filled.min(width);
                format!(
                    "{:<label_width$}  {}{}  {:>5.1}%",
                    label,
                    "█".repeat(filled),
                    "░".repeat(width - filled),
                    value,
                    label_width = label_width
                )
            })
            .collect()
    }
}

/// Build chart data; `None` when there are no frame probabilities
pub fn build_chart_data(frame_probs: &[FrameProbability]) -> Option<ChartData> {
    if frame_probs.is_empty() {
        return None;
    }

    let labels = (1..=frame_probs.len())
        .map(|i| format!("Frame {}", i))
        .collect();

    Some(ChartData {
        labels,
        datasets: vec![
            ChartDataset {
                label: FAKE_SERIES_LABEL.to_string(),
                values: frame_probs.iter().map(FrameProbability::fake_percent).collect(),
            },
            ChartDataset {
                label: REAL_SERIES_LABEL.to_string(),
                values: frame_probs.iter().map(FrameProbability::real_percent).collect(),
            },
        ],
    })
}
