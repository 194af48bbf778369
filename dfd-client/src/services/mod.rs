//! Services for dfd-client

pub mod chart_data;
pub mod report;
pub mod response_parser;
pub mod submission_controller;
pub mod upload_client;

pub use chart_data::{build_chart_data, ChartData, ChartDataset};
pub use report::{AnalysisReport, DEFAULT_REPORT_FILE_NAME};
pub use response_parser::{parse_analysis_response, parse_analysis_value};
pub use submission_controller::SubmissionController;
pub use upload_client::{
    HttpUploadClient, TransportResponse, UploadFailure, UploadProgress, UploadRequest,
    UploadTransport,
};
