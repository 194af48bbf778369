//! dfd-client - Deepfake detection client
//!
//! Submits one video to the analysis service, shows upload progress, then
//! prints the verdict, justification, extracted frames and per-frame chart.
//! Optionally stores the video for model training and writes a JSON report.

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dfd_common::config::{ClientConfig, ConfigResolver};
use dfd_common::events::{DfdEvent, EventBus, SubmissionPhase};
use dfd_common::human_size::format_bytes;
use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dfd_client::services::chart_data::build_chart_data;
use dfd_client::services::report::DEFAULT_REPORT_FILE_NAME;
use dfd_client::{AnalysisResult, HttpUploadClient, SubmissionController, VideoFile};

/// Width of the per-frame bars in the text chart
const CHART_WIDTH: usize = 40;

/// How long the event printer gets to render the training outcome
const PRINTER_GRACE: Duration = Duration::from_secs(1);

/// Command-line arguments for dfd-client
#[derive(Parser, Debug)]
#[command(name = "dfd-client")]
#[command(about = "Submit a video for deepfake analysis")]
#[command(version)]
struct Args {
    /// Video to analyze (mp4, mov, avi or mkv, at most 100 MiB)
    video: PathBuf,

    /// Also store the video on the service for model training
    #[arg(long)]
    allow_training: bool,

    /// Analysis service base URL (overrides DFD_SERVICE_URL and config file)
    #[arg(short, long)]
    service_url: Option<String>,

    /// TOML config file (overrides DFD_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write a JSON report; without a value writes deepfake_report.json
    #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_REPORT_FILE_NAME)]
    report: Option<PathBuf>,

    /// Do not print the per-frame chart
    #[arg(long)]
    no_chart: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ConfigResolver::new()
        .with_service_url(args.service_url.clone())
        .with_config_path(args.config.clone())
        .resolve()
        .context("Failed to resolve configuration")?;

    init_tracing(&config)?;

    info!("Starting dfd-client v{}", env!("CARGO_PKG_VERSION"));
    info!(service_url = %config.service_url, "Analysis service");

    let transport =
        HttpUploadClient::from_config(&config).context("Failed to build HTTP client")?;
    let event_bus = EventBus::new(256);
    let events = event_bus.subscribe();
    let mut controller =
        SubmissionController::new(Arc::new(transport), config.clone(), event_bus);

    let video = VideoFile::from_path(&args.video)
        .await
        .with_context(|| format!("Cannot read video {}", args.video.display()))?;
    controller.select_file(video)?;

    let printer = tokio::spawn(print_events(events, args.allow_training));

    let outcome = tokio::select! {
        outcome = controller.submit(args.allow_training) => Some(outcome),
        _ = signal::ctrl_c() => None,
    };

    let result = match outcome {
        Some(Ok(result)) => result,
        Some(Err(err)) => {
            eprintln!();
            finish_training(&mut controller, printer, config.request_timeout).await;
            return Err(err.into());
        }
        None => {
            if let Some(task) = controller.take_training_task() {
                warn!("Interrupted, abandoning training upload");
                task.abort();
            }
            controller.reset();
            printer.abort();
            eprintln!();
            anyhow::bail!("Interrupted, submission abandoned");
        }
    };
    eprintln!();

    print_result(&config, &result, !args.no_chart);

    if let Some(path) = &args.report {
        if let Some(report) = controller.build_report() {
            report
                .write_to(path)
                .with_context(|| format!("Failed to write report {}", path.display()))?;
            println!("\nReport saved to {}", path.display());
        }
    }

    finish_training(&mut controller, printer, config.request_timeout).await;

    Ok(())
}

/// Wait for a started training upload before the runtime shuts down
///
/// Runs whether the primary submission succeeded or failed; the upload is
/// abandoned with a warning once `limit` elapses.
async fn finish_training(
    controller: &mut SubmissionController,
    printer: JoinHandle<()>,
    limit: Duration,
) {
    let Some(task) = controller.take_training_task() else {
        printer.abort();
        return;
    };

    let abort = task.abort_handle();
    if tokio::time::timeout(limit, task).await.is_err() {
        warn!(
            after_secs = limit.as_secs(),
            "Training upload still running at exit, abandoning it"
        );
        abort.abort();
        printer.abort();
        return;
    }

    // The finished event is already on the bus; let the printer render it
    if tokio::time::timeout(PRINTER_GRACE, printer).await.is_err() {
        warn!("Event printer did not finish");
    }
}

fn init_tracing(config: &ClientConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));
    let registry = tracing_subscriber::registry().with(filter);

    match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        None => {
            registry
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}

/// Render progress and training outcome; returns once the training upload
/// reports back (when one was requested)
async fn print_events(mut events: broadcast::Receiver<DfdEvent>, wait_for_training: bool) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return,
        };

        match event {
            DfdEvent::FileStaged {
                file_name,
                size_bytes,
                ..
            } => {
                eprintln!("Selected {} ({})", file_name, format_bytes(size_bytes));
            }
            DfdEvent::UploadProgress {
                percent,
                sent_bytes,
                total_bytes,
                ..
            } => {
                eprint!(
                    "\rUploading... {:>5.1}% ({} of {})",
                    percent,
                    format_bytes(sent_bytes),
                    format_bytes(total_bytes)
                );
                let _ = std::io::stderr().flush();
            }
            DfdEvent::StateChanged { new_phase, .. }
                if new_phase == SubmissionPhase::Analyzing =>
            {
                eprint!("\nAnalyzing...");
                let _ = std::io::stderr().flush();
            }
            DfdEvent::TrainingUploadFinished {
                success, message, ..
            } => {
                if success {
                    eprintln!("Video stored for training");
                } else {
                    eprintln!(
                        "Training upload failed: {}",
                        message.unwrap_or_else(|| "unknown error".to_string())
                    );
                }
                if wait_for_training {
                    return;
                }
            }
            _ => {}
        }
    }
}

fn print_result(config: &ClientConfig, result: &AnalysisResult, show_chart: bool) {
    println!();
    println!("Prediction: {}", result.prediction.as_str().to_uppercase());
    println!("Confidence: {:.2}%", result.confidence);
    println!();
    println!("Analysis Details:");
    println!("  {}", result.justification_or_default());

    if let Some(frames_analyzed) = result.diagnostics.frames_analyzed {
        println!("  Frames analyzed: {}", frames_analyzed);
    }
    if let Some(secs) = result.diagnostics.processing_time_secs {
        println!("  Processing time: {:.2}s", secs);
    }

    if result.has_frames() {
        println!();
        println!("Extracted Frames:");
        for (i, frame) in result.frames.iter().enumerate() {
            println!("  Frame {}: {}", i + 1, config.resource_url(frame));
        }
    }

    if show_chart {
        if let Some(chart) = build_chart_data(&result.frame_probs) {
            println!();
            println!("Frame-by-frame fake probability:");
            for row in chart.text_rows(CHART_WIDTH) {
                println!("  {}", row);
            }
            if let Some(mean) = chart.mean_fake_percent() {
                println!("  Mean: {:.1}%", mean);
            }
        }
    }
}
