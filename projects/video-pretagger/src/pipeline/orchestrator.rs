// Pipeline orchestrator: runs sampling, detection, reporting and ledger
// logging one after another for a single video.

use crate::error::PipelineError;
use crate::pipeline::annotate::annotate;
use crate::pipeline::detection::{load_detector, Detector};
use crate::pipeline::ledger::append_ledger_row;
use crate::pipeline::report::write_report;
use crate::pipeline::types::MetricsBundle;
use crate::run_context::RunLayout;
use crate::video::sampler::extract_frames;
use crate::video::{open_reader, Backend, VideoReader};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub video_path: PathBuf,
    pub output_dir: PathBuf,
    pub frame_step: usize,
    pub model_name: String,
    pub backend: Backend,
    /// Reject sources that cannot be opened or report no frames before any
    /// stage runs.
    pub strict_validation: bool,
}

/// What a run that got past detection produced. Report and ledger failures
/// are recorded here rather than failing the run.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub metrics: MetricsBundle,
    pub report_written: bool,
    pub ledger_appended: bool,
}

/// Run the pipeline with the configured video backend and the RT-DETR model.
pub fn run_pipeline(config: &PipelineConfig) -> Result<PipelineOutcome> {
    let backend = config.backend;
    run_pipeline_with(config, |path| open_reader(path, backend), load_detector)
}

/// Run the pipeline with caller-supplied source and model constructors.
pub fn run_pipeline_with<O, L>(
    config: &PipelineConfig,
    open_source: O,
    load_model: L,
) -> Result<PipelineOutcome>
where
    O: Fn(&Path) -> Result<Box<dyn VideoReader>>,
    L: FnOnce(&str) -> Result<Box<dyn Detector>>,
{
    tracing::info!("Starting MLOps Video Pre-tagging Pipeline...");
    tracing::info!("Input Video: {:?}", config.video_path);
    tracing::info!("Output Base Directory: {:?}", config.output_dir);
    tracing::info!("Frame Step: {}", config.frame_step);
    tracing::info!("Detection Model: {}", config.model_name);

    if config.strict_validation {
        validate_video_input(&config.video_path, &open_source).map_err(|e| {
            tracing::error!("Pipeline aborted due to input video validation failure: {}", e);
            e
        })?;
    }

    let layout = RunLayout::create(&config.output_dir)?;
    let mut metrics = MetricsBundle::default();

    // Stage 1: frame extraction
    let start = Instant::now();
    let frame_metrics = extract_frames(
        &config.video_path,
        &layout.frames_dir(),
        config.frame_step,
        |path| open_source(path),
    )
    .map_err(|e| {
        tracing::error!("Frame extraction failed: {}", e);
        e
    })?;
    let elapsed = start.elapsed().as_secs_f64();
    tracing::info!(
        "Successfully extracted {} frames.",
        frame_metrics.frames_extracted
    );
    tracing::info!(
        "Frame drop ratio: {:.2}%",
        frame_metrics.frame_drop_ratio * 100.0
    );
    tracing::info!("Frame Extraction completed in {:.2} seconds.", elapsed);
    metrics.frame_extraction = Some(frame_metrics);
    metrics.record_stage("frame_extraction", elapsed);

    // Stage 2: detection and annotation
    let start = Instant::now();
    let outcome = annotate(
        &layout.frames_dir(),
        &layout.annotations_path(),
        &config.model_name,
        load_model,
    )
    .map_err(|e| {
        tracing::error!("Object detection and COCO generation failed: {}", e);
        e
    })?;
    let elapsed = start.elapsed().as_secs_f64();
    let detection_metrics = outcome.metrics;
    tracing::info!(
        "Successfully detected {} objects and generated COCO file.",
        detection_metrics.total_detections
    );
    tracing::info!(
        "Average detections per frame: {:.2}",
        detection_metrics.detections_per_frame_avg
    );
    tracing::info!(
        "Class distribution: {}",
        serde_json::to_string(&detection_metrics.class_distribution)?
    );
    tracing::info!("Object Detection completed in {:.2} seconds.", elapsed);
    metrics.object_detection = Some(detection_metrics);
    metrics.record_stage("object_detection", elapsed);

    tracing::info!("Pipeline execution finished.");
    for (stage, seconds) in &metrics.stage_times {
        tracing::info!("  {}: {:.2} seconds", stage, seconds);
    }
    tracing::debug!("Collected metrics: {}", serde_json::to_string(&metrics)?);

    // Stage 3: report and ledger, independent of each other
    let report_path = layout.report_path();
    let report_written = match write_report(&metrics, &report_path) {
        Ok(()) => {
            tracing::info!("Pipeline report generated at: {:?}", report_path);
            true
        }
        Err(e) => {
            tracing::error!("Failed to generate pipeline report: {}", e);
            false
        }
    };

    let video_path = config.video_path.to_string_lossy();
    let ledger_appended = match append_ledger_row(&metrics, &video_path, &layout.ledger_path()) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Could not log metrics to CSV: {}", e);
            false
        }
    };

    Ok(PipelineOutcome {
        metrics,
        report_written,
        ledger_appended,
    })
}

/// Pre-flight check: the file exists, opens, and reports a frame count.
pub fn validate_video_input<O>(video_path: &Path, open_source: &O) -> Result<()>
where
    O: Fn(&Path) -> Result<Box<dyn VideoReader>>,
{
    if !video_path.exists() {
        return Err(PipelineError::VideoNotFound(video_path.to_path_buf()).into());
    }

    let reader = open_source(video_path).map_err(|e| PipelineError::VideoUnreadable {
        path: video_path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let frame_count = reader.frame_count().unwrap_or(0);
    if frame_count == 0 {
        return Err(PipelineError::InvalidVideo {
            path: video_path.to_path_buf(),
            reason: "0 or invalid frame count; it might be empty or corrupted".to_string(),
        }
        .into());
    }

    tracing::info!(
        "Input video {:?} passed basic validation ({} frames).",
        video_path,
        frame_count
    );
    Ok(())
}
