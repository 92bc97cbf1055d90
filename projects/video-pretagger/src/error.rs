use std::path::PathBuf;
use thiserror::Error;

/// Fatal conditions raised by the pipeline stages.
///
/// Stage functions return `anyhow::Result`; these values are raised through it
/// so callers can `downcast_ref::<PipelineError>()` when they need the kind.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Video file not found: {0}")]
    VideoNotFound(PathBuf),

    #[error("Could not open video file {path}: {reason}")]
    VideoUnreadable { path: PathBuf, reason: String },

    #[error("Video {path} failed validation: {reason}")]
    InvalidVideo { path: PathBuf, reason: String },

    #[error("Frame step must be at least 1, got {0}")]
    InvalidStride(usize),

    #[error("Failed to write frame {0}")]
    FrameWrite(PathBuf),

    #[error("Image directory not found: {0}")]
    ImageDirNotFound(PathBuf),

    #[error("Failed to load detection model {model}: {reason}")]
    ModelLoad { model: String, reason: String },

    #[error("Failed to save annotations to {path}: {source}")]
    AnnotationWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to save report to {path}: {source}")]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
