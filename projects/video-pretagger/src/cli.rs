use crate::pipeline::orchestrator::PipelineConfig;
use crate::video::Backend;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run the MLOps video pre-tagging pipeline.", long_about = None)]
pub struct Args {
    /// Path to the input video file
    #[arg(long, env = "PRETAGGER_VIDEO_PATH")]
    pub video_path: PathBuf,

    /// Base directory for all generated outputs (frames, annotations, report, ledger)
    #[arg(long, env = "PRETAGGER_OUTPUT_DIR", default_value = "output")]
    pub output_dir: PathBuf,

    /// Save every Nth frame of the video
    #[arg(
        long,
        env = "PRETAGGER_FRAME_STEP",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub frame_step: u64,

    /// Name or path of the object detection model
    #[arg(long, env = "PRETAGGER_MODEL", default_value = "rtdetr/v2-s.onnx")]
    pub model_name: String,

    /// Video decoding backend
    #[arg(long, env = "PRETAGGER_BACKEND", value_enum, default_value_t = Backend::Opencv)]
    pub backend: Backend,

    /// Reject videos that cannot be opened or report no frames before running
    #[arg(long)]
    pub strict_validation: bool,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            video_path: self.video_path.clone(),
            output_dir: self.output_dir.clone(),
            frame_step: self.frame_step as usize,
            model_name: self.model_name.clone(),
            backend: self.backend,
            strict_validation: self.strict_validation,
        }
    }
}
