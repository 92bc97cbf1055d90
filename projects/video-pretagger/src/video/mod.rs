pub mod ffmpeg_reader;
pub mod opencv_reader;
pub mod sampler;

use anyhow::Result;
use opencv::core::Mat;
use std::path::Path;

/// A decoded video stream read front to back.
///
/// Dropping the reader releases the underlying handle.
pub trait VideoReader {
    /// Frame count reported by the container, 0 when unknown.
    fn frame_count(&self) -> Result<usize>;
    fn source_fps(&self) -> Result<f64>;
    /// Decode the next frame as a BGR Mat. Errors cover both corrupt frames
    /// and end of stream.
    fn read_frame(&mut self) -> Result<Mat>;
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Backend {
    #[default]
    Opencv,
    Ffmpeg,
}

pub fn open_reader(path: &Path, backend: Backend) -> Result<Box<dyn VideoReader>> {
    let reader: Box<dyn VideoReader> = match backend {
        Backend::Opencv => Box::new(opencv_reader::OpencvReader::new(&path.to_string_lossy())?),
        Backend::Ffmpeg => Box::new(ffmpeg_reader::FfmpegReader::new(path)?),
    };
    Ok(reader)
}
