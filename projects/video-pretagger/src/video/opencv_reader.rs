use super::VideoReader;
use anyhow::{bail, Result};
use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio::{
    self, VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_COUNT, CAP_PROP_HW_ACCELERATION,
};

/// Reader on top of `cv::VideoCapture`, letting OpenCV pick the backend.
pub struct OpencvReader {
    capture: VideoCapture,
    fps: f64,
    frame_count: usize,
}

impl OpencvReader {
    pub fn new(path: &str) -> Result<Self> {
        let mut capture = VideoCapture::from_file(path, CAP_ANY)?;
        if !capture.is_opened()? {
            bail!("Failed to open video file: {}", path);
        }

        let hw = capture
            .set(CAP_PROP_HW_ACCELERATION, videoio::VIDEO_ACCELERATION_ANY as f64)
            .unwrap_or(false);
        tracing::debug!("OpencvReader: hardware acceleration requested: {}", hw);

        let fps = capture.get(CAP_PROP_FPS)?;
        // Negative or NaN counts saturate to 0, which callers treat as unknown.
        let frame_count = capture.get(CAP_PROP_FRAME_COUNT)?.max(0.0) as usize;

        tracing::info!(
            "OpencvReader: opened {}, fps={:.2}, stream_frames={}",
            path,
            fps,
            frame_count
        );

        Ok(Self {
            capture,
            fps,
            frame_count,
        })
    }
}

impl VideoReader for OpencvReader {
    fn frame_count(&self) -> Result<usize> {
        Ok(self.frame_count)
    }

    fn source_fps(&self) -> Result<f64> {
        Ok(self.fps)
    }

    fn read_frame(&mut self) -> Result<Mat> {
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? || frame.empty() {
            bail!("Failed to read frame");
        }
        Ok(frame)
    }
}
